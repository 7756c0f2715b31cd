//! Extraction rules for the school directory page
//!
//! Each rule is a pure function from page text to an optional value. Rules
//! are grouped into ordered lists and the first rule that yields a value
//! wins, so a new page layout can be supported by adding a rule to the end
//! of a list without touching the network code.

use once_cell::sync::Lazy;
use regex::Regex;

/// Honorific prefixes that start a director's name on the directory page
const HONORIFICS: &str = r"นาย|นาง|นางสาว|น\.ส\.|ว่าที่ร\.ต\.|ดร\.";

/// Director's name inside an `<h3>` heading
static HEADING_MANAGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)<h3[^>]*>\s*((?:{})[^<]+)</h3>",
        HONORIFICS
    ))
    .expect("heading manager pattern is valid")
});

/// Honorific plus two name tokens on the line above the director title
static DIRECTOR_LINE_MANAGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)((?:นาย|นาง|นางสาว|น\.ส\.)\s*[^<\s]+\s+[^<\s]+)[^<]*<br>[^<]*ผู้อำนวยการ")
        .expect("director line pattern is valid")
});

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("markup pattern is valid"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// A named extraction step
#[derive(Clone, Copy)]
pub struct ExtractionRule {
    pub name: &'static str,
    /// `(page, school_id) -> value`
    pub apply: fn(&str, &str) -> Option<String>,
}

impl std::fmt::Debug for ExtractionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionRule").field("name", &self.name).finish()
    }
}

/// Rules for the school's display name, in priority order
pub const SCHOOL_NAME_RULES: &[ExtractionRule] = &[ExtractionRule {
    name: "text_after_school_id",
    apply: name_after_school_id,
}];

/// Rules for the director's name, in priority order
pub const MANAGER_NAME_RULES: &[ExtractionRule] = &[
    ExtractionRule {
        name: "h3_heading",
        apply: manager_in_heading,
    },
    ExtractionRule {
        name: "line_before_director_title",
        apply: manager_before_director_title,
    },
];

/// Run `rules` in order and return the first non-empty value
pub fn apply_rules(rules: &[ExtractionRule], page: &str, school_id: &str) -> Option<String> {
    rules.iter().find_map(|rule| {
        (rule.apply)(page, school_id)
            .filter(|value| !value.is_empty())
            .map(|value| {
                tracing::trace!(rule = rule.name, "Extraction rule matched");
                value
            })
    })
}

/// School name as found on the page, or empty
pub fn extract_school_name(page: &str, school_id: &str) -> String {
    apply_rules(SCHOOL_NAME_RULES, page, school_id).unwrap_or_default()
}

/// Director name as found on the page, or empty
pub fn extract_manager_name(page: &str, school_id: &str) -> String {
    apply_rules(MANAGER_NAME_RULES, page, school_id)
        .map(|raw| collapse_whitespace(&strip_markup(&raw)))
        .unwrap_or_default()
}

/// Remove anything that looks like a tag
pub fn strip_markup(text: &str) -> String {
    MARKUP.replace_all(text, "").into_owned()
}

/// Replace whitespace runs with a single space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// The id is followed by whitespace and then the name up to the next tag or
/// line break; only the first space-separated word is the name proper.
fn name_after_school_id(page: &str, school_id: &str) -> Option<String> {
    if school_id.is_empty() {
        return None;
    }
    let pattern = format!(r"(?i){}\s+([^<\n\r]+)", regex::escape(school_id));
    let re = Regex::new(&pattern).ok()?;
    let captured = re.captures(page)?.get(1)?.as_str().trim();

    let stripped = strip_markup(captured);
    stripped.split(' ').next().map(str::to_string)
}

fn manager_in_heading(page: &str, _school_id: &str) -> Option<String> {
    HEADING_MANAGER
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn manager_before_director_title(page: &str, _school_id: &str) -> Option<String> {
    DIRECTOR_LINE_MANAGER
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}
