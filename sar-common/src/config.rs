//! Bootstrap configuration loading
//!
//! Configuration is resolved in this priority order:
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`SAR_CONFIG`)
//! 3. Per-user TOML file (`<config_dir>/sar/config.toml`)
//! 4. Built-in defaults
//!
//! Secrets and the database path can additionally be overridden by
//! environment variables after the TOML file is read.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SAR_CONFIG";

const ENV_MAILJET_API_KEY: &str = "SAR_MAILJET_API_KEY";
const ENV_MAILJET_SECRET_KEY: &str = "SAR_MAILJET_SECRET_KEY";
const ENV_SENDER_EMAIL: &str = "SAR_SENDER_EMAIL";
const ENV_DATABASE_PATH: &str = "SAR_DATABASE_PATH";

/// Which stored record answers for a school id that appears in several years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earliest row in table order
    #[default]
    First,
    /// Highest year; earliest row among equal years
    LatestYear,
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    ///
    /// If not specified, `<data_local_dir>/sar/sar.db` is used.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Interface the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Duplicate school id resolution
    #[serde(default)]
    pub tie_break: TieBreak,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub mailjet: MailjetConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Mailjet transactional email settings
#[derive(Debug, Clone, Deserialize)]
pub struct MailjetConfig {
    #[serde(default = "default_mailjet_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub secret_key: String,

    /// Verified sender address
    #[serde(default)]
    pub sender_email: String,

    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

/// External school directory settings
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// URL prefix; the school id is appended verbatim
    #[serde(default = "default_directory_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_directory_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5730
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mailjet_api_url() -> String {
    "https://api.mailjet.com/v3.1/send".to_string()
}

fn default_sender_name() -> String {
    "ระบบ SAR".to_string()
}

fn default_directory_base_url() -> String {
    "https://bigdata.sukhothai2.go.th/tableSchoolID.php?op=1.5&id=".to_string()
}

fn default_directory_timeout_secs() -> u64 {
    15
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            bind_address: default_bind_address(),
            port: default_port(),
            tie_break: TieBreak::default(),
            logging: LoggingConfig::default(),
            mailjet: MailjetConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for MailjetConfig {
    fn default() -> Self {
        Self {
            api_url: default_mailjet_api_url(),
            api_key: String::new(),
            secret_key: String::new(),
            sender_email: String::new(),
            sender_name: default_sender_name(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_directory_base_url(),
            timeout_secs: default_directory_timeout_secs(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Override secrets and paths from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override secrets and paths from an arbitrary key lookup
    ///
    /// Empty values are ignored so an unset-but-exported variable does not
    /// blank a value from the TOML file.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_MAILJET_API_KEY) {
            debug!("Mailjet API key taken from {}", ENV_MAILJET_API_KEY);
            self.mailjet.api_key = key;
        }
        if let Some(secret) = get(ENV_MAILJET_SECRET_KEY) {
            debug!("Mailjet secret key taken from {}", ENV_MAILJET_SECRET_KEY);
            self.mailjet.secret_key = secret;
        }
        if let Some(sender) = get(ENV_SENDER_EMAIL) {
            self.mailjet.sender_email = sender;
        }
        if let Some(path) = get(ENV_DATABASE_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }
    }

    /// Database file location, falling back to the OS data directory
    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => path.clone(),
            None => default_data_folder().join("sar.db"),
        }
    }

    /// Check everything the service needs before it starts serving
    pub fn validate_for_serving(&self) -> Result<()> {
        self.mailjet.validate()
    }
}

impl MailjetConfig {
    /// Mailjet credentials and sender must all be present
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.api_key.trim().is_empty() {
            missing.push("mailjet.api_key / SAR_MAILJET_API_KEY");
        }
        if self.secret_key.trim().is_empty() {
            missing.push("mailjet.secret_key / SAR_MAILJET_SECRET_KEY");
        }
        if self.sender_email.trim().is_empty() {
            missing.push("mailjet.sender_email / SAR_SENDER_EMAIL");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Mailjet is not configured. Missing: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Pick the config file to read, if any
///
/// An explicit path (CLI or environment) is returned even if it does not
/// exist so that loading reports the mistake. The per-user default is only
/// returned when present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config file
    dirs::config_dir()
        .map(|d| d.join("sar").join("config.toml"))
        .filter(|p| p.exists())
}

/// Load configuration from `path` (or defaults) and apply environment overrides
pub fn load_config(path: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Read config {} failed: {}", path.display(), e))
            })?;
            info!("Loaded configuration from {}", path.display());
            TomlConfig::from_toml_str(&content)?
        }
        None => {
            info!("No config file found, using built-in defaults");
            TomlConfig::default()
        }
    };

    config.apply_env_overrides();
    Ok(config)
}

/// OS-dependent data folder for the default database location
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sar"))
        .unwrap_or_else(|| PathBuf::from("./sar_data"))
}
