//! Transactional email dispatch via Mailjet
//!
//! # API Reference
//! - Endpoint: https://api.mailjet.com/v3.1/send
//! - Auth: HTTP Basic with `api_key:secret_key`
//!
//! Provider rejections (any status other than 200) are reported as
//! `Ok(false)`. Only transport failures (DNS, connection, TLS) are errors.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{header, Client, StatusCode};
use sar_common::config::MailjetConfig;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Email dispatch errors
#[derive(Debug, Error)]
pub enum MailError {
    /// Request never got an HTTP answer
    #[error("Email transport failed: {0}")]
    Transport(String),

    /// Client or header construction failed
    #[error("Email client setup failed: {0}")]
    Setup(String),
}

/// Sends a school's credentials to a requester
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    /// `Ok(true)` iff the provider accepted the message
    async fn send(
        &self,
        recipient_email: &str,
        year: &str,
        username: &str,
        password: &str,
    ) -> Result<bool, MailError>;
}

/// Mailjet v3.1 send request envelope
#[derive(Debug, Serialize)]
pub struct SendRequest {
    #[serde(rename = "Messages")]
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct Message {
    #[serde(rename = "From")]
    pub from: Address,
    #[serde(rename = "To")]
    pub to: Vec<Address>,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "TextPart")]
    pub text_part: String,
    #[serde(rename = "HTMLPart")]
    pub html_part: String,
}

#[derive(Debug, Serialize)]
pub struct Address {
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Build the credential email
pub fn compose_credentials_message(
    sender_email: &str,
    sender_name: &str,
    recipient_email: &str,
    year: &str,
    username: &str,
    password: &str,
) -> SendRequest {
    let heading = format!("ข้อมูลการเข้าใช้งานระบบ SAR ปีการศึกษา {}", year);

    SendRequest {
        messages: vec![Message {
            from: Address {
                email: sender_email.to_string(),
                name: Some(sender_name.to_string()),
            },
            to: vec![Address {
                email: recipient_email.to_string(),
                name: None,
            }],
            subject: format!("Username และ Password ระบบ SAR ปีการศึกษา {}", year),
            text_part: format!("{}\nUsername: {}\nPassword: {}", heading, username, password),
            html_part: format!(
                "<h3>{}</h3><p>Username: <strong>{}</strong><br>Password: <strong>{}</strong></p>",
                escape_html(&heading),
                escape_html(username),
                escape_html(password)
            ),
        }],
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `Basic base64(api_key:secret_key)`
pub fn basic_auth_value(api_key: &str, secret_key: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", api_key, secret_key)))
}

/// Mailjet HTTP client
pub struct MailjetDispatcher {
    http_client: Client,
    api_url: String,
    sender_email: String,
    sender_name: String,
}

impl MailjetDispatcher {
    pub fn new(config: &MailjetConfig) -> Result<Self, MailError> {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&basic_auth_value(
            &config.api_key,
            &config.secret_key,
        ))
        .map_err(|e| MailError::Setup(format!("Invalid Mailjet credentials: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let http_client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| MailError::Setup(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
            sender_email: config.sender_email.clone(),
            sender_name: config.sender_name.clone(),
        })
    }
}

#[async_trait]
impl EmailDispatcher for MailjetDispatcher {
    async fn send(
        &self,
        recipient_email: &str,
        year: &str,
        username: &str,
        password: &str,
    ) -> Result<bool, MailError> {
        let payload = compose_credentials_message(
            &self.sender_email,
            &self.sender_name,
            recipient_email,
            year,
            username,
            password,
        );

        debug!(recipient = %recipient_email, year = %year, "Sending credentials email");

        let response = self
            .http_client
            .post(&self.api_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            status = status.as_u16(),
            body = %body,
            "Mailjet rejected credentials email"
        );
        Ok(false)
    }
}
