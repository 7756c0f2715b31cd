//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of `sar_data`: a school's SAR login for one academic year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CredentialRecord {
    /// Table position; earlier rows have smaller ids
    pub row_id: i64,
    pub year: String,
    pub school_id: String,
    pub school_name: String,
    pub manager_name: String,
    pub username: String,
    pub password: String,
}

/// A credential row before it has been stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCredentialRecord {
    #[serde(deserialize_with = "crate::text::deserialize")]
    pub year: String,
    #[serde(deserialize_with = "crate::text::deserialize")]
    pub school_id: String,
    #[serde(default, deserialize_with = "crate::text::deserialize")]
    pub school_name: String,
    #[serde(default, deserialize_with = "crate::text::deserialize")]
    pub manager_name: String,
    #[serde(deserialize_with = "crate::text::deserialize")]
    pub username: String,
    #[serde(deserialize_with = "crate::text::deserialize")]
    pub password: String,
}

/// Outcome recorded for a fulfillment attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogStatus {
    /// No record for the submitted school id
    NotFound,
    /// Credentials emailed
    Sent,
    /// Email provider answered with a non-success status
    ApiError,
    /// Anything else that went wrong, with its detail
    Error(String),
}

impl LogStatus {
    /// Parse the stored column value back into a status
    pub fn parse(value: &str) -> Self {
        match value {
            "NOT_FOUND" => LogStatus::NotFound,
            "SENT" => LogStatus::Sent,
            "API_ERROR" => LogStatus::ApiError,
            other => LogStatus::Error(
                other
                    .strip_prefix("ERROR: ")
                    .unwrap_or(other)
                    .to_string(),
            ),
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogStatus::NotFound => f.write_str("NOT_FOUND"),
            LogStatus::Sent => f.write_str("SENT"),
            LogStatus::ApiError => f.write_str("API_ERROR"),
            LogStatus::Error(detail) => write!(f, "ERROR: {}", detail),
        }
    }
}

/// One row of `request_logs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// Empty when no record matched
    pub year: String,
    pub school_id: String,
    pub requester_name: String,
    pub manager_name: String,
    pub phone: String,
    pub email: String,
    pub status: LogStatus,
}

/// School display data answered by a lookup; never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolInfo {
    pub name: String,
    pub manager: String,
}
