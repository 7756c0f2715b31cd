//! External school directory
//!
//! Fetches the public school page for a school id and extracts the school
//! name and director name from it. Fetching is a single attempt; callers
//! decide what to do when it fails.

pub mod rules;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub use rules::{extract_manager_name, extract_school_name};

/// Directory fetch errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Connection, DNS or timeout failure
    #[error("Directory request failed: {0}")]
    Network(String),

    /// Directory answered with a non-success status
    #[error("Directory returned HTTP {0}")]
    Status(u16),

    /// Body could not be read as text
    #[error("Directory response unreadable: {0}")]
    Decode(String),
}

/// Values scraped from a directory page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryInfo {
    pub school_name: String,
    pub manager_name: String,
}

impl DirectoryInfo {
    /// Run the extraction rules over a fetched page
    pub fn from_page(page: &str, school_id: &str) -> Self {
        Self {
            school_name: extract_school_name(page, school_id),
            manager_name: extract_manager_name(page, school_id),
        }
    }
}

/// Source of raw directory pages
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Fetch the page for `school_id`
    async fn fetch(&self, school_id: &str) -> Result<String, DirectoryError>;
}

/// Directory pages over HTTP
pub struct HttpDirectorySource {
    http_client: Client,
    base_url: String,
}

impl HttpDirectorySource {
    /// `base_url` is a prefix; the school id is appended to it as-is
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    fn page_url(&self, school_id: &str) -> String {
        format!("{}{}", self.base_url, school_id)
    }
}

#[async_trait]
impl DirectorySource for HttpDirectorySource {
    async fn fetch(&self, school_id: &str) -> Result<String, DirectoryError> {
        let url = self.page_url(school_id);
        debug!(school_id = %school_id, url = %url, "Fetching directory page");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))
    }
}
