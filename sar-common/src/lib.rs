//! # SAR Common Library
//!
//! Shared code for the SAR credential request service:
//! - Error and result types
//! - Bootstrap configuration loading
//! - Credential and request-log models
//! - Database schema setup
//! - Lenient text fields for form and import JSON

pub mod config;
pub mod db;
pub mod error;
pub mod text;

pub use error::{Error, Result};
