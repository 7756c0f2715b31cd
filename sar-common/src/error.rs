//! Errors raised by the credential store, config loading and record import
//!
//! The HTTP layer never shows these to the request form directly: lookup
//! swallows them and fulfillment turns them into an `ERROR: ...` log row.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite query or connection failure, including missing tables
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reading a config or import file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unparseable TOML, or Mailjet settings missing at `serve`
    #[error("Configuration error: {0}")]
    Config(String),

    /// No credential row with the given row id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed import file
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored data that cannot be read back, e.g. a bad log timestamp
    #[error("Internal error: {0}")]
    Internal(String),
}
