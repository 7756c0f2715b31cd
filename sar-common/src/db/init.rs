//! Database initialization
//!
//! Opening the database never creates tables. Table creation is an explicit
//! setup step so that a service pointed at an empty file reports that it has
//! not been set up instead of silently running against empty tables.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Credential table name
pub const SAR_DATA_TABLE: &str = "sar_data";

/// Request log table name
pub const REQUEST_LOGS_TABLE: &str = "request_logs";

/// Open (or create) the database file and apply connection pragmas
pub async fn open_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Created new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers alongside the single writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    Ok(pool)
}

/// Single-connection in-memory database
///
/// Every pooled connection to `sqlite::memory:` sees its own database, so the
/// pool is capped at one connection.
pub async fn open_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

/// Create the credential and request log tables (idempotent)
pub async fn setup_tables(pool: &SqlitePool) -> Result<()> {
    create_sar_data_table(pool).await?;
    create_request_logs_table(pool).await?;
    info!("Tables {} and {} are ready", SAR_DATA_TABLE, REQUEST_LOGS_TABLE);
    Ok(())
}

/// True when both tables exist
pub async fn tables_initialized(pool: &SqlitePool) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (?, ?)",
    )
    .bind(SAR_DATA_TABLE)
    .bind(REQUEST_LOGS_TABLE)
    .fetch_one(pool)
    .await?;

    Ok(count == 2)
}

async fn create_sar_data_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sar_data (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            year TEXT NOT NULL DEFAULT '',
            school_id TEXT NOT NULL,
            school_name TEXT NOT NULL DEFAULT '',
            manager_name TEXT NOT NULL DEFAULT '',
            username TEXT NOT NULL DEFAULT '',
            password TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sar_data_school_id ON sar_data(school_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_request_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS request_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            year TEXT NOT NULL DEFAULT '',
            school_id TEXT NOT NULL DEFAULT '',
            requester_name TEXT NOT NULL DEFAULT '',
            manager_name TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
