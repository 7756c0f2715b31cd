//! SQLite-backed record store
//!
//! Each statement is a single SQLite write, so concurrent requests are
//! serialized by SQLite's own locking. Two corrections racing on the same
//! record simply last-write-win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sar_common::config::TieBreak;
use sar_common::db::{CredentialRecord, LogEntry, LogStatus, NewCredentialRecord};
use sar_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::debug;

use super::RecordStore;

const INSERT_RECORD: &str = r#"
    INSERT INTO sar_data (year, school_id, school_name, manager_name, username, password)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

/// Record store over the `sar_data` and `request_logs` tables
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a credential row, returning its row id
    pub async fn insert_record(&self, record: &NewCredentialRecord) -> Result<i64> {
        let result = sqlx::query(INSERT_RECORD)
            .bind(&record.year)
            .bind(&record.school_id)
            .bind(&record.school_name)
            .bind(&record.manager_name)
            .bind(&record.username)
            .bind(&record.password)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Append credential rows in order, all or nothing
    pub async fn insert_records(&self, records: &[NewCredentialRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(INSERT_RECORD)
                .bind(&record.year)
                .bind(&record.school_id)
                .bind(&record.school_name)
                .bind(&record.manager_name)
                .bind(&record.username)
                .bind(&record.password)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }

    /// Record by row id
    pub async fn get_record(&self, row_id: i64) -> Result<Option<CredentialRecord>> {
        let record = sqlx::query_as::<_, CredentialRecord>(
            r#"
            SELECT row_id, year, school_id, school_name, manager_name, username, password
            FROM sar_data
            WHERE row_id = ?
            "#,
        )
        .bind(row_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Most recent log rows, newest first
    pub async fn recent_logs(&self, limit: i64) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, String, String, String)>(
            r#"
            SELECT timestamp, year, school_id, requester_name, manager_name, phone, email, status
            FROM request_logs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(timestamp, year, school_id, requester_name, manager_name, phone, email, status)| -> Result<LogEntry> {
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| Error::Internal(format!("Bad log timestamp '{}': {}", timestamp, e)))?
                    .with_timezone(&Utc);
                Ok(LogEntry {
                    timestamp,
                    year,
                    school_id,
                    requester_name,
                    manager_name,
                    phone,
                    email,
                    status: LogStatus::parse(&status),
                })
            })
            .collect()
    }

    /// Number of log rows
    pub async fn count_logs(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM request_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn is_initialized(&self) -> Result<bool> {
        sar_common::db::tables_initialized(&self.pool).await
    }

    async fn find_by_school_id(
        &self,
        school_id: &str,
        tie_break: TieBreak,
    ) -> Result<Option<CredentialRecord>> {
        let order_by = match tie_break {
            TieBreak::First => "row_id ASC",
            TieBreak::LatestYear => "CAST(year AS INTEGER) DESC, row_id ASC",
        };

        let sql = format!(
            r#"
            SELECT row_id, year, school_id, school_name, manager_name, username, password
            FROM sar_data
            WHERE school_id = ?
            ORDER BY {}
            LIMIT 1
            "#,
            order_by
        );

        let record = sqlx::query_as::<_, CredentialRecord>(&sql)
            .bind(school_id)
            .fetch_optional(&self.pool)
            .await?;

        debug!(
            school_id = %school_id,
            ?tie_break,
            found = record.is_some(),
            "Credential lookup"
        );

        Ok(record)
    }

    async fn update_manager_name(&self, row_id: i64, manager_name: &str) -> Result<()> {
        let result = sqlx::query("UPDATE sar_data SET manager_name = ? WHERE row_id = ?")
            .bind(manager_name)
            .bind(row_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Credential row {}", row_id)));
        }

        Ok(())
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO request_logs
                (timestamp, year, school_id, requester_name, manager_name, phone, email, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.timestamp.to_rfc3339())
        .bind(&entry.year)
        .bind(&entry.school_id)
        .bind(&entry.requester_name)
        .bind(&entry.manager_name)
        .bind(&entry.phone)
        .bind(&entry.email)
        .bind(entry.status.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
