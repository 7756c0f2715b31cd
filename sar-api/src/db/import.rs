//! Bulk loading of credential rows from a JSON file
//!
//! The file holds an array of objects with `year`, `school_id`,
//! `school_name`, `manager_name`, `username` and `password`; numeric values
//! such as `"year": 2567` are taken as text. Rows are appended in file order,
//! which becomes table order, inside one transaction: a failed import adds
//! nothing.

use sar_common::db::NewCredentialRecord;
use sar_common::{Error, Result};
use std::path::Path;
use tracing::{info, warn};

use super::SqliteRecordStore;

/// Parse records from JSON text
pub fn parse_records(json: &str) -> Result<Vec<NewCredentialRecord>> {
    let records: Vec<NewCredentialRecord> = serde_json::from_str(json)
        .map_err(|e| Error::InvalidInput(format!("Invalid record file: {}", e)))?;

    for (index, record) in records.iter().enumerate() {
        if record.school_id.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "Record {} has an empty school_id",
                index + 1
            )));
        }
    }

    Ok(records)
}

/// Append every record in `path` to the store, returning how many were added
pub async fn import_records(store: &SqliteRecordStore, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)?;
    let records = parse_records(&content)?;

    for record in &records {
        if record.school_id.len() != 8 || !record.school_id.chars().all(|c| c.is_ascii_digit()) {
            warn!(school_id = %record.school_id, "School id is not 8 digits; importing anyway");
        }
    }

    let count = store.insert_records(&records).await?;
    info!("Imported {} credential records from {}", count, path.display());
    Ok(count)
}
