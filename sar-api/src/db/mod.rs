//! Record store: credential rows and the request log
//!
//! Services talk to the store through [`RecordStore`] so that the SQLite
//! backing can be swapped or faked in tests.

use async_trait::async_trait;
use sar_common::config::TieBreak;
use sar_common::db::{CredentialRecord, LogEntry};
use sar_common::Result;

pub mod import;
mod record_store;

pub use import::import_records;
pub use record_store::SqliteRecordStore;

/// Capabilities the lookup and fulfillment services need from storage
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// True once the credential and log tables exist
    async fn is_initialized(&self) -> Result<bool>;

    /// Record whose school id equals `school_id`, chosen by `tie_break`
    /// when the id occurs in several rows
    async fn find_by_school_id(
        &self,
        school_id: &str,
        tie_break: TieBreak,
    ) -> Result<Option<CredentialRecord>>;

    /// Overwrite the manager name of one record
    async fn update_manager_name(&self, row_id: i64, manager_name: &str) -> Result<()>;

    /// Append one request log row
    async fn append_log(&self, entry: &LogEntry) -> Result<()>;
}
