//! School lookup
//!
//! Answers "what is this school's name and director" for the request form.
//! Stored data wins outright when it has a manager name; otherwise the
//! external directory is consulted and merged with whatever is stored.
//! Nothing here ever fails: missing data comes back as empty strings.

use sar_common::config::TieBreak;
use sar_common::db::SchoolInfo;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::RecordStore;
use crate::directory::{DirectoryInfo, DirectorySource};

/// Display name used when neither the directory nor the store knows the school
pub const SCHOOL_NAME_NOT_FOUND: &str = "ไม่พบชื่อโรงเรียน";

/// Resolves school display data from the store and the external directory
#[derive(Clone)]
pub struct LookupService {
    store: Arc<dyn RecordStore>,
    directory: Arc<dyn DirectorySource>,
    tie_break: TieBreak,
}

impl LookupService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        directory: Arc<dyn DirectorySource>,
        tie_break: TieBreak,
    ) -> Self {
        Self {
            store,
            directory,
            tie_break,
        }
    }

    /// Name and manager for `school_id`
    pub async fn lookup(&self, school_id: &str) -> SchoolInfo {
        let stored = self.stored_info(school_id).await;
        if !stored.manager.is_empty() {
            debug!(school_id = %school_id, "Manager name served from store");
            return stored;
        }

        match self.fetch_directory_info(school_id).await {
            Some(fetched) => merge(fetched, stored),
            None => stored,
        }
    }

    /// Stored name and manager, empty when absent or unreadable
    async fn stored_info(&self, school_id: &str) -> SchoolInfo {
        match self.store.find_by_school_id(school_id, self.tie_break).await {
            Ok(Some(record)) => SchoolInfo {
                name: record.school_name,
                manager: record.manager_name,
            },
            Ok(None) => SchoolInfo::default(),
            Err(e) => {
                warn!(school_id = %school_id, error = %e, "Record store unavailable for lookup");
                SchoolInfo::default()
            }
        }
    }

    /// Scraped values, or `None` when the directory could not be read
    async fn fetch_directory_info(&self, school_id: &str) -> Option<DirectoryInfo> {
        match self.directory.fetch(school_id).await {
            Ok(page) => Some(DirectoryInfo::from_page(&page, school_id)),
            Err(e) => {
                warn!(school_id = %school_id, error = %e, "Directory fetch failed, using stored data");
                None
            }
        }
    }
}

/// Combine a successful directory fetch with stored data
pub fn merge(fetched: DirectoryInfo, stored: SchoolInfo) -> SchoolInfo {
    let name = if !fetched.school_name.is_empty() {
        fetched.school_name
    } else if !stored.name.is_empty() {
        stored.name
    } else {
        SCHOOL_NAME_NOT_FOUND.to_string()
    };

    SchoolInfo {
        name,
        manager: fetched.manager_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteRecordStore;
    use crate::directory::DirectoryError;
    use async_trait::async_trait;
    use sar_common::db::{open_in_memory, setup_tables, NewCredentialRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Directory stand-in that counts fetches
    struct FakeDirectory {
        page: Option<String>,
        calls: AtomicUsize,
    }

    impl FakeDirectory {
        fn serving(page: &str) -> Arc<Self> {
            Arc::new(Self {
                page: Some(page.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                page: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DirectorySource for FakeDirectory {
        async fn fetch(&self, _school_id: &str) -> Result<String, DirectoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.page
                .clone()
                .ok_or_else(|| DirectoryError::Network("connection refused".to_string()))
        }
    }

    async fn store_with(records: &[(&str, &str, &str)]) -> Arc<SqliteRecordStore> {
        let pool = open_in_memory().await.unwrap();
        setup_tables(&pool).await.unwrap();
        let store = SqliteRecordStore::new(pool);
        for (school_id, name, manager) in records {
            store
                .insert_record(&NewCredentialRecord {
                    year: "2567".to_string(),
                    school_id: school_id.to_string(),
                    school_name: name.to_string(),
                    manager_name: manager.to_string(),
                    username: "u".to_string(),
                    password: "p".to_string(),
                })
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    const PAGE: &str = "<td>12345678 บ้านทุ่ง อำเภอเมือง</td><h3>นายดำ ขาว</h3>";

    #[tokio::test]
    async fn test_stored_manager_skips_directory() {
        let store = store_with(&[("12345678", "Demo School", "Mr. Stored")]).await;
        let directory = FakeDirectory::serving(PAGE);
        let service = LookupService::new(store, directory.clone(), TieBreak::First);

        let info = service.lookup("12345678").await;

        assert_eq!(info.name, "Demo School");
        assert_eq!(info.manager, "Mr. Stored");
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetched_values_win_when_manager_missing() {
        let store = store_with(&[("12345678", "Demo School", "")]).await;
        let directory = FakeDirectory::serving(PAGE);
        let service = LookupService::new(store, directory.clone(), TieBreak::First);

        let info = service.lookup("12345678").await;

        assert_eq!(info.name, "บ้านทุ่ง");
        assert_eq!(info.manager, "นายดำ ขาว");
        assert_eq!(directory.calls(), 1);
    }

    #[tokio::test]
    async fn test_stored_name_used_when_page_lacks_it() {
        let store = store_with(&[("12345678", "Demo School", "")]).await;
        let directory = FakeDirectory::serving("<h3>นางแดง ส้ม</h3>");
        let service = LookupService::new(store, directory, TieBreak::First);

        let info = service.lookup("12345678").await;

        assert_eq!(info.name, "Demo School");
        assert_eq!(info.manager, "นางแดง ส้ม");
    }

    #[tokio::test]
    async fn test_placeholder_name_when_nothing_known() {
        let store = store_with(&[]).await;
        let directory = FakeDirectory::serving("<html>no data</html>");
        let service = LookupService::new(store, directory, TieBreak::First);

        let info = service.lookup("99999999").await;

        assert_eq!(info.name, SCHOOL_NAME_NOT_FOUND);
        assert_eq!(info.manager, "");
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_store() {
        let store = store_with(&[("12345678", "Demo School", "")]).await;
        let directory = FakeDirectory::failing();
        let service = LookupService::new(store, directory.clone(), TieBreak::First);

        let info = service.lookup("12345678").await;

        assert_eq!(info, SchoolInfo { name: "Demo School".to_string(), manager: String::new() });
        assert_eq!(directory.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_for_unknown_school_is_empty() {
        let store = store_with(&[]).await;
        let service = LookupService::new(store, FakeDirectory::failing(), TieBreak::First);

        assert_eq!(service.lookup("99999999").await, SchoolInfo::default());
    }

    #[tokio::test]
    async fn test_lookup_is_repeatable() {
        let store = store_with(&[("12345678", "Demo School", "")]).await;
        let service = LookupService::new(store, FakeDirectory::serving(PAGE), TieBreak::First);

        let first = service.lookup("12345678").await;
        let second = service.lookup("12345678").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_uninitialized_store_still_consults_directory() {
        let pool = open_in_memory().await.unwrap();
        let store = Arc::new(SqliteRecordStore::new(pool));
        let directory = FakeDirectory::serving(PAGE);
        let service = LookupService::new(store, directory.clone(), TieBreak::First);

        let info = service.lookup("12345678").await;

        assert_eq!(info.name, "บ้านทุ่ง");
        assert_eq!(directory.calls(), 1);
    }

    #[test]
    fn test_merge_prefers_fetched_name() {
        let merged = merge(
            DirectoryInfo {
                school_name: "Fetched".to_string(),
                manager_name: String::new(),
            },
            SchoolInfo {
                name: "Stored".to_string(),
                manager: String::new(),
            },
        );
        assert_eq!(merged.name, "Fetched");
        assert_eq!(merged.manager, "");
    }
}
