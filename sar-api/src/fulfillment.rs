//! Credential request fulfillment
//!
//! Matches a submitted school id against the credential table, records an
//! optional manager-name correction, emails the credentials and writes one
//! request log row. Every attempt that reaches the store is logged exactly
//! once, whatever the outcome, and no error escapes to the caller: failures
//! become `{ success: false, message }` responses.

use chrono::Utc;
use sar_common::config::TieBreak;
use sar_common::db::{CredentialRecord, LogEntry, LogStatus};
use sar_common::text;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::RecordStore;
use crate::mailer::EmailDispatcher;

/// User-facing response texts
pub mod messages {
    pub const NOT_SET_UP: &str =
        "ระบบยังไม่ได้ตั้งค่าฐานข้อมูล กรุณารันคำสั่ง \"sar-api setup\" บนเซิร์ฟเวอร์";
    pub const SCHOOL_NOT_FOUND: &str = "ไม่พบรหัสโรงเรียน 8 หลักนี้ในระบบ";
    pub const CREDENTIALS_SENT: &str = "ระบบได้ส่ง Username และ Password ไปยังอีเมลของท่านแล้ว";
    pub const SEND_FAILED: &str = "เกิดข้อผิดพลาดในการส่งอีเมล";
    pub const ERROR_PREFIX: &str = "เกิดข้อผิดพลาด: ";
}

/// Form submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FulfillmentRequest {
    #[serde(rename = "schoolId", default, deserialize_with = "text::deserialize")]
    pub school_id: String,
    #[serde(default, deserialize_with = "text::deserialize")]
    pub email: String,
    /// Requester's name
    #[serde(default, deserialize_with = "text::deserialize")]
    pub name: String,
    /// Numeric phones lose any leading zero; the form sends text
    #[serde(default, deserialize_with = "text::deserialize")]
    pub phone: String,
    /// `null` counts as no correction
    #[serde(rename = "managerName", default, deserialize_with = "text::deserialize")]
    pub manager_name: String,
}

/// Answer returned to the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentResponse {
    pub success: bool,
    pub message: String,
}

impl FulfillmentResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Validates submissions, emails credentials and keeps the audit log
#[derive(Clone)]
pub struct FulfillmentService {
    store: Arc<dyn RecordStore>,
    mailer: Arc<dyn EmailDispatcher>,
    tie_break: TieBreak,
}

impl FulfillmentService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        mailer: Arc<dyn EmailDispatcher>,
        tie_break: TieBreak,
    ) -> Self {
        Self {
            store,
            mailer,
            tie_break,
        }
    }

    /// Handle one submission
    pub async fn fulfill(&self, request: &FulfillmentRequest) -> FulfillmentResponse {
        // Without tables there is nowhere to log to
        match self.store.is_initialized().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Credential request received before setup");
                return FulfillmentResponse::failure(messages::NOT_SET_UP);
            }
            Err(e) => {
                return self
                    .finish(request, "", LogStatus::Error(e.to_string()))
                    .await;
            }
        }

        let record = match self
            .store
            .find_by_school_id(&request.school_id, self.tie_break)
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => return self.finish(request, "", LogStatus::NotFound).await,
            Err(e) => {
                return self
                    .finish(request, "", LogStatus::Error(e.to_string()))
                    .await
            }
        };

        if let Err(e) = self.apply_manager_correction(&record, &request.manager_name).await {
            return self
                .finish(request, &record.year, LogStatus::Error(e.to_string()))
                .await;
        }

        let status = match self
            .mailer
            .send(&request.email, &record.year, &record.username, &record.password)
            .await
        {
            Ok(true) => LogStatus::Sent,
            Ok(false) => LogStatus::ApiError,
            Err(e) => LogStatus::Error(e.to_string()),
        };

        self.finish(request, &record.year, status).await
    }

    /// Persist a non-empty manager name onto the matched record
    async fn apply_manager_correction(
        &self,
        record: &CredentialRecord,
        manager_name: &str,
    ) -> sar_common::Result<()> {
        let manager_name = manager_name.trim();
        if manager_name.is_empty() {
            return Ok(());
        }

        self.store
            .update_manager_name(record.row_id, manager_name)
            .await?;
        info!(
            school_id = %record.school_id,
            year = %record.year,
            "Manager name updated from request"
        );
        Ok(())
    }

    /// Write the log row for this attempt and build the matching response
    async fn finish(
        &self,
        request: &FulfillmentRequest,
        year: &str,
        status: LogStatus,
    ) -> FulfillmentResponse {
        let response = match &status {
            LogStatus::Sent => FulfillmentResponse::success(messages::CREDENTIALS_SENT),
            LogStatus::NotFound => FulfillmentResponse::failure(messages::SCHOOL_NOT_FOUND),
            LogStatus::ApiError => FulfillmentResponse::failure(messages::SEND_FAILED),
            LogStatus::Error(detail) => {
                FulfillmentResponse::failure(format!("{}{}", messages::ERROR_PREFIX, detail))
            }
        };

        let entry = LogEntry {
            timestamp: Utc::now(),
            year: year.to_string(),
            school_id: request.school_id.clone(),
            requester_name: request.name.clone(),
            manager_name: request.manager_name.clone(),
            phone: request.phone.clone(),
            email: request.email.clone(),
            status,
        };

        if let Err(e) = self.store.append_log(&entry).await {
            error!(
                school_id = %entry.school_id,
                status = %entry.status,
                error = %e,
                "Failed to write request log"
            );
        } else {
            info!(school_id = %entry.school_id, status = %entry.status, "Credential request logged");
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteRecordStore;
    use crate::mailer::MailError;
    use async_trait::async_trait;
    use sar_common::db::{open_in_memory, setup_tables, NewCredentialRecord};
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Reply {
        Accept,
        Reject,
        Fail,
    }

    /// Mailer stand-in that records what it was asked to send
    struct FakeMailer {
        reply: Reply,
        sent: Mutex<Vec<(String, String, String, String)>>,
    }

    impl FakeMailer {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<(String, String, String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailDispatcher for FakeMailer {
        async fn send(
            &self,
            recipient_email: &str,
            year: &str,
            username: &str,
            password: &str,
        ) -> Result<bool, MailError> {
            self.sent.lock().unwrap().push((
                recipient_email.to_string(),
                year.to_string(),
                username.to_string(),
                password.to_string(),
            ));
            match self.reply {
                Reply::Accept => Ok(true),
                Reply::Reject => Ok(false),
                Reply::Fail => Err(MailError::Transport("dns error".to_string())),
            }
        }
    }

    async fn demo_store() -> (Arc<SqliteRecordStore>, i64) {
        let pool = open_in_memory().await.unwrap();
        setup_tables(&pool).await.unwrap();
        let store = SqliteRecordStore::new(pool);
        let row_id = store
            .insert_record(&NewCredentialRecord {
                year: "2024".to_string(),
                school_id: "12345678".to_string(),
                school_name: "Demo School".to_string(),
                manager_name: String::new(),
                username: "u1".to_string(),
                password: "p1".to_string(),
            })
            .await
            .unwrap();
        (Arc::new(store), row_id)
    }

    fn submission(school_id: &str, manager_name: &str) -> FulfillmentRequest {
        FulfillmentRequest {
            school_id: school_id.to_string(),
            email: "a@b.com".to_string(),
            name: "Req".to_string(),
            phone: "0800000000".to_string(),
            manager_name: manager_name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_request_updates_manager_and_logs_sent() {
        let (store, row_id) = demo_store().await;
        let mailer = FakeMailer::new(Reply::Accept);
        let service = FulfillmentService::new(store.clone(), mailer.clone(), TieBreak::First);

        let response = service.fulfill(&submission("12345678", "Mr. X")).await;

        assert!(response.success);
        assert_eq!(response.message, messages::CREDENTIALS_SENT);
        assert_eq!(
            store.get_record(row_id).await.unwrap().unwrap().manager_name,
            "Mr. X"
        );
        assert_eq!(
            mailer.sent(),
            vec![(
                "a@b.com".to_string(),
                "2024".to_string(),
                "u1".to_string(),
                "p1".to_string()
            )]
        );

        let logs = store.recent_logs(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::Sent);
        assert_eq!(logs[0].year, "2024");
        assert_eq!(logs[0].requester_name, "Req");
        assert_eq!(logs[0].manager_name, "Mr. X");
    }

    #[tokio::test]
    async fn test_unknown_school_logs_not_found_with_empty_year() {
        let (store, _) = demo_store().await;
        let mailer = FakeMailer::new(Reply::Accept);
        let service = FulfillmentService::new(store.clone(), mailer.clone(), TieBreak::First);

        let response = service.fulfill(&submission("99999999", "Mr. X")).await;

        assert!(!response.success);
        assert_eq!(response.message, messages::SCHOOL_NOT_FOUND);
        assert!(mailer.sent().is_empty());

        let logs = store.recent_logs(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::NotFound);
        assert_eq!(logs[0].year, "");
    }

    #[tokio::test]
    async fn test_provider_rejection_logs_api_error() {
        let (store, _) = demo_store().await;
        let service =
            FulfillmentService::new(store.clone(), FakeMailer::new(Reply::Reject), TieBreak::First);

        let response = service.fulfill(&submission("12345678", "")).await;

        assert!(!response.success);
        assert_eq!(response.message, messages::SEND_FAILED);
        let logs = store.recent_logs(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::ApiError);
    }

    #[tokio::test]
    async fn test_transport_failure_logs_error_detail() {
        let (store, _) = demo_store().await;
        let service =
            FulfillmentService::new(store.clone(), FakeMailer::new(Reply::Fail), TieBreak::First);

        let response = service.fulfill(&submission("12345678", "")).await;

        assert!(!response.success);
        assert!(response.message.starts_with(messages::ERROR_PREFIX));
        assert!(response.message.contains("dns error"));

        let logs = store.recent_logs(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        match &logs[0].status {
            LogStatus::Error(detail) => assert!(detail.contains("dns error")),
            other => panic!("Expected error status, got {:?}", other),
        }
        assert_eq!(logs[0].year, "2024");
    }

    #[tokio::test]
    async fn test_empty_manager_name_leaves_record_untouched() {
        let (store, row_id) = demo_store().await;
        store.update_manager_name(row_id, "นายเดิม อยู่").await.unwrap();
        let service =
            FulfillmentService::new(store.clone(), FakeMailer::new(Reply::Accept), TieBreak::First);

        service.fulfill(&submission("12345678", "")).await;
        service.fulfill(&submission("12345678", "   ")).await;

        assert_eq!(
            store.get_record(row_id).await.unwrap().unwrap().manager_name,
            "นายเดิม อยู่"
        );
        assert_eq!(store.count_logs().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_manager_updated_even_when_email_fails() {
        let (store, row_id) = demo_store().await;
        let service =
            FulfillmentService::new(store.clone(), FakeMailer::new(Reply::Reject), TieBreak::First);

        service.fulfill(&submission("12345678", "Mr. Y")).await;

        assert_eq!(
            store.get_record(row_id).await.unwrap().unwrap().manager_name,
            "Mr. Y"
        );
    }

    #[tokio::test]
    async fn test_not_set_up_is_reported_and_not_logged() {
        let pool = open_in_memory().await.unwrap();
        let store = Arc::new(SqliteRecordStore::new(pool));
        let mailer = FakeMailer::new(Reply::Accept);
        let service = FulfillmentService::new(store, mailer.clone(), TieBreak::First);

        let response = service.fulfill(&submission("12345678", "")).await;

        assert!(!response.success);
        assert_eq!(response.message, messages::NOT_SET_UP);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_latest_year_policy_picks_newest_credentials() {
        let (store, _) = demo_store().await;
        store
            .insert_record(&NewCredentialRecord {
                year: "2025".to_string(),
                school_id: "12345678".to_string(),
                school_name: "Demo School".to_string(),
                manager_name: String::new(),
                username: "u2".to_string(),
                password: "p2".to_string(),
            })
            .await
            .unwrap();
        let mailer = FakeMailer::new(Reply::Accept);
        let service = FulfillmentService::new(store, mailer.clone(), TieBreak::LatestYear);

        service.fulfill(&submission("12345678", "")).await;

        assert_eq!(mailer.sent()[0].1, "2025");
        assert_eq!(mailer.sent()[0].2, "u2");
    }
}
