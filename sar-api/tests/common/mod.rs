//! Shared helpers for sar-api integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use sar_api::db::SqliteRecordStore;
use sar_api::directory::{DirectoryError, DirectorySource};
use sar_api::mailer::{EmailDispatcher, MailError};
use sar_common::db::{open_in_memory, setup_tables, NewCredentialRecord};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fresh in-memory store with tables created
pub async fn setup_store() -> Arc<SqliteRecordStore> {
    let pool = open_in_memory().await.expect("Should open in-memory database");
    setup_tables(&pool).await.expect("Should create tables");
    Arc::new(SqliteRecordStore::new(pool))
}

/// In-memory store without tables
pub async fn setup_uninitialized_store() -> Arc<SqliteRecordStore> {
    let pool = open_in_memory().await.expect("Should open in-memory database");
    Arc::new(SqliteRecordStore::new(pool))
}

pub fn credential(year: &str, school_id: &str, school_name: &str, manager_name: &str) -> NewCredentialRecord {
    NewCredentialRecord {
        year: year.to_string(),
        school_id: school_id.to_string(),
        school_name: school_name.to_string(),
        manager_name: manager_name.to_string(),
        username: format!("user-{}", year),
        password: format!("pass-{}", year),
    }
}

/// Directory stand-in serving a fixed page (or failing) and counting calls
pub struct StaticDirectory {
    page: Option<String>,
    calls: AtomicUsize,
}

impl StaticDirectory {
    pub fn serving(page: &str) -> Arc<Self> {
        Arc::new(Self {
            page: Some(page.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            page: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectorySource for StaticDirectory {
    async fn fetch(&self, _school_id: &str) -> Result<String, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.page
            .clone()
            .ok_or_else(|| DirectoryError::Network("unreachable".to_string()))
    }
}

/// What a recording mailer answers
#[derive(Clone, Copy)]
pub enum MailReply {
    Accept,
    Reject,
    Fail,
}

/// (recipient, year, username, password)
pub type SentMail = (String, String, String, String);

/// Mailer stand-in that records every send
pub struct RecordingMailer {
    reply: MailReply,
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn new(reply: MailReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailDispatcher for RecordingMailer {
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
            MailReply::Accept => Ok(true),
            MailReply::Reject => Ok(false),
            MailReply::Fail => Err(MailError::Transport("connection reset".to_string())),
        }
    }
}

/// Serve `router` on an ephemeral local port, returning `http://addr`
pub async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Should bind ephemeral port");
    let addr = listener.local_addr().expect("Should have local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Stub server failed");
    });
    format!("http://{}", addr)
}

/// An address nothing is listening on
pub async fn closed_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Should bind ephemeral port");
    let addr = listener.local_addr().expect("Should have local address");
    drop(listener);
    format!("http://{}", addr)
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
