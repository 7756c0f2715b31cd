//! sar-api library - SAR credential request service
//!
//! Looks up school details for the request form and emails a school's SAR
//! login to whoever requests it, keeping an audit log of every attempt.

use axum::Router;
use sar_common::config::TieBreak;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod directory;
pub mod error;
pub mod fulfillment;
pub mod lookup;
pub mod mailer;

pub use crate::error::{ApiError, ApiResult};

use crate::db::RecordStore;
use crate::directory::DirectorySource;
use crate::fulfillment::FulfillmentService;
use crate::lookup::LookupService;
use crate::mailer::EmailDispatcher;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub lookup: LookupService,
    pub fulfillment: FulfillmentService,
}

impl AppState {
    /// Wire both services to the same store
    pub fn new(
        store: Arc<dyn RecordStore>,
        directory: Arc<dyn DirectorySource>,
        mailer: Arc<dyn EmailDispatcher>,
        tie_break: TieBreak,
    ) -> Self {
        Self {
            lookup: LookupService::new(Arc::clone(&store), directory, tie_break),
            fulfillment: FulfillmentService::new(store, mailer, tie_break),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route(
            "/",
            get(api::handle_action_get).post(api::handle_action_post),
        )
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
