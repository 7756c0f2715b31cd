//! Form actions
//!
//! The request form talks to a single URL:
//! - `GET /?action=getSchoolInfo&schoolId=...` looks a school up
//! - `POST /` with `{ "action": "processRequest", "data": {...} }` submits a
//!   credential request
//!
//! The POST body is read as plain text whatever its content type, since the
//! form posts `text/plain` to stay clear of CORS preflight.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::fulfillment::{FulfillmentRequest, FulfillmentResponse};
use crate::AppState;

const ACTION_GET_SCHOOL_INFO: &str = "getSchoolInfo";
const ACTION_PROCESS_REQUEST: &str = "processRequest";

/// Query parameters for GET /
#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    pub action: Option<String>,
    #[serde(rename = "schoolId")]
    pub school_id: Option<String>,
}

/// Body of POST /
#[derive(Debug, Deserialize)]
struct ActionEnvelope {
    #[serde(default)]
    action: String,
    #[serde(default)]
    data: Value,
}

/// GET /
pub async fn handle_action_get(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
) -> Response {
    match query.action.as_deref() {
        Some(ACTION_GET_SCHOOL_INFO) => {
            let school_id = query.school_id.unwrap_or_default();
            let info = state.lookup.lookup(&school_id).await;
            Json(info).into_response()
        }
        _ => Json(json!({ "message": "API is active" })).into_response(),
    }
}

/// POST /
pub async fn handle_action_post(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<FulfillmentResponse>> {
    let envelope: ActionEnvelope = serde_json::from_str(&body)
        .map_err(|e| ApiError::BadRequest(format!("Body is not valid JSON: {}", e)))?;

    if envelope.action != ACTION_PROCESS_REQUEST {
        debug!(action = %envelope.action, "Unknown POST action");
        return Ok(Json(FulfillmentResponse {
            success: false,
            message: "Invalid action".to_string(),
        }));
    }

    let request: FulfillmentRequest = serde_json::from_value(envelope.data)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request data: {}", e)))?;

    Ok(Json(state.fulfillment.fulfill(&request).await))
}
