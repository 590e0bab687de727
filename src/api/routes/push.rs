//! Push endpoint (§4.3 Push contract): records that a monitor's token was
//! hit so the next scheduler tick's Push executor sees it as fresh.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct PushQuery {
    pub token: Option<String>,
}

/// GET/POST /push/:monitor_id?token=...
pub async fn record_push(Path(monitor_id): Path<String>, Query(query): Query<PushQuery>, State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let monitor = state
        .config_source
        .monitor(&monitor_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown monitor: {monitor_id}")))?;

    let expected_token = monitor.config.get("token").and_then(|v| v.as_str());
    if let Some(expected) = expected_token {
        if query.token.as_deref() != Some(expected) {
            return Err(ApiError::InvalidRequest("invalid or missing push token".to_string()));
        }
    }

    state.push_tracker.record(&monitor_id).await;
    Ok(Json(json!({ "ok": true })))
}
