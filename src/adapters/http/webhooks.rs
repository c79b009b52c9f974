//! Webhook ingestion endpoint.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiError;
use super::server::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub alerts_count: usize,
    pub integration_id: Uuid,
    pub timestamp: String,
}

/// `POST /webhook/{type}/{integration_id}`.
///
/// No bearer auth: the integration ID (plus its stored type) authenticates
/// the sender. Per-alert failures are swallowed by the pipeline; only an
/// unknown integration, an inactive one, a type mismatch, or a wholly
/// unparseable payload reach the sender as errors.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Path((integration_type, integration_id)): Path<(String, Uuid)>,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let payload: Value = serde_json::from_str(&body)
        .map_err(|_| ApiError::bad_request("request body is not valid JSON"))?;

    let report = state
        .ingest
        .handle_webhook(&integration_type, integration_id, &payload)
        .await?;

    Ok(Json(WebhookResponse {
        alerts_count: report.alerts_count,
        integration_id: report.integration_id,
        timestamp: report.timestamp.to_rfc3339(),
    }))
}
