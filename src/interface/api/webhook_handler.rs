//! Webhook handlers for provider event deliveries
//!
//! Deliveries are always acknowledged with 200 so the provider does not
//! redeliver; per-entry failures are only logged. The one exception is the
//! subscription validation handshake, which must echo its code.

use super::dto::{ApiError, CallbackQuery, ValidationResponse};
use super::state::AppState;
use crate::application::CallbackRoute;
use crate::domain::shared::value_objects::Identifier;
use crate::infrastructure::events::{decode_cloud_events, decode_event_grid, DecodedBatch};
use crate::infrastructure::telemetry;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use tracing::{debug, info, warn};

/// `POST /api/incomingCall` (Event Grid)
pub async fn incoming_call(State(state): State<AppState>, body: Bytes) -> Response {
    process_delivery(&state, "incomingCall", decode_event_grid(&body), CallbackRoute::Shared).await
}

/// `POST /api/recordingFileStatus` (Event Grid)
pub async fn recording_file_status(State(state): State<AppState>, body: Bytes) -> Response {
    process_delivery(
        &state,
        "recordingFileStatus",
        decode_event_grid(&body),
        CallbackRoute::Shared,
    )
    .await
}

/// `POST /api/callbacks` (CloudEvents)
pub async fn callbacks(State(state): State<AppState>, body: Bytes) -> Response {
    process_delivery(&state, "callbacks", decode_cloud_events(&body), CallbackRoute::Shared).await
}

/// `POST /api/calls/:context_id?callerId=...` (CloudEvents)
pub async fn call_callbacks(
    State(state): State<AppState>,
    Path(context_id): Path<String>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Response {
    let caller_id = match query.caller_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            Identifier::from_raw_id(&Identifier::normalize_raw_id(raw))
        }
        _ => {
            warn!(context_id = %context_id, "Per-call callback without callerId");
            return ApiError::bad_request("callerId query parameter is required").into_response();
        }
    };

    let route = CallbackRoute::PerCall {
        context_id,
        caller_id,
    };
    process_delivery(&state, "calls", decode_cloud_events(&body), route).await
}

async fn process_delivery(
    state: &AppState,
    endpoint: &str,
    batch: DecodedBatch,
    route: CallbackRoute,
) -> Response {
    for error in &batch.errors {
        telemetry::record_decode_error();
        warn!(endpoint, "Skipping webhook {}", error);
    }

    if let Some(code) = batch.validation_code() {
        info!(endpoint, "Answering subscription validation");
        return Json(ValidationResponse {
            validation_response: code.to_string(),
        })
        .into_response();
    }

    if batch.events.is_empty() {
        debug!(endpoint, "Delivery carried no events");
        return StatusCode::OK.into_response();
    }

    let report = state.service.handle_events(batch.events, &route).await;
    debug!(
        endpoint,
        handled = report.handled,
        failed = report.failed,
        "Delivery processed"
    );
    StatusCode::OK.into_response()
}
