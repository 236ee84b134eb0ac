//! Operator action handlers

use super::dto::{ApiError, ApiResponse, DownloadQuery, OperatorQuery};
use super::state::AppState;
use crate::application::{CallSummary, DownloadSummary};
use crate::domain::shared::value_objects::{CorrelationId, ServerCallId};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use tracing::info;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn selector(query: OperatorQuery) -> Option<CorrelationId> {
    query
        .correlation_id
        .filter(|id| !id.trim().is_empty())
        .map(CorrelationId::new)
}

/// `POST /outboundCall`
pub async fn outbound_call(State(state): State<AppState>) -> ApiResult<CallSummary> {
    info!("API: Placing outbound call");
    let summary = state.service.start_outbound_call().await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// `POST /api/answerCall`
pub async fn answer_call(
    State(state): State<AppState>,
    Query(query): Query<OperatorQuery>,
) -> ApiResult<CallSummary> {
    info!("API: Answering call");
    let summary = state.service.answer_call(selector(query)).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// `POST /rejectCall`
pub async fn reject_call(
    State(state): State<AppState>,
    Query(query): Query<OperatorQuery>,
) -> ApiResult<CallSummary> {
    info!("API: Rejecting call");
    let summary = state.service.reject_call(selector(query)).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// `POST /redirect`
pub async fn redirect_call(
    State(state): State<AppState>,
    Query(query): Query<OperatorQuery>,
) -> ApiResult<CallSummary> {
    info!("API: Redirecting call");
    let summary = state.service.redirect_call(selector(query)).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// `POST /hangUp`
pub async fn hang_up(
    State(state): State<AppState>,
    Query(query): Query<OperatorQuery>,
) -> ApiResult<CallSummary> {
    info!("API: Hanging up call");
    let summary = state.service.hang_up(selector(query)).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// `POST /transfer`
pub async fn transfer_call(
    State(state): State<AppState>,
    Query(query): Query<OperatorQuery>,
) -> ApiResult<CallSummary> {
    info!("API: Transferring call");
    let summary = state.service.transfer_call(selector(query)).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// `POST /addParticipant`
pub async fn add_participant(
    State(state): State<AppState>,
    Query(query): Query<OperatorQuery>,
) -> ApiResult<CallSummary> {
    info!("API: Adding participant");
    let summary = state.service.add_participant(selector(query)).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// `GET /download`
pub async fn download_recording(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<DownloadSummary> {
    info!("API: Downloading recording");
    let server_call_id = query
        .server_call_id
        .filter(|id| !id.trim().is_empty())
        .map(ServerCallId::new);
    let summary = state.service.download_recording(server_call_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "OK",
        active_sessions: state.service.store().len().await,
    }))
}
