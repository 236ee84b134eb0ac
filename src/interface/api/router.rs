//! API Router configuration

use super::metrics_handler::metrics_handler;
use super::operator_handler::{
    add_participant, answer_call, download_recording, hang_up, health_check, outbound_call,
    redirect_call, reject_call, transfer_call,
};
use super::state::AppState;
use super::webhook_handler::{call_callbacks, callbacks, incoming_call, recording_file_status};
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Build the API router.
///
/// `/metrics` is only mounted when a Prometheus handle is supplied; prompt
/// files are served from `audio_dir` under `/audio`.
pub fn build_router(
    state: AppState,
    prometheus_handle: Option<PrometheusHandle>,
    audio_dir: &Path,
) -> Router {
    // Health check route
    let health_routes = Router::new().route("/health", get(health_check));

    // Provider webhooks
    let webhook_routes = Router::new()
        .route("/api/incomingCall", post(incoming_call))
        .route("/api/recordingFileStatus", post(recording_file_status))
        .route("/api/callbacks", post(callbacks))
        .route("/api/calls/:context_id", post(call_callbacks));

    // Operator actions
    let operator_routes = Router::new()
        .route("/outboundCall", post(outbound_call))
        .route("/api/answerCall", post(answer_call))
        .route("/rejectCall", post(reject_call))
        .route("/redirect", post(redirect_call))
        .route("/hangUp", post(hang_up))
        .route("/transfer", post(transfer_call))
        .route("/addParticipant", post(add_participant))
        .route("/download", get(download_recording));

    let mut router = Router::new()
        .merge(health_routes)
        .merge(webhook_routes)
        .merge(operator_routes)
        .with_state(state)
        .nest_service("/audio", ServeDir::new(audio_dir));

    // Metrics route (separate state)
    if let Some(prometheus_handle) = prometheus_handle {
        let metrics_routes = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(prometheus_handle);
        router = router.merge(metrics_routes);
    }

    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
