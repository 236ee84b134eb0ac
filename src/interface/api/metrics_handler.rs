//! Prometheus metrics handler

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics exporter and install it as the global recorder
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("callflow_provider_request_duration_seconds".to_string()),
            &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .install_recorder()?;

    // Describe metrics
    describe_counter!(
        "callflow_provider_requests_total",
        "Total number of provider REST requests by operation and outcome"
    );
    describe_histogram!(
        "callflow_provider_request_duration_seconds",
        "Provider REST request duration in seconds"
    );
    describe_counter!(
        "callflow_webhook_events_total",
        "Total number of decoded webhook events by type"
    );
    describe_counter!(
        "callflow_webhook_decode_errors_total",
        "Total number of webhook entries that failed to decode"
    );
    describe_counter!(
        "callflow_phase_transitions_total",
        "Total number of IVR phase transitions"
    );
    describe_counter!(
        "callflow_unhandled_events_total",
        "Total number of events with a reason the IVR flow has no action for"
    );
    describe_counter!("callflow_calls_total", "Total number of calls by direction");
    describe_gauge!(
        "callflow_active_sessions",
        "Number of call sessions currently tracked"
    );

    Ok(handle)
}

/// `GET /metrics`
pub async fn metrics_handler(State(prometheus_handle): State<PrometheusHandle>) -> Response {
    let metrics = prometheus_handle.render();
    (StatusCode::OK, metrics).into_response()
}
