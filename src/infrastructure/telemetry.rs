//! Metric recording helpers
//!
//! Recorded through the `metrics` facade; the Prometheus exporter installed
//! by the interface layer renders them.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one provider REST call
pub fn record_provider_request(operation: &str, outcome: &str, duration: Duration) {
    counter!(
        "callflow_provider_requests_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!(
        "callflow_provider_request_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record one decoded webhook event
pub fn record_webhook_event(event_type: &str) {
    counter!("callflow_webhook_events_total", "type" => event_type.to_string()).increment(1);
}

/// Record a webhook entry that failed to decode
pub fn record_decode_error() {
    counter!("callflow_webhook_decode_errors_total").increment(1);
}

/// Record a phase transition of the IVR flow
pub fn record_transition(from: &str, to: &str) {
    counter!(
        "callflow_phase_transitions_total",
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Record an event whose reason the flow has no action for
pub fn record_unhandled_event(event: &str) {
    counter!("callflow_unhandled_events_total", "event" => event.to_string()).increment(1);
}

/// Record a call entering the session store
pub fn record_call_started(direction: &str) {
    counter!("callflow_calls_total", "direction" => direction.to_string()).increment(1);
}

pub fn update_active_sessions(count: usize) {
    gauge!("callflow_active_sessions").set(count as f64);
}
