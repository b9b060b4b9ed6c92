//! Prometheus Metrics Module
//!
//! Exposes guard activity in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Stream**: Frames received and rejected, order events dispatched
//! - **Brackets**: Cancellations issued and failed
//! - **Session**: Listen key renewals and reconnects
//!
//! # Integration
//!
//! Metrics are served at `/metrics` on `OCO_GUARD_METRICS_PORT`. When the
//! port is 0 no recorder is installed and every `record_*` call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::orders::OrderRole;

// =============================================================================
// Installation
// =============================================================================

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a tokio runtime. Returns `Ok(false)` when
/// `port` is 0.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn init_metrics(port: u16) -> Result<bool, BuildError> {
    if port == 0 {
        return Ok(false);
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    register_metrics();
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(true)
}

fn register_metrics() {
    describe_counter!(
        "oco_guard_frames_received_total",
        "Total frames received from the user-data stream"
    );
    describe_counter!(
        "oco_guard_frames_rejected_total",
        "Total frames that could not be decoded"
    );
    describe_counter!(
        "oco_guard_order_events_total",
        "Total order events dispatched to the bracket tracker"
    );
    describe_counter!(
        "oco_guard_cancellations_total",
        "Sibling cancellations by outcome"
    );
    describe_counter!(
        "oco_guard_renewals_total",
        "Listen key renewals by outcome"
    );
    describe_counter!(
        "oco_guard_reconnects_total",
        "In-process stream reconnection attempts"
    );
    describe_gauge!(
        "oco_guard_stream_connected",
        "1 while the user-data stream is open"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome label for network side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Call succeeded.
    Ok,
    /// Call failed.
    Failed,
}

impl Outcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
        }
    }
}

/// Record a raw frame read from the stream.
pub fn record_frame_received() {
    counter!("oco_guard_frames_received_total").increment(1);
}

/// Record a frame that failed to decode.
pub fn record_frame_rejected() {
    counter!("oco_guard_frames_rejected_total").increment(1);
}

/// Record an order event handed to the tracker.
pub fn record_order_event(role: OrderRole) {
    counter!("oco_guard_order_events_total", "role" => role.as_str()).increment(1);
}

/// Record the outcome of a sibling cancellation.
pub fn record_cancellation(outcome: Outcome) {
    counter!("oco_guard_cancellations_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record the outcome of a listen key renewal.
pub fn record_renewal(outcome: Outcome) {
    counter!("oco_guard_renewals_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record an in-process reconnection attempt.
pub fn record_reconnect() {
    counter!("oco_guard_reconnects_total").increment(1);
}

/// Flag whether the stream is currently open.
pub fn set_stream_connected(connected: bool) {
    gauge!("oco_guard_stream_connected").set(if connected { 1.0 } else { 0.0 });
}

// =============================================================================
// Tests
// =============================================================================
