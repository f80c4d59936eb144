//! Prometheus Metrics Module
//!
//! Exposes ingestion metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: WebSocket frames and classified events per feed
//! - **Routing**: Records routed per channel, pending queue depth
//! - **Delivery**: Scheduler delivered/queued/failed totals
//! - **Connections**: Feed connected gauge, reconnects, auth failures
//!
//! # Integration
//!
//! The exporter serves `/metrics` on its own HTTP listener
//! (`TICKSCOPE_METRICS_PORT`).

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::application::services::scheduler::SchedulerStats;
use crate::domain::event::{EventKind, SymbolClass};

// =============================================================================
// Exporter
// =============================================================================

static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder and start its HTTP listener on `port`.
///
/// Subsequent calls are no-ops and return the first listener address.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn init_metrics(port: u16) -> Result<SocketAddr, BuildError> {
    if let Some(addr) = INSTALLED.get() {
        return Ok(*addr);
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    register_metrics();
    Ok(*INSTALLED.get_or_init(|| addr))
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "tickscope_frames_received_total",
        "Total WebSocket text frames received per feed"
    );
    describe_counter!(
        "tickscope_events_classified_total",
        "Total market events classified by kind"
    );
    describe_counter!(
        "tickscope_events_unrecognized_total",
        "Total messages skipped by the classifier"
    );
    describe_counter!(
        "tickscope_records_routed_total",
        "Total records routed per channel"
    );

    describe_gauge!(
        "tickscope_pending_jobs",
        "Jobs waiting for a consumer per channel"
    );
    describe_gauge!(
        "tickscope_scheduler_jobs",
        "Scheduler totals by outcome (delivered, queued, failed)"
    );

    describe_gauge!(
        "tickscope_feed_connected",
        "1 while the feed is authenticated and subscribed"
    );
    describe_counter!(
        "tickscope_reconnects_total",
        "Total WebSocket reconnection attempts"
    );
    describe_counter!(
        "tickscope_auth_failures_total",
        "Total rejected or refused authentication attempts"
    );
    describe_counter!(
        "tickscope_websocket_errors_total",
        "Total WebSocket errors by type"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a text frame received on a feed.
pub fn record_frame_received(feed: SymbolClass) {
    counter!("tickscope_frames_received_total", "feed" => feed.as_str()).increment(1);
}

/// Record a classified market event.
pub fn record_event_classified(feed: SymbolClass, kind: EventKind) {
    counter!(
        "tickscope_events_classified_total",
        "feed" => feed.as_str(),
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a message the classifier skipped.
pub fn record_unrecognized_event(feed: SymbolClass) {
    counter!("tickscope_events_unrecognized_total", "feed" => feed.as_str()).increment(1);
}

/// Record a record routed into a channel.
pub fn record_routed(channel: &str) {
    counter!("tickscope_records_routed_total", "channel" => channel.to_string()).increment(1);
}

/// Update a channel's pending queue depth.
#[allow(clippy::cast_precision_loss)]
pub fn set_pending_depth(channel: &str, depth: usize) {
    gauge!("tickscope_pending_jobs", "channel" => channel.to_string()).set(depth as f64);
}

/// Publish scheduler totals.
#[allow(clippy::cast_precision_loss)]
pub fn set_scheduler_stats(stats: SchedulerStats) {
    gauge!("tickscope_scheduler_jobs", "outcome" => "delivered").set(stats.delivered as f64);
    gauge!("tickscope_scheduler_jobs", "outcome" => "queued").set(stats.queued as f64);
    gauge!("tickscope_scheduler_jobs", "outcome" => "failed").set(stats.failed as f64);
}

/// Mark a feed connected or disconnected.
pub fn set_feed_connected(feed: SymbolClass, connected: bool) {
    gauge!("tickscope_feed_connected", "feed" => feed.as_str())
        .set(if connected { 1.0 } else { 0.0 });
}

/// Record a reconnection attempt.
pub fn record_reconnect(feed: SymbolClass) {
    counter!("tickscope_reconnects_total", "feed" => feed.as_str()).increment(1);
}

/// Record a failed authentication.
pub fn record_auth_failure(feed: SymbolClass) {
    counter!("tickscope_auth_failures_total", "feed" => feed.as_str()).increment(1);
}

/// Record a WebSocket error.
pub fn record_websocket_error(feed: SymbolClass, error_type: &'static str) {
    counter!(
        "tickscope_websocket_errors_total",
        "feed" => feed.as_str(),
        "error_type" => error_type
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use metrics_exporter_prometheus::PrometheusBuilder;

    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_frame_received(SymbolClass::Equity);
        record_event_classified(SymbolClass::Option, EventKind::Quote);
        set_pending_depth("stock_price", 3);
        set_scheduler_stats(SchedulerStats::default());
    }

    #[test]
    fn rendered_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_event_classified(SymbolClass::Equity, EventKind::Trade);
            record_routed("stock_price");
            set_feed_connected(SymbolClass::Option, true);
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"tickscope_events_classified_total{feed="equity",kind="trade"} 1"#));
        assert!(rendered.contains(r#"tickscope_records_routed_total{channel="stock_price"} 1"#));
        assert!(rendered.contains(r#"tickscope_feed_connected{feed="option"} 1"#));
    }
}
