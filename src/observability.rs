use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking operations. Labels: op, status.
pub const BOOKINGS_TOTAL: &str = "bookd_bookings_total";

/// Histogram: booking operation latency in seconds. Labels: op.
pub const BOOKING_DURATION_SECONDS: &str = "bookd_booking_duration_seconds";

/// Counter: requests rejected because the slot was taken.
pub const CONFLICTS_DETECTED_TOTAL: &str = "bookd_conflicts_detected_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: team-member calendars held in memory.
pub const CALENDARS_ACTIVE: &str = "bookd_calendars_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "bookd_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "bookd_wal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if
/// `port` is `None`.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Install the fmt tracing subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}
