use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking attempts by outcome. Labels: outcome.
pub const BOOKINGS_TOTAL: &str = "drivetime_bookings_total";

/// Histogram: booking transaction latency in seconds.
pub const BOOKING_DURATION_SECONDS: &str = "drivetime_booking_duration_seconds";

/// Counter: rejected bookings by conflict source. Labels: source.
pub const CONFLICTS_TOTAL: &str = "drivetime_conflicts_total";

/// Counter: slot candidates offered to callers.
pub const SLOTS_OFFERED_TOTAL: &str = "drivetime_slots_offered_total";

// ── Degradation metrics ─────────────────────────────────────────

/// Counter: external calendar checks that could not be verified.
pub const EXTERNAL_CHECK_UNVERIFIED_TOTAL: &str = "drivetime_external_check_unverified_total";

/// Counter: post-commit calendar pushes that failed (booking kept).
pub const EXTERNAL_SYNC_FAILURES_TOTAL: &str = "drivetime_external_sync_failures_total";

/// Counter: credit deductions that failed after the reservation committed.
/// Every increment has a matching `drivetime::reconcile` log line.
pub const CREDIT_RECONCILIATIONS_TOTAL: &str = "drivetime_credit_reconciliations_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of active schools (loaded engines).
pub const SCHOOLS_ACTIVE: &str = "drivetime_schools_active";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
