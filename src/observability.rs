use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reservations committed through the guarded creation path.
pub const RESERVATIONS_CREATED_TOTAL: &str = "lanbook_reservations_created_total";

/// Counter: creation attempts rejected because the slot overlapped.
pub const RESERVATION_CONFLICTS_TOTAL: &str = "lanbook_reservation_conflicts_total";

/// Counter: administrative cancellations.
pub const RESERVATIONS_DELETED_TOTAL: &str = "lanbook_reservations_deleted_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: bookable (active) computers.
pub const RESOURCES_ACTIVE: &str = "lanbook_resources_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "lanbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "lanbook_wal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if the
/// port is None — adapters decide whether metrics are exposed.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
