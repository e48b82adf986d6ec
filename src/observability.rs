use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::protocol::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "campsite_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "campsite_request_duration_seconds";

// ── Booking lifecycle ───────────────────────────────────────────

pub const BOOKINGS_CREATED_TOTAL: &str = "campsite_bookings_created_total";

pub const BOOKINGS_UPDATED_TOTAL: &str = "campsite_bookings_updated_total";

pub const BOOKINGS_CANCELLED_TOTAL: &str = "campsite_bookings_cancelled_total";

/// Counter: writes rejected because the dates were taken. Labels: op.
pub const CONFLICTS_TOTAL: &str = "campsite_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "campsite_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "campsite_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "campsite_connections_rejected_total";

/// Histogram: WAL append + fsync duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "campsite_wal_flush_duration_seconds";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "campsite_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Request variant to a short label for metrics.
pub fn request_label(req: &Request) -> &'static str {
    match req {
        Request::Create { .. } => "create",
        Request::Get { .. } => "get",
        Request::List { .. } => "list",
        Request::Update { .. } => "update",
        Request::Cancel { .. } => "cancel",
        Request::Availability { .. } => "availability",
    }
}
