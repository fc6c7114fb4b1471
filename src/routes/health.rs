//! Health check endpoints
//!
//! - /health, /healthz - liveness probe
//! - /readyz - readiness probe

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    healthy: bool,
    version: &'static str,
    timestamp: String,
    mode: String,
    node_id: String,
    ledger: LedgerStatus,
    guard: GuardStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LedgerStatus {
    assets: usize,
    bookings: usize,
    settlements: usize,
    conflicts: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GuardStatus {
    attempts: usize,
    in_flight: usize,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let booking_stats = state.ledger.bookings.stats();
    let guard_stats = state.guard.stats();

    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: state.args.node_id.to_string(),
        ledger: LedgerStatus {
            assets: state.ledger.assets.len(),
            bookings: booking_stats.bookings,
            settlements: state.ledger.settlements.len(),
            conflicts: booking_stats.conflicts,
        },
        guard: GuardStatus {
            attempts: guard_stats.attempts,
            in_flight: guard_stats.in_flight,
        },
    }
}

/// Handle liveness probe (/health, /healthz)
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &build_health_response(state))
}

/// Handle readiness probe (/readyz)
///
/// The ledger is in-process, so readiness only requires validated
/// configuration; the gateway is consulted lazily per settlement.
pub fn readiness_check(state: &AppState) -> Response<Full<Bytes>> {
    let status = if state.args.validate().is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &build_health_response(state))
}
