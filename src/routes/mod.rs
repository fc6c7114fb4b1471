//! HTTP routes for the Wheelhouse operation surface
//!
//! Thin JSON handlers over the reservation service and the reconciler.
//! The identity collaborator fronts this service and forwards the actor
//! context in trusted headers (`X-Actor-Id`, `X-Actor-Role`,
//! `X-Actor-Verified`); the core does no authentication of its own.

pub mod bookings;
pub mod health;
pub mod settlements;

pub use bookings::{check_availability, create_asset, create_booking, update_booking_status};
pub use health::{health_check, readiness_check};
pub use settlements::{initiate_settlement, reconcile_settlement};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ActorContext, CoreError, Role};

const MAX_BODY_BYTES: usize = 10240;

/// API error body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

/// Build a JSON response
pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(r#"{"error":"Internal error"}"#)))
                .unwrap()
        })
}

/// Map a core error onto its HTTP status and wire code
pub(crate) fn error_response(err: &CoreError) -> Response<Full<Bytes>> {
    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.to_string(),
            code: err.code(),
        },
    )
}

/// CORS preflight response
pub fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "*")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "error": "Not Found",
            "path": path,
        }),
    )
}

/// Read and decode a JSON request body
pub(crate) async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<Incoming>,
) -> Result<T, CoreError> {
    let body = req
        .collect()
        .await
        .map_err(|e| CoreError::BadRequest(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > MAX_BODY_BYTES {
        return Err(CoreError::BadRequest("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| CoreError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Extract the actor context forwarded by the identity collaborator
pub(crate) fn actor_from_headers(req: &Request<Incoming>) -> Result<ActorContext, CoreError> {
    let header = |name: &str| -> Option<&str> {
        req.headers().get(name).and_then(|v| v.to_str().ok())
    };

    let actor_id = header("X-Actor-Id")
        .ok_or_else(|| CoreError::Unauthorized("Missing X-Actor-Id header".into()))?
        .parse::<Uuid>()
        .map_err(|_| CoreError::Unauthorized("X-Actor-Id is not a valid UUID".into()))?;

    let role = header("X-Actor-Role")
        .ok_or_else(|| CoreError::Unauthorized("Missing X-Actor-Role header".into()))?
        .parse::<Role>()
        .map_err(|_| CoreError::Unauthorized("Unknown X-Actor-Role".into()))?;

    let is_verified = matches!(header("X-Actor-Verified"), Some("true") | Some("1"));

    Ok(ActorContext::new(actor_id, role, is_verified))
}

/// Parse a query string into key/value pairs
pub(crate) fn parse_query(query: &str) -> Vec<(&str, &str)> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect()
}
