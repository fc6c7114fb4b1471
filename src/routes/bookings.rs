//! Booking and asset routes
//!
//! - `POST /api/v1/assets` - register an asset (owner)
//! - `GET  /api/v1/assets/{id}/availability?start=..&end=..`
//! - `POST /api/v1/bookings` - create a booking (renter)
//! - `POST /api/v1/bookings/{id}/status` - transition a booking

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{actor_from_headers, error_response, json_response, parse_json_body, parse_query};
use crate::server::AppState;
use crate::types::{BookingStatus, CoreError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAssetRequest {
    rate_minor: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    asset_id: Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: BookingStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityResponse {
    asset_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    available: bool,
}

/// Handle POST /api/v1/assets
pub async fn create_asset(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let actor = match actor_from_headers(&req) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };
    let body: CreateAssetRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state.reservations.register_asset(&actor, body.rate_minor) {
        Ok(asset) => json_response(StatusCode::CREATED, &asset),
        Err(e) => error_response(&e),
    }
}

/// Handle GET /api/v1/assets/{id}/availability
pub fn check_availability(
    state: Arc<AppState>,
    path: &str,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    let asset_id = match path
        .strip_prefix("/api/v1/assets/")
        .and_then(|rest| rest.strip_suffix("/availability"))
        .and_then(|id| id.parse::<Uuid>().ok())
    {
        Some(id) => id,
        None => {
            return error_response(&CoreError::BadRequest(
                "Expected /api/v1/assets/{id}/availability".into(),
            ));
        }
    };

    let pairs = parse_query(query.unwrap_or(""));
    let date_param = |name: &str| -> Result<DateTime<Utc>, CoreError> {
        let raw = pairs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| CoreError::BadRequest(format!("Missing query parameter: {}", name)))?;
        // '+' arrives as a space in query strings
        DateTime::parse_from_rfc3339(&raw.replace(' ', "+"))
            .map(|d| d.with_timezone(&Utc))
            .map_err(|_| CoreError::BadRequest(format!("{} is not an RFC3339 timestamp", name)))
    };

    let start = match date_param("start") {
        Ok(d) => d,
        Err(e) => return error_response(&e),
    };
    let end = match date_param("end") {
        Ok(d) => d,
        Err(e) => return error_response(&e),
    };

    match state
        .reservations
        .is_available(asset_id, start, end, Utc::now())
    {
        Ok(available) => json_response(
            StatusCode::OK,
            &AvailabilityResponse {
                asset_id,
                start,
                end,
                available,
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// Handle POST /api/v1/bookings
pub async fn create_booking(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let actor = match actor_from_headers(&req) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };
    let body: CreateBookingRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state
        .reservations
        .create_booking(&actor, body.asset_id, body.start_date, body.end_date)
    {
        Ok(booking) => json_response(StatusCode::CREATED, &booking),
        Err(e) => error_response(&e),
    }
}

/// Handle POST /api/v1/bookings/{id}/status
pub async fn update_booking_status(
    state: Arc<AppState>,
    req: Request<Incoming>,
    path: &str,
) -> Response<Full<Bytes>> {
    let booking_id = match path
        .strip_prefix("/api/v1/bookings/")
        .and_then(|rest| rest.strip_suffix("/status"))
        .and_then(|id| id.parse::<Uuid>().ok())
    {
        Some(id) => id,
        None => {
            return error_response(&CoreError::BadRequest(
                "Expected /api/v1/bookings/{id}/status".into(),
            ));
        }
    };

    let actor = match actor_from_headers(&req) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };
    let body: UpdateStatusRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state
        .reservations
        .update_booking_status(&actor, booking_id, body.status)
    {
        Ok(booking) => json_response(StatusCode::OK, &booking),
        Err(e) => error_response(&e),
    }
}
