//! Availability engine
//!
//! Pure computation over a ledger snapshot: may a candidate window become a
//! booking for this asset? Booking windows are half-open `[start, end)`, so
//! back-to-back rentals that touch at a boundary do not conflict.
//!
//! The answer is advisory: availability and booking creation are not atomic
//! from the caller's perspective, and the ledger re-validates overlap under
//! its per-asset commit section. A `true` here only guarantees no committed
//! booking overlapped the window as of the read.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ledger::Ledger;
use crate::types::{CoreError, Result};

/// Standard half-open interval overlap test.
pub fn windows_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Validate a candidate window: well-formed and not in the past.
pub fn validate_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    if start >= end {
        return Err(CoreError::BadRequest(
            "Window start must be before end".into(),
        ));
    }
    if end <= now {
        return Err(CoreError::BadRequest(
            "Window must not lie entirely in the past".into(),
        ));
    }
    Ok(())
}

/// Whether `[start, end)` is free of active bookings for the asset.
///
/// Considers bookings with status PENDING or CONFIRMED whose end has not
/// already passed. No side effects.
pub fn is_available(
    ledger: &Ledger,
    asset_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<bool> {
    validate_window(start, end, now)?;

    // Asset must exist; a missing asset is an error, not "available".
    ledger.asset(asset_id)?;

    Ok(ledger.active_overlapping(asset_id, start, end, now).is_empty())
}
