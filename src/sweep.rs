//! Background sweeps
//!
//! Two periodic loops, both optional for correctness and bounded in what
//! they touch: completing CONFIRMED bookings whose window has passed, and
//! expiring stale settlement attempts from the guard (the latter lives in
//! [`crate::settlement::guard::spawn_cleanup_task`]).

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::ledger::Ledger;
use crate::lifecycle::TransitionActor;
use crate::types::{BookingStatus, CoreError};

/// Move every overdue CONFIRMED booking to COMPLETED.
///
/// Losing a race against a renter cancellation is fine: the CAS fails with
/// `StaleState` and the booking is simply skipped this pass.
pub fn complete_overdue(ledger: &Ledger) -> usize {
    let now = Utc::now();
    let mut completed = 0;

    for booking_id in ledger.bookings.due_for_completion(now) {
        match ledger.bookings.update_status(
            booking_id,
            BookingStatus::Completed,
            TransitionActor::System,
            BookingStatus::Confirmed,
            now,
        ) {
            Ok(_) => completed += 1,
            Err(CoreError::StaleState(_)) | Err(CoreError::Immutable(_)) => {}
            Err(e) => {
                warn!(booking_id = %booking_id, error = %e, "Completion sweep failed for booking");
            }
        }
    }

    completed
}

/// Spawn the periodic completion sweep.
pub fn spawn_completion_sweep(ledger: Arc<Ledger>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let completed = complete_overdue(&ledger);
            if completed > 0 {
                debug!(completed = completed, "Completion sweep finished");
            }
        }
    });

    info!(interval_secs = interval.as_secs(), "Completion sweep started");
}
