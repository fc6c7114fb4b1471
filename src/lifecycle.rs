//! Booking lifecycle state machine
//!
//! One transition table, one validation function. Every status change in
//! the system - renter cancellations, owner confirmations, settlement
//! confirmations, the completion sweep - passes through [`validate`] while
//! the booking's entry lock is held.
//!
//! States: `PENDING -> {CONFIRMED, CANCELLED}`, `CONFIRMED -> {CANCELLED,
//! COMPLETED, PENDING (owner revert)}`. `CANCELLED` and `COMPLETED` are
//! terminal.

use chrono::{DateTime, Utc};

use crate::types::{BookingStatus, CoreError, Result};

/// Who is driving a transition. Resolved from the actor context and the
/// booking/asset ownership before the table is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionActor {
    /// The booking's renter.
    Renter,
    /// The owner of the booked asset.
    AssetOwner,
    /// The settlement reconciler, confirming a paid booking.
    Settlement,
    /// The time-based completion sweep.
    System,
}

/// Check a proposed transition against the table.
///
/// Terminal-state bookings fail `Immutable`; everything outside the table
/// fails `InvalidTransition`. The `System -> COMPLETED` row additionally
/// requires the booking window to have passed.
pub fn validate(
    current: BookingStatus,
    target: BookingStatus,
    actor: TransitionActor,
    end_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    use BookingStatus::*;
    use TransitionActor::*;

    if current.is_terminal() {
        return Err(CoreError::Immutable(format!(
            "Booking is {} and can no longer change",
            current
        )));
    }

    if target == current {
        return Err(CoreError::InvalidTransition(format!(
            "Booking is already {}",
            current
        )));
    }

    let allowed = match (actor, current, target) {
        // Renter may withdraw an active booking.
        (Renter, Pending | Confirmed, Cancelled) => true,

        // Owner accepts, rejects, or explicitly reverts a confirmation.
        (AssetOwner, Pending, Confirmed) => true,
        (AssetOwner, Pending | Confirmed, Cancelled) => true,
        (AssetOwner, Confirmed, Pending) => true,

        // A verified payment confirms a pending booking.
        (Settlement, Pending, Confirmed) => true,

        // The sweep completes a booking once its window has passed.
        (System, Confirmed, Completed) => {
            if end_date > now {
                return Err(CoreError::InvalidTransition(format!(
                    "Booking does not end until {}",
                    end_date
                )));
            }
            true
        }

        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition(format!(
            "{:?} may not move a {} booking to {}",
            actor, current, target
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn check(
        current: BookingStatus,
        target: BookingStatus,
        actor: TransitionActor,
    ) -> Result<()> {
        let now = Utc::now();
        validate(current, target, actor, now + Duration::days(1), now)
    }

    #[test]
    fn test_renter_cancels_active() {
        assert!(check(BookingStatus::Pending, BookingStatus::Cancelled, TransitionActor::Renter).is_ok());
        assert!(check(BookingStatus::Confirmed, BookingStatus::Cancelled, TransitionActor::Renter).is_ok());
    }

    #[test]
    fn test_renter_cannot_confirm_or_complete() {
        assert!(matches!(
            check(BookingStatus::Pending, BookingStatus::Confirmed, TransitionActor::Renter),
            Err(CoreError::InvalidTransition(_))
        ));
        assert!(matches!(
            check(BookingStatus::Confirmed, BookingStatus::Completed, TransitionActor::Renter),
            Err(CoreError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_owner_confirm_cancel_revert() {
        assert!(check(BookingStatus::Pending, BookingStatus::Confirmed, TransitionActor::AssetOwner).is_ok());
        assert!(check(BookingStatus::Pending, BookingStatus::Cancelled, TransitionActor::AssetOwner).is_ok());
        assert!(check(BookingStatus::Confirmed, BookingStatus::Cancelled, TransitionActor::AssetOwner).is_ok());
        // Revert only from CONFIRMED
        assert!(check(BookingStatus::Confirmed, BookingStatus::Pending, TransitionActor::AssetOwner).is_ok());
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        for terminal in [BookingStatus::Cancelled, BookingStatus::Completed] {
            for target in [
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                BookingStatus::Cancelled,
                BookingStatus::Completed,
            ] {
                for actor in [
                    TransitionActor::Renter,
                    TransitionActor::AssetOwner,
                    TransitionActor::Settlement,
                    TransitionActor::System,
                ] {
                    let res = check(terminal, target, actor);
                    assert!(
                        matches!(res, Err(CoreError::Immutable(_))),
                        "{:?} -> {:?} by {:?} must be immutable",
                        terminal,
                        target,
                        actor
                    );
                }
            }
        }
    }

    #[test]
    fn test_self_transition_rejected() {
        assert!(matches!(
            check(BookingStatus::Pending, BookingStatus::Pending, TransitionActor::AssetOwner),
            Err(CoreError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_settlement_confirms_pending_only() {
        assert!(check(BookingStatus::Pending, BookingStatus::Confirmed, TransitionActor::Settlement).is_ok());
        assert!(check(BookingStatus::Confirmed, BookingStatus::Pending, TransitionActor::Settlement).is_err());
    }

    #[test]
    fn test_system_completion_requires_elapsed_window() {
        let now = Utc::now();

        // Window still running
        let res = validate(
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            TransitionActor::System,
            now + Duration::hours(2),
            now,
        );
        assert!(matches!(res, Err(CoreError::InvalidTransition(_))));

        // Window passed
        assert!(validate(
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            TransitionActor::System,
            now - Duration::hours(2),
            now,
        )
        .is_ok());

        // Pending bookings are never completed by the sweep
        assert!(validate(
            BookingStatus::Pending,
            BookingStatus::Completed,
            TransitionActor::System,
            now - Duration::hours(2),
            now,
        )
        .is_err());
    }
}
