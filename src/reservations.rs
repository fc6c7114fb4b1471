//! Reservation service
//!
//! Booking-facing facade over the availability engine, the ledger, and the
//! lifecycle table. Resolves the caller's relationship to the entities
//! involved before any mutation, and maps every operation onto the atomic
//! primitives the ledger provides.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::availability;
use crate::ledger::Ledger;
use crate::lifecycle::TransitionActor;
use crate::types::{
    ActorContext, Asset, Booking, BookingStatus, CoreError, Result, Role,
};

pub struct ReservationService {
    ledger: Arc<Ledger>,
}

impl ReservationService {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Register a rentable asset for the calling owner.
    pub fn register_asset(&self, actor: &ActorContext, rate_minor: u64) -> Result<Asset> {
        if actor.role != Role::Owner {
            return Err(CoreError::Unauthorized(
                "Only owners can register assets".into(),
            ));
        }
        if rate_minor == 0 {
            return Err(CoreError::BadRequest("Rate must be positive".into()));
        }
        self.ledger.assets.insert(Asset::new(actor.actor_id, rate_minor))
    }

    /// Whether `[start, end)` is free for the asset. Advisory; creation
    /// re-checks under the ledger's commit section.
    pub fn is_available(
        &self,
        asset_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        availability::is_available(&self.ledger, asset_id, start, end, now)
    }

    /// Create a booking for the calling renter.
    ///
    /// The availability read here is the advisory check; the ledger's
    /// create re-validates overlap atomically, so a racing creation for the
    /// same window surfaces as `Conflict` even after `true` was observed.
    pub fn create_booking(
        &self,
        actor: &ActorContext,
        asset_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Booking> {
        if actor.role != Role::Renter {
            return Err(CoreError::Unauthorized(
                "Only renters can create bookings".into(),
            ));
        }

        let now = Utc::now();
        availability::validate_window(start, end, now)?;

        let asset = self.ledger.asset(asset_id)?;
        if !asset.available {
            return Err(CoreError::Conflict(format!(
                "Asset {} is not open for booking",
                asset_id
            )));
        }
        if asset.owner_id == actor.actor_id {
            return Err(CoreError::BadRequest(
                "Owners cannot book their own assets".into(),
            ));
        }

        if !availability::is_available(&self.ledger, asset_id, start, end, now)? {
            return Err(CoreError::Conflict(format!(
                "Window [{}, {}) is not available",
                start, end
            )));
        }

        self.ledger
            .bookings
            .create(Booking::new(asset_id, actor.actor_id, start, end), now)
    }

    /// Transition a booking on behalf of the calling actor.
    ///
    /// The actor's relation to the booking is resolved from a fresh read;
    /// the subsequent compare-and-set surfaces `StaleState` if the booking
    /// moved in between, and the caller is expected to re-read and retry
    /// with fresh intent rather than have the core guess.
    pub fn update_booking_status(
        &self,
        actor: &ActorContext,
        booking_id: Uuid,
        target: BookingStatus,
    ) -> Result<Booking> {
        let booking = self.ledger.booking(booking_id)?;
        let transition_actor = self.resolve_relation(actor, &booking)?;

        debug!(
            booking_id = %booking_id,
            target = %target,
            actor = ?transition_actor,
            "Status transition requested"
        );

        self.ledger.bookings.update_status(
            booking_id,
            target,
            transition_actor,
            booking.status,
            Utc::now(),
        )
    }

    /// Map an actor context onto its lifecycle role for a booking.
    fn resolve_relation(
        &self,
        actor: &ActorContext,
        booking: &Booking,
    ) -> Result<TransitionActor> {
        match actor.role {
            Role::System => Ok(TransitionActor::System),
            Role::Renter => {
                if booking.renter_id != actor.actor_id {
                    return Err(CoreError::OwnershipMismatch(format!(
                        "Booking {} does not belong to the caller",
                        booking.id
                    )));
                }
                Ok(TransitionActor::Renter)
            }
            Role::Owner => {
                let asset = self.ledger.asset(booking.asset_id)?;
                if asset.owner_id != actor.actor_id {
                    return Err(CoreError::OwnershipMismatch(format!(
                        "Asset {} is not owned by the caller",
                        asset.id
                    )));
                }
                Ok(TransitionActor::AssetOwner)
            }
        }
    }
}
