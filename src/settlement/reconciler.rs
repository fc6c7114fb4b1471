//! Settlement reconciler
//!
//! Converts an externally-verified payment into a durable ledger effect
//! exactly once per token, no matter how many times the client-facing
//! verification call is invoked.
//!
//! ## Guarantees
//!
//! - `initiate` never reaches the gateway without passing the dedup/rate
//!   gate first.
//! - `reconcile` applies the paid effect through one conditional SETTLED
//!   transition on the binding; retried calls replay the stored success
//!   without another gateway query or mutation.
//! - Gateway network/5xx failures leave all state untouched so the caller
//!   can retry; business mismatches are terminal for the attempt.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ledger::{Ledger, SettleResult};
use crate::lifecycle::TransitionActor;
use crate::settlement::gateway::{GatewayStatus, InitiateRequest, SettlementGateway};
use crate::settlement::guard::{fingerprint, AttemptGuard};
use crate::types::{
    ActorContext, BindingState, BookingStatus, CoreError, Result, SettlementBinding,
    SettlementEntity,
};

/// Request to start a payment for an entity the actor owns.
#[derive(Debug, Clone)]
pub struct InitiateSettlementRequest {
    pub entity: SettlementEntity,
    pub amount_minor: u64,
}

/// A started settlement: the client is redirected to `payment_url` and
/// returns with `pidx`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedSettlement {
    pub pidx: String,
    pub payment_url: String,
}

/// Terminal disposition of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "state")]
pub enum SettlementState {
    Settled,
    #[serde(rename_all = "camelCase")]
    Declined { gateway_status: String },
}

/// Result of a reconciliation round trip.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementOutcome {
    pub pidx: String,
    pub entity: SettlementEntity,
    pub amount_minor: u64,
    #[serde(flatten)]
    pub state: SettlementState,
}

/// Drives initiate/lookup against the gateway and owns all payment-state
/// mutations in the ledger.
pub struct Reconciler {
    ledger: Arc<Ledger>,
    gateway: Arc<dyn SettlementGateway>,
    guard: Arc<AttemptGuard>,
}

impl Reconciler {
    pub fn new(
        ledger: Arc<Ledger>,
        gateway: Arc<dyn SettlementGateway>,
        guard: Arc<AttemptGuard>,
    ) -> Self {
        Self {
            ledger,
            gateway,
            guard,
        }
    }

    pub fn guard(&self) -> &Arc<AttemptGuard> {
        &self.guard
    }

    /// Start a payment cycle for an asset listing or a pending booking.
    ///
    /// The actor must be verified and must own the entity (asset owner for
    /// assets, booking renter for bookings). The call passes the dedup/rate
    /// gate before any gateway traffic; a gateway failure releases the slot
    /// and surfaces as retryable.
    pub async fn initiate(
        &self,
        actor: &ActorContext,
        request: InitiateSettlementRequest,
    ) -> Result<InitiatedSettlement> {
        if !actor.is_verified {
            return Err(CoreError::Unauthorized(
                "Settlement requires a verified account".into(),
            ));
        }
        if request.amount_minor == 0 {
            return Err(CoreError::BadRequest("Amount must be positive".into()));
        }

        let (order_name, window) = match request.entity {
            SettlementEntity::Asset(asset_id) => {
                let asset = self.ledger.asset(asset_id)?;
                if asset.owner_id != actor.actor_id {
                    return Err(CoreError::OwnershipMismatch(format!(
                        "Asset {} is not owned by the caller",
                        asset_id
                    )));
                }
                (format!("Listing fee for asset {}", asset_id), None)
            }
            SettlementEntity::Booking(booking_id) => {
                let booking = self.ledger.booking(booking_id)?;
                if booking.renter_id != actor.actor_id {
                    return Err(CoreError::OwnershipMismatch(format!(
                        "Booking {} does not belong to the caller",
                        booking_id
                    )));
                }
                if booking.status != BookingStatus::Pending {
                    return Err(CoreError::Conflict(format!(
                        "Booking {} is {}; only pending bookings can be settled",
                        booking_id, booking.status
                    )));
                }
                (
                    format!("Rental booking {}", booking_id),
                    Some((booking.start_date, booking.end_date)),
                )
            }
        };

        let fp = fingerprint(actor.actor_id, &request.entity, request.amount_minor, window);
        self.guard.begin(actor.actor_id, &fp)?;

        let initiated = match self
            .gateway
            .initiate(InitiateRequest {
                amount: request.amount_minor,
                purchase_order_id: request.entity.id().to_string(),
                purchase_order_name: order_name,
                return_url: String::new(),
            })
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                // Nothing was committed; free the slot for a clean retry.
                self.guard.discard(&fp);
                return Err(e);
            }
        };

        let binding = SettlementBinding::new(
            initiated.pidx.clone(),
            request.entity,
            actor.actor_id,
            request.amount_minor,
            fp.clone(),
        );
        if let Err(e) = self.ledger.settlements.register(binding) {
            self.guard.discard(&fp);
            return Err(e);
        }

        if let SettlementEntity::Asset(asset_id) = request.entity {
            self.ledger
                .assets
                .begin_payment_cycle(asset_id, &initiated.pidx)?;
        }

        self.guard.attach_pidx(&fp, &initiated.pidx);

        info!(
            pidx = %initiated.pidx,
            entity = ?request.entity,
            amount = request.amount_minor,
            "Settlement initiated"
        );

        Ok(InitiatedSettlement {
            pidx: initiated.pidx,
            payment_url: initiated.payment_url,
        })
    }

    /// Verify a settlement token with the gateway and apply its effect.
    pub async fn reconcile(&self, actor: &ActorContext, pidx: &str) -> Result<SettlementOutcome> {
        let binding = self.ledger.settlements.get(pidx)?;

        if binding.actor_id != actor.actor_id {
            return Err(CoreError::OwnershipMismatch(format!(
                "Settlement {} was not initiated by the caller",
                pidx
            )));
        }

        // Idempotence: a settled binding replays its success without
        // touching the gateway or the ledger again.
        if binding.state == BindingState::Settled {
            debug!(pidx = pidx, "Replaying settled outcome");
            return Ok(settled_outcome(&binding));
        }

        let lookup = self.gateway.lookup(pidx).await?;

        if lookup.status != GatewayStatus::Completed {
            let status = lookup.status.to_string();
            self.ledger.settlements.fail(pidx, &status)?;
            if let SettlementEntity::Asset(asset_id) = binding.entity {
                self.ledger.assets.mark_failed(asset_id, pidx)?;
            }
            self.guard.complete(&binding.fingerprint, false);

            warn!(pidx = pidx, status = %status, "Settlement not completed at gateway");
            return Ok(SettlementOutcome {
                pidx: pidx.to_string(),
                entity: binding.entity,
                amount_minor: binding.amount_minor,
                state: SettlementState::Declined {
                    gateway_status: status,
                },
            });
        }

        // Defense against tampering: the gateway-reported amount must match
        // the amount recorded at initiation, bit-exactly.
        if lookup.total_amount != binding.amount_minor {
            self.guard.complete(&binding.fingerprint, false);
            return Err(CoreError::AmountMismatch {
                expected: binding.amount_minor,
                actual: lookup.total_amount,
            });
        }

        // Single conditional transition; exactly one caller applies the
        // effect even under concurrent reconciliations.
        match self.ledger.settlements.settle(pidx)? {
            SettleResult::AlreadySettled(b) => Ok(settled_outcome(&b)),
            SettleResult::Applied(b) => {
                self.apply_effect(&b)?;
                self.guard.complete(&b.fingerprint, true);
                info!(pidx = pidx, entity = ?b.entity, "Settlement applied");
                Ok(settled_outcome(&b))
            }
        }
    }

    /// Apply the paid effect to the bound entity.
    fn apply_effect(&self, binding: &SettlementBinding) -> Result<()> {
        match binding.entity {
            SettlementEntity::Asset(asset_id) => {
                self.ledger.assets.mark_paid(asset_id, &binding.pidx)?;
                Ok(())
            }
            SettlementEntity::Booking(booking_id) => self.confirm_booking(booking_id),
        }
    }

    /// Confirm a paid booking through the lifecycle table, tolerating
    /// concurrent transitions.
    fn confirm_booking(&self, booking_id: Uuid) -> Result<()> {
        loop {
            let booking = self.ledger.booking(booking_id)?;
            match booking.status {
                BookingStatus::Pending => {
                    match self.ledger.bookings.update_status(
                        booking_id,
                        BookingStatus::Confirmed,
                        TransitionActor::Settlement,
                        BookingStatus::Pending,
                        Utc::now(),
                    ) {
                        Ok(_) => return Ok(()),
                        Err(CoreError::StaleState(_)) => continue,
                        Err(e) => return Err(e),
                    }
                }
                BookingStatus::Confirmed => return Ok(()),
                BookingStatus::Cancelled | BookingStatus::Completed => {
                    // Payment verified for a booking that left the active
                    // set in the meantime; the money side is settled, the
                    // refund path is a human decision.
                    warn!(
                        booking_id = %booking_id,
                        status = %booking.status,
                        "Settled payment for a terminal booking"
                    );
                    return Ok(());
                }
            }
        }
    }
}

fn settled_outcome(binding: &SettlementBinding) -> SettlementOutcome {
    SettlementOutcome {
        pidx: binding.pidx.clone(),
        entity: binding.entity,
        amount_minor: binding.amount_minor,
        state: SettlementState::Settled,
    }
}
