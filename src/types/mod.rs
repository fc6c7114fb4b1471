//! Domain types for Wheelhouse
//!
//! Assets, bookings, actor context, and settlement bindings. Status enums
//! serialize to the wire-visible uppercase values; all timestamps are UTC.

pub mod error;

pub use error::{CoreError, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment state of an asset, owned by the settlement reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Failed,
}

/// Lifecycle status of a booking.
///
/// `Cancelled` and `Completed` are terminal; the transition table in
/// [`crate::lifecycle`] is the only mutation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Active bookings participate in overlap conflict detection.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

/// Role supplied by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Renter,
    Owner,
    System,
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "renter" => Ok(Self::Renter),
            "owner" => Ok(Self::Owner),
            "system" => Ok(Self::System),
            other => Err(CoreError::BadRequest(format!("Unknown role: {}", other))),
        }
    }
}

/// Per-request actor context.
///
/// Supplied by the identity/session collaborator; the core trusts it as
/// given and does no authentication itself. There is no ambient session
/// state - every operation takes this explicitly.
#[derive(Debug, Clone, Copy)]
pub struct ActorContext {
    pub actor_id: Uuid,
    pub role: Role,
    /// KYC-style verification flag from the identity collaborator.
    /// Independent of any payment state; gates settlement initiation.
    pub is_verified: bool,
}

impl ActorContext {
    pub fn new(actor_id: Uuid, role: Role, is_verified: bool) -> Self {
        Self {
            actor_id,
            role,
            is_verified,
        }
    }
}

/// A rentable vehicle listing.
///
/// Created by its owner; `payment_status` and `payment_id` are mutated
/// only by the settlement reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Price per day in currency minor units.
    pub rate_minor: u64,
    pub available: bool,
    pub payment_status: PaymentStatus,
    /// External settlement token bound to this asset's current payment
    /// cycle. Unique across all assets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn new(owner_id: Uuid, rate_minor: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            rate_minor,
            available: true,
            payment_status: PaymentStatus::Unpaid,
            payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A reservation of an asset for a half-open window `[start_date, end_date)`.
///
/// Never physically deleted; terminal bookings are retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub renter_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        asset_id: Uuid,
        renter_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            asset_id,
            renter_id,
            start_date,
            end_date,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The local entity a settlement token is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "type", content = "id")]
pub enum SettlementEntity {
    Asset(Uuid),
    Booking(Uuid),
}

impl SettlementEntity {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Asset(id) | Self::Booking(id) => *id,
        }
    }
}

/// State of a settlement binding.
///
/// Only `Settled` replays idempotently; a `Failed` binding may be
/// re-queried because the gateway-side state can still progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingState {
    Initiated,
    Settled,
    Failed(String),
}

/// Durable record tying an external settlement token to a local entity
/// between initiation and reconciliation.
#[derive(Debug, Clone)]
pub struct SettlementBinding {
    pub pidx: String,
    pub entity: SettlementEntity,
    pub actor_id: Uuid,
    pub amount_minor: u64,
    /// Request fingerprint of the initiating call; ties the binding back to
    /// its slot in the dedup guard.
    pub fingerprint: String,
    pub state: BindingState,
    pub created_at: DateTime<Utc>,
}

impl SettlementBinding {
    pub fn new(
        pidx: String,
        entity: SettlementEntity,
        actor_id: Uuid,
        amount_minor: u64,
        fingerprint: String,
    ) -> Self {
        Self {
            pidx,
            entity,
            actor_id,
            amount_minor,
            fingerprint,
            state: BindingState::Initiated,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_status_wire_values() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(
            serde_json::to_string(&BookingStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Unpaid).unwrap(),
            "\"UNPAID\""
        );
    }

    #[test]
    fn test_terminal_and_active_sets() {
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Completed.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());

        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(!BookingStatus::Completed.is_active());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("renter".parse::<Role>().unwrap(), Role::Renter);
        assert_eq!("OWNER".parse::<Role>().unwrap(), Role::Owner);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_new_booking_starts_pending() {
        let now = Utc::now();
        let b = Booking::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            now + chrono::Duration::days(1),
            now + chrono::Duration::days(3),
        );
        assert_eq!(b.status, BookingStatus::Pending);
    }
}
