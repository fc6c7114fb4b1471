//! Reservation ledger for Wheelhouse
//!
//! The only durable shared mutable resource in the core: assets, bookings,
//! and settlement bindings. All stores are DashMap-sharded; mutations that
//! must be atomic (overlap re-check before insert, compare-and-set status
//! updates, conditional settle transitions) run under the relevant entry
//! guard.

pub mod assets;
pub mod bookings;
pub mod settlements;

pub use assets::AssetStore;
pub use bookings::{BookingLedger, LedgerStats};
pub use settlements::{SettleResult, SettlementStore};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{Asset, Booking, Result};

/// Combined ledger handle shared across the core.
pub struct Ledger {
    pub assets: AssetStore,
    pub bookings: BookingLedger,
    pub settlements: SettlementStore,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            assets: AssetStore::new(),
            bookings: BookingLedger::new(),
            settlements: SettlementStore::new(),
        }
    }

    /// All bookings against assets owned by `owner_id`.
    pub fn bookings_for_owner(&self, owner_id: Uuid) -> Vec<Booking> {
        let asset_ids: Vec<Uuid> = self
            .assets
            .iter_owned_by(owner_id)
            .into_iter()
            .map(|a| a.id)
            .collect();

        let mut out = Vec::new();
        for asset_id in asset_ids {
            out.extend(self.bookings.bookings_for_asset(asset_id));
        }
        out
    }

    /// Active bookings for an asset that overlap the window `[start, end)`
    /// and have not already ended as of `now`.
    pub fn active_overlapping(
        &self,
        asset_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Vec<Booking> {
        self.bookings.active_overlapping(asset_id, start, end, now)
    }

    pub fn asset(&self, id: Uuid) -> Result<Asset> {
        self.assets.get(id)
    }

    pub fn booking(&self, id: Uuid) -> Result<Booking> {
        self.bookings.get(id)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
