//! Asset store
//!
//! Registration and lookup of rentable assets, plus the payment-cycle
//! mutations reserved to the settlement reconciler. `payment_status` and
//! `payment_id` must never be written from anywhere else.

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::types::{Asset, CoreError, PaymentStatus, Result};

/// In-memory asset registry.
pub struct AssetStore {
    assets: DashMap<Uuid, Asset>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self {
            assets: DashMap::new(),
        }
    }

    /// Register a new asset. Fails if the id is already present.
    pub fn insert(&self, asset: Asset) -> Result<Asset> {
        match self.assets.entry(asset.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(CoreError::Conflict(format!(
                "Asset {} already registered",
                asset.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(asset_id = %asset.id, owner_id = %asset.owner_id, "Asset registered");
                slot.insert(asset.clone());
                Ok(asset)
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Result<Asset> {
        self.assets
            .get(&id)
            .map(|a| a.clone())
            .ok_or_else(|| CoreError::NotFound(format!("Asset {} not found", id)))
    }

    /// Flip the listing availability flag (owner-side operation).
    pub fn set_available(&self, id: Uuid, available: bool) -> Result<Asset> {
        let mut entry = self
            .assets
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Asset {} not found", id)))?;
        entry.available = available;
        entry.updated_at = chrono::Utc::now();
        Ok(entry.clone())
    }

    /// Start a new payment cycle: bind a fresh settlement token and reset
    /// the payment state to UNPAID. Reconciler-only.
    pub fn begin_payment_cycle(&self, id: Uuid, pidx: &str) -> Result<Asset> {
        let mut entry = self
            .assets
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Asset {} not found", id)))?;
        entry.payment_id = Some(pidx.to_string());
        entry.payment_status = PaymentStatus::Unpaid;
        entry.updated_at = chrono::Utc::now();
        debug!(asset_id = %id, pidx = pidx, "Payment cycle started");
        Ok(entry.clone())
    }

    /// Conditionally mark the asset PAID for the given token.
    ///
    /// No-op (returning the current state) if the asset is already PAID,
    /// so concurrent reconciliations apply the effect at most once. Fails
    /// if the token does not belong to the asset's current cycle.
    pub fn mark_paid(&self, id: Uuid, pidx: &str) -> Result<Asset> {
        let mut entry = self
            .assets
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Asset {} not found", id)))?;

        if entry.payment_id.as_deref() != Some(pidx) {
            return Err(CoreError::NotFound(format!(
                "Token {} is not bound to asset {}",
                pidx, id
            )));
        }

        if entry.payment_status != PaymentStatus::Paid {
            entry.payment_status = PaymentStatus::Paid;
            entry.updated_at = chrono::Utc::now();
        }
        Ok(entry.clone())
    }

    /// Mark the current payment cycle FAILED. Never downgrades PAID.
    pub fn mark_failed(&self, id: Uuid, pidx: &str) -> Result<Asset> {
        let mut entry = self
            .assets
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Asset {} not found", id)))?;

        if entry.payment_id.as_deref() != Some(pidx) {
            return Err(CoreError::NotFound(format!(
                "Token {} is not bound to asset {}",
                pidx, id
            )));
        }

        if entry.payment_status != PaymentStatus::Paid {
            entry.payment_status = PaymentStatus::Failed;
            entry.updated_at = chrono::Utc::now();
        }
        Ok(entry.clone())
    }

    /// Assets owned by the given actor.
    pub fn iter_owned_by(&self, owner_id: Uuid) -> Vec<Asset> {
        self.assets
            .iter()
            .filter(|a| a.owner_id == owner_id)
            .map(|a| a.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new()
    }
}
