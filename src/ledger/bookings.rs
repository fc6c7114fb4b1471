//! Booking ledger
//!
//! Durable record of bookings per asset and the single write path for
//! booking state. Creation re-validates overlap inside a per-asset atomic
//! section: the availability engine's earlier read is advisory only, and
//! two renters racing for the same window must not both commit.
//!
//! Lock order is always the per-asset index entry before the bookings map;
//! status updates touch only the bookings map.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;
use uuid::Uuid;

use crate::availability::windows_overlap;
use crate::lifecycle::{self, TransitionActor};
use crate::types::{Booking, BookingStatus, CoreError, Result};

/// Ledger counters, exposed on the status surface.
#[derive(Debug, Clone, Default)]
pub struct LedgerStats {
    pub bookings: usize,
    pub created: u64,
    pub conflicts: u64,
    pub transitions: u64,
}

/// Booking storage with per-asset conflict enforcement.
pub struct BookingLedger {
    bookings: DashMap<Uuid, Booking>,
    /// Booking ids per asset; the entry guard for an asset doubles as the
    /// commit-time exclusive section for that asset's window checks.
    by_asset: DashMap<Uuid, Vec<Uuid>>,
    created: AtomicU64,
    conflicts: AtomicU64,
    transitions: AtomicU64,
}

impl BookingLedger {
    pub fn new() -> Self {
        Self {
            bookings: DashMap::new(),
            by_asset: DashMap::new(),
            created: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            transitions: AtomicU64::new(0),
        }
    }

    /// Commit a new booking.
    ///
    /// Overlap against the asset's active bookings is re-checked under the
    /// asset's index entry guard immediately before insert, so at most one
    /// of two concurrently submitted overlapping windows can succeed; the
    /// loser gets `Conflict`.
    pub fn create(&self, booking: Booking, now: DateTime<Utc>) -> Result<Booking> {
        if booking.start_date >= booking.end_date {
            return Err(CoreError::BadRequest(
                "Booking start must be before end".into(),
            ));
        }

        let mut index = self.by_asset.entry(booking.asset_id).or_default();

        for id in index.iter() {
            if let Some(existing) = self.bookings.get(id) {
                if existing.status.is_active()
                    && existing.end_date >= now
                    && windows_overlap(
                        booking.start_date,
                        booking.end_date,
                        existing.start_date,
                        existing.end_date,
                    )
                {
                    self.conflicts.fetch_add(1, Ordering::Relaxed);
                    return Err(CoreError::Conflict(format!(
                        "Window [{}, {}) overlaps booking {}",
                        booking.start_date, booking.end_date, existing.id
                    )));
                }
            }
        }

        self.bookings.insert(booking.id, booking.clone());
        index.push(booking.id);
        self.created.fetch_add(1, Ordering::Relaxed);

        info!(
            booking_id = %booking.id,
            asset_id = %booking.asset_id,
            start = %booking.start_date,
            end = %booking.end_date,
            "Booking created"
        );
        Ok(booking)
    }

    pub fn get(&self, id: Uuid) -> Result<Booking> {
        self.bookings
            .get(&id)
            .map(|b| b.clone())
            .ok_or_else(|| CoreError::NotFound(format!("Booking {} not found", id)))
    }

    /// Transition a booking's status.
    ///
    /// Compare-and-set against `expected_current` under the booking's entry
    /// lock: concurrent transitions for the same booking are serialized, and
    /// the loser of a race observes `StaleState` and must re-read. Legality
    /// of the transition itself is delegated to the lifecycle table while
    /// the lock is held.
    pub fn update_status(
        &self,
        id: Uuid,
        target: BookingStatus,
        actor: TransitionActor,
        expected_current: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut entry = self
            .bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Booking {} not found", id)))?;

        if entry.status != expected_current {
            return Err(CoreError::StaleState(format!(
                "Booking {} is {} (expected {})",
                id, entry.status, expected_current
            )));
        }

        lifecycle::validate(entry.status, target, actor, entry.end_date, now)?;

        let from = entry.status;
        entry.status = target;
        entry.updated_at = Utc::now();
        self.transitions.fetch_add(1, Ordering::Relaxed);

        info!(booking_id = %id, from = %from, to = %target, ?actor, "Booking transitioned");
        Ok(entry.clone())
    }

    /// All bookings ever recorded for an asset, terminal ones included.
    pub fn bookings_for_asset(&self, asset_id: Uuid) -> Vec<Booking> {
        let Some(index) = self.by_asset.get(&asset_id) else {
            return Vec::new();
        };
        index
            .iter()
            .filter_map(|id| self.bookings.get(id).map(|b| b.clone()))
            .collect()
    }

    /// Bookings made by a renter.
    pub fn bookings_for_renter(&self, renter_id: Uuid) -> Vec<Booking> {
        self.bookings
            .iter()
            .filter(|b| b.renter_id == renter_id)
            .map(|b| b.clone())
            .collect()
    }

    /// Active bookings of an asset overlapping `[start, end)` that have not
    /// ended as of `now`.
    pub fn active_overlapping(
        &self,
        asset_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Vec<Booking> {
        self.bookings_for_asset(asset_id)
            .into_iter()
            .filter(|b| {
                b.status.is_active()
                    && b.end_date >= now
                    && windows_overlap(start, end, b.start_date, b.end_date)
            })
            .collect()
    }

    /// CONFIRMED bookings whose window has passed; candidates for the
    /// completion sweep.
    pub fn due_for_completion(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        self.bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed && b.end_date <= now)
            .map(|b| b.id)
            .collect()
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            bookings: self.bookings.len(),
            created: self.created.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
        }
    }
}

impl Default for BookingLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn window(now: DateTime<Utc>, from_days: i64, to_days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        (now + Duration::days(from_days), now + Duration::days(to_days))
    }

    #[test]
    fn test_create_rejects_inverted_window() {
        let ledger = BookingLedger::new();
        let now = Utc::now();
        let (start, end) = window(now, 3, 1);
        let booking = Booking::new(Uuid::new_v4(), Uuid::new_v4(), start, end);
        assert!(matches!(
            ledger.create(booking, now),
            Err(CoreError::BadRequest(_))
        ));
    }

    #[test]
    fn test_overlap_conflicts_boundary_touch_allowed() {
        let ledger = BookingLedger::new();
        let now = Utc::now();
        let asset_id = Uuid::new_v4();

        let (s1, e1) = window(now, 1, 5);
        ledger
            .create(Booking::new(asset_id, Uuid::new_v4(), s1, e1), now)
            .unwrap();

        // [3, 7) overlaps [1, 5)
        let (s2, e2) = window(now, 3, 7);
        let res = ledger.create(Booking::new(asset_id, Uuid::new_v4(), s2, e2), now);
        assert!(matches!(res, Err(CoreError::Conflict(_))));

        // [5, 7) touches the boundary of the half-open interval; allowed
        let (s3, e3) = window(now, 5, 7);
        assert!(ledger
            .create(Booking::new(asset_id, Uuid::new_v4(), s3, e3), now)
            .is_ok());
    }

    #[test]
    fn test_cancelled_booking_frees_window() {
        let ledger = BookingLedger::new();
        let now = Utc::now();
        let asset_id = Uuid::new_v4();
        let renter = Uuid::new_v4();

        let (start, end) = window(now, 1, 5);
        let b = ledger
            .create(Booking::new(asset_id, renter, start, end), now)
            .unwrap();
        ledger
            .update_status(
                b.id,
                BookingStatus::Cancelled,
                TransitionActor::Renter,
                BookingStatus::Pending,
                now,
            )
            .unwrap();

        // Same window is available again
        assert!(ledger
            .create(Booking::new(asset_id, Uuid::new_v4(), start, end), now)
            .is_ok());
    }

    #[test]
    fn test_concurrent_overlapping_creates_one_wins() {
        let ledger = Arc::new(BookingLedger::new());
        let now = Utc::now();
        let asset_id = Uuid::new_v4();
        let (start, end) = window(now, 1, 5);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                ledger.create(Booking::new(asset_id, Uuid::new_v4(), start, end), now)
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(CoreError::Conflict(_))))
            .count();

        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);
    }

    #[test]
    fn test_stale_state_on_unexpected_current() {
        let ledger = BookingLedger::new();
        let now = Utc::now();
        let (start, end) = window(now, 1, 5);
        let b = ledger
            .create(Booking::new(Uuid::new_v4(), Uuid::new_v4(), start, end), now)
            .unwrap();

        // Owner confirms
        ledger
            .update_status(
                b.id,
                BookingStatus::Confirmed,
                TransitionActor::AssetOwner,
                BookingStatus::Pending,
                now,
            )
            .unwrap();

        // A caller still holding the PENDING snapshot loses the race
        let res = ledger.update_status(
            b.id,
            BookingStatus::Cancelled,
            TransitionActor::Renter,
            BookingStatus::Pending,
            now,
        );
        assert!(matches!(res, Err(CoreError::StaleState(_))));
    }

    #[test]
    fn test_due_for_completion() {
        let ledger = BookingLedger::new();
        let now = Utc::now();
        let asset_id = Uuid::new_v4();

        // Booking that ended yesterday, confirmed at creation time
        let created_at = now - Duration::days(10);
        let b = ledger
            .create(
                Booking::new(
                    asset_id,
                    Uuid::new_v4(),
                    now - Duration::days(5),
                    now - Duration::days(1),
                ),
                created_at,
            )
            .unwrap();
        ledger
            .update_status(
                b.id,
                BookingStatus::Confirmed,
                TransitionActor::AssetOwner,
                BookingStatus::Pending,
                created_at,
            )
            .unwrap();

        let due = ledger.due_for_completion(now);
        assert_eq!(due, vec![b.id]);
    }
}
