//! Request deduplication and rate gate
//!
//! Absorbs rapid repeated settlement initiations (double-clicks, retried
//! requests, back/forward navigation) before they reach the reconciler or
//! the gateway. A fingerprint identifies a logically identical request; at
//! most one attempt per fingerprint may be in flight at any instant, and
//! each actor gets a sliding-window budget of attempts.
//!
//! Attempts are transient: TTL expiry garbage-collects them, which also
//! unblocks legitimately retried payments after abandoned flows.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{CoreError, Result, SettlementEntity};

/// Guard configuration
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// How long an attempt lives before it is expired.
    pub attempt_ttl: Duration,
    /// Attempts allowed per actor within the rate window.
    pub rate_limit: u32,
    /// Sliding rate-limit window.
    pub rate_window: Duration,
    /// Sweep interval for expired attempts.
    pub cleanup_interval: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            attempt_ttl: Duration::from_secs(120),
            rate_limit: 5,
            rate_window: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

/// Status of a settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    InFlight,
    Succeeded,
    Failed,
}

/// A transient settlement attempt record.
#[derive(Debug, Clone)]
struct SettlementAttempt {
    pidx: Option<String>,
    status: AttemptStatus,
    created_at: Instant,
}

/// Guard statistics.
#[derive(Debug, Clone, Default)]
pub struct GuardStats {
    pub attempts: usize,
    pub in_flight: usize,
    pub rejected_duplicates: u64,
    pub rejected_rate: u64,
}

/// Compute the fingerprint of a logical settlement request.
///
/// Deterministic over actor, entity, amount, and (for bookings) the target
/// window, so retries of the same request collide and distinct requests do
/// not.
pub fn fingerprint(
    actor_id: Uuid,
    entity: &SettlementEntity,
    amount_minor: u64,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(actor_id.as_bytes());
    match entity {
        SettlementEntity::Asset(id) => {
            hasher.update(b"asset");
            hasher.update(id.as_bytes());
        }
        SettlementEntity::Booking(id) => {
            hasher.update(b"booking");
            hasher.update(id.as_bytes());
        }
    }
    hasher.update(amount_minor.to_be_bytes());
    if let Some((start, end)) = window {
        hasher.update(start.timestamp_millis().to_be_bytes());
        hasher.update(end.timestamp_millis().to_be_bytes());
    }
    hex::encode(hasher.finalize())
}

/// In-memory attempt guard.
pub struct AttemptGuard {
    attempts: DashMap<String, SettlementAttempt>,
    windows: DashMap<Uuid, VecDeque<Instant>>,
    config: GuardConfig,
    rejected_duplicates: std::sync::atomic::AtomicU64,
    rejected_rate: std::sync::atomic::AtomicU64,
}

impl AttemptGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            attempts: DashMap::new(),
            windows: DashMap::new(),
            config,
            rejected_duplicates: std::sync::atomic::AtomicU64::new(0),
            rejected_rate: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(GuardConfig::default())
    }

    /// Claim the in-flight slot for a fingerprint.
    ///
    /// Test-and-set on the attempt map: an unexpired IN_FLIGHT attempt with
    /// the same fingerprint rejects the call with `DuplicateInFlight`. The
    /// per-actor sliding window is checked afterwards so duplicate
    /// rejections do not consume rate budget; a rate rejection releases the
    /// slot it just claimed.
    pub fn begin(&self, actor_id: Uuid, fp: &str) -> Result<()> {
        use std::sync::atomic::Ordering;

        let fresh = SettlementAttempt {
            pidx: None,
            status: AttemptStatus::InFlight,
            created_at: Instant::now(),
        };

        match self.attempts.entry(fp.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                let existing = slot.get();
                if existing.status == AttemptStatus::InFlight
                    && existing.created_at.elapsed() < self.config.attempt_ttl
                {
                    self.rejected_duplicates.fetch_add(1, Ordering::Relaxed);
                    debug!(fingerprint = fp, "Duplicate settlement attempt rejected");
                    return Err(CoreError::DuplicateInFlight(
                        "An identical settlement attempt is already in flight".into(),
                    ));
                }
                // Expired or finished attempt; take the slot over.
                slot.insert(fresh);
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(fresh);
            }
        }

        // Sliding-window rate limit per actor.
        let mut window = self.windows.entry(actor_id).or_default();
        while window
            .front()
            .is_some_and(|t| t.elapsed() >= self.config.rate_window)
        {
            window.pop_front();
        }
        if window.len() >= self.config.rate_limit as usize {
            drop(window);
            self.attempts.remove(fp);
            self.rejected_rate.fetch_add(1, Ordering::Relaxed);
            debug!(actor_id = %actor_id, "Settlement attempt rate limited");
            return Err(CoreError::RateLimited(format!(
                "More than {} settlement attempts within {}s",
                self.config.rate_limit,
                self.config.rate_window.as_secs()
            )));
        }
        window.push_back(Instant::now());

        Ok(())
    }

    /// Record the token issued for an in-flight attempt.
    pub fn attach_pidx(&self, fp: &str, pidx: &str) {
        if let Some(mut attempt) = self.attempts.get_mut(fp) {
            attempt.pidx = Some(pidx.to_string());
        }
    }

    /// Mark an attempt finished. Finished attempts no longer block; they
    /// linger until TTL expiry for observability.
    pub fn complete(&self, fp: &str, success: bool) {
        if let Some(mut attempt) = self.attempts.get_mut(fp) {
            attempt.status = if success {
                AttemptStatus::Succeeded
            } else {
                AttemptStatus::Failed
            };
        }
    }

    /// Release a slot whose initiation never reached the gateway.
    pub fn discard(&self, fp: &str) {
        self.attempts.remove(fp);
    }

    /// Remove expired attempts and prune idle rate windows.
    pub fn cleanup(&self) -> usize {
        let ttl = self.config.attempt_ttl;
        let expired: Vec<String> = self
            .attempts
            .iter()
            .filter(|a| a.created_at.elapsed() >= ttl)
            .map(|a| a.key().clone())
            .collect();

        let count = expired.len();
        for key in expired {
            self.attempts.remove(&key);
        }

        let rate_window = self.config.rate_window;
        self.windows
            .retain(|_, w| w.back().is_some_and(|t| t.elapsed() < rate_window));

        if count > 0 {
            debug!(count = count, "Expired settlement attempts removed");
        }
        count
    }

    pub fn stats(&self) -> GuardStats {
        use std::sync::atomic::Ordering;
        GuardStats {
            attempts: self.attempts.len(),
            in_flight: self
                .attempts
                .iter()
                .filter(|a| a.status == AttemptStatus::InFlight)
                .count(),
            rejected_duplicates: self.rejected_duplicates.load(Ordering::Relaxed),
            rejected_rate: self.rejected_rate.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

/// Spawn a background task that periodically expires stale attempts.
pub fn spawn_cleanup_task(guard: Arc<AttemptGuard>) {
    let interval = guard.config.cleanup_interval;

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = guard.cleanup();
            if removed > 0 {
                debug!(removed = removed, "Attempt guard cleanup completed");
            }
        }
    });

    info!("Attempt guard cleanup task started");
}
