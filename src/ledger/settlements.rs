//! Settlement binding store
//!
//! Durable record tying each external settlement token to the local entity
//! it pays for. Token uniqueness is enforced at registration (test-and-set
//! on the entry), and the INITIATED -> SETTLED transition is conditional so
//! the paid effect applies at most once no matter how many reconciliations
//! race.

use dashmap::DashMap;
use tracing::debug;

use crate::types::{BindingState, CoreError, Result, SettlementBinding};

/// Outcome of a conditional settle transition.
pub enum SettleResult {
    /// This call won the transition; the caller must apply the effect.
    Applied(SettlementBinding),
    /// A previous call already settled the binding; replay its outcome.
    AlreadySettled(SettlementBinding),
}

/// Registry of settlement bindings, keyed by token.
pub struct SettlementStore {
    bindings: DashMap<String, SettlementBinding>,
}

impl SettlementStore {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
        }
    }

    /// Bind a token to an entity. A token may only ever be bound once.
    pub fn register(&self, binding: SettlementBinding) -> Result<()> {
        match self.bindings.entry(binding.pidx.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(CoreError::Conflict(format!(
                "Settlement token {} is already bound",
                binding.pidx
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(pidx = %binding.pidx, entity = ?binding.entity, "Settlement binding registered");
                slot.insert(binding);
                Ok(())
            }
        }
    }

    pub fn get(&self, pidx: &str) -> Result<SettlementBinding> {
        self.bindings
            .get(pidx)
            .map(|b| b.clone())
            .ok_or_else(|| CoreError::NotFound(format!("No settlement bound to token {}", pidx)))
    }

    /// Conditionally move the binding to SETTLED.
    ///
    /// Exactly one caller observes `Applied`; every later (or concurrently
    /// losing) caller observes `AlreadySettled` with the stored binding.
    pub fn settle(&self, pidx: &str) -> Result<SettleResult> {
        let mut entry = self
            .bindings
            .get_mut(pidx)
            .ok_or_else(|| CoreError::NotFound(format!("No settlement bound to token {}", pidx)))?;

        if entry.state == BindingState::Settled {
            return Ok(SettleResult::AlreadySettled(entry.clone()));
        }

        entry.state = BindingState::Settled;
        Ok(SettleResult::Applied(entry.clone()))
    }

    /// Record a gateway-reported failure. Never downgrades SETTLED.
    pub fn fail(&self, pidx: &str, reason: &str) -> Result<SettlementBinding> {
        let mut entry = self
            .bindings
            .get_mut(pidx)
            .ok_or_else(|| CoreError::NotFound(format!("No settlement bound to token {}", pidx)))?;

        if entry.state != BindingState::Settled {
            entry.state = BindingState::Failed(reason.to_string());
        }
        Ok(entry.clone())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for SettlementStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SettlementEntity;
    use uuid::Uuid;

    fn binding(pidx: &str) -> SettlementBinding {
        SettlementBinding::new(
            pidx.to_string(),
            SettlementEntity::Asset(Uuid::new_v4()),
            Uuid::new_v4(),
            3000,
            format!("fp-{}", pidx),
        )
    }

    #[test]
    fn test_token_bound_at_most_once() {
        let store = SettlementStore::new();
        store.register(binding("abc123")).unwrap();
        assert!(matches!(
            store.register(binding("abc123")),
            Err(CoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_settle_applies_once() {
        let store = SettlementStore::new();
        store.register(binding("abc123")).unwrap();

        assert!(matches!(
            store.settle("abc123").unwrap(),
            SettleResult::Applied(_)
        ));
        assert!(matches!(
            store.settle("abc123").unwrap(),
            SettleResult::AlreadySettled(_)
        ));
    }

    #[test]
    fn test_fail_never_downgrades_settled() {
        let store = SettlementStore::new();
        store.register(binding("abc123")).unwrap();
        store.settle("abc123").unwrap();

        let b = store.fail("abc123", "Expired").unwrap();
        assert_eq!(b.state, BindingState::Settled);
    }

    #[test]
    fn test_failed_binding_keeps_reason() {
        let store = SettlementStore::new();
        store.register(binding("abc123")).unwrap();

        let b = store.fail("abc123", "Expired").unwrap();
        assert_eq!(b.state, BindingState::Failed("Expired".into()));
    }
}
