use crate::domain::value_objects::OwnerScope;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Tracks which scopes have a sync pass in flight.
#[derive(Debug, Default)]
pub struct ScopeGuards {
    active: Mutex<HashSet<OwnerScope>>,
}

/// Held for the duration of one pass; releasing it (drop) frees the scope.
#[derive(Debug)]
pub struct ScopeToken {
    guards: Arc<ScopeGuards>,
    scope: OwnerScope,
}

impl ScopeGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when a pass for `scope` is already running; the caller drops its request.
    pub fn try_acquire(self: &Arc<Self>, scope: &OwnerScope) -> Option<ScopeToken> {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(scope.clone()) {
            return None;
        }
        Some(ScopeToken {
            guards: Arc::clone(self),
            scope: scope.clone(),
        })
    }

    pub fn is_active(&self, scope: &OwnerScope) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(scope))
            .unwrap_or(false)
    }
}

impl Drop for ScopeToken {
    fn drop(&mut self) {
        let mut active = self
            .guards
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.scope);
    }
}
