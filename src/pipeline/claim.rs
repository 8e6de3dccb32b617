//! In-memory claims on work items.
//!
//! A claim keeps one stage instance from selecting the same item twice while
//! it is still being processed. Claims are not persisted and do not
//! coordinate separate processes; markers do that.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::item::ItemId;

/// A thread-safe set of claimed items.
///
/// Each method takes the lock for the duration of one set operation only.
pub trait ClaimSet: Send + Sync {
    /// Claim `id` unless it is already claimed. Returns whether the claim was taken.
    fn try_claim(&self, id: &ItemId) -> bool;

    /// Drop the claim on `id`. Returns whether it was held.
    fn release(&self, id: &ItemId) -> bool;

    fn is_claimed(&self, id: &ItemId) -> bool;
}

/// Default [`ClaimSet`] backed by a mutex-guarded hash set.
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    claimed: Mutex<HashSet<ItemId>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<ItemId>> {
        // The set stays consistent even if a holder panicked mid-insert
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClaimSet for ClaimRegistry {
    fn try_claim(&self, id: &ItemId) -> bool {
        let mut claimed = self.lock();
        if claimed.contains(id) {
            return false;
        }
        claimed.insert(id.clone())
    }

    fn release(&self, id: &ItemId) -> bool {
        self.lock().remove(id)
    }

    fn is_claimed(&self, id: &ItemId) -> bool {
        self.lock().contains(id)
    }
}
