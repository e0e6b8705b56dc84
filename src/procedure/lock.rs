// Exclusive region locks, held by one procedure for its whole lifetime

use std::collections::{HashMap, VecDeque};

use super::types::ProcedureId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Acquired,
    /// Another procedure holds the lock; the caller has been queued
    Held { holder: ProcedureId },
}

/// One lock per region key. Re-entrant for the holder; contenders queue in
/// arrival order and are handed out one at a time on release.
#[derive(Debug, Default)]
pub struct RegionLockManager {
    holders: HashMap<String, ProcedureId>,
    waiters: HashMap<String, VecDeque<ProcedureId>>,
}

impl RegionLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&mut self, key: &str, owner: ProcedureId) -> LockStatus {
        match self.holders.get(key) {
            None => {
                self.holders.insert(key.to_string(), owner);
                LockStatus::Acquired
            }
            Some(holder) if *holder == owner => LockStatus::Acquired,
            Some(holder) => {
                let holder = *holder;
                let queue = self.waiters.entry(key.to_string()).or_default();
                if !queue.contains(&owner) {
                    queue.push_back(owner);
                }
                LockStatus::Held { holder }
            }
        }
    }

    /// Release `key` if `owner` holds it. Returns the next waiter, which the
    /// caller should resume so it can acquire the lock itself.
    pub fn release(&mut self, key: &str, owner: ProcedureId) -> Option<ProcedureId> {
        if self.holders.get(key) != Some(&owner) {
            return None;
        }
        self.holders.remove(key);

        let next = self.waiters.get_mut(key).and_then(|queue| queue.pop_front());
        if self.waiters.get(key).is_some_and(|queue| queue.is_empty()) {
            self.waiters.remove(key);
        }
        next
    }

    pub fn holder(&self, key: &str) -> Option<ProcedureId> {
        self.holders.get(key).copied()
    }
}
