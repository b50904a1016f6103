//! Per-source exclusion for trim and merge jobs.
//!
//! At most one job may hold a given source video at a time. A job claims all
//! of its sources at once; if any of them is already held the whole claim is
//! refused with [`CoreError::Conflict`] and nothing is held. Claims are
//! released when the returned [`SourceGuard`] is dropped, including on panic
//! or early return.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::CoreError;
use crate::types::DbId;

/// Registry of source videos currently used by an in-flight job.
#[derive(Debug, Default, Clone)]
pub struct SourceLocks {
    held: Arc<Mutex<HashSet<DbId>>>,
}

impl SourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<DbId>> {
        // The set is only touched in short critical sections that cannot
        // leave it inconsistent, so a poisoned lock is still usable.
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim every id in `ids` (duplicates allowed) or none of them.
    pub fn try_acquire(&self, ids: &[DbId]) -> Result<SourceGuard, CoreError> {
        let wanted: BTreeSet<DbId> = ids.iter().copied().collect();
        let mut held = self.held();

        let busy: Vec<DbId> = wanted.iter().copied().filter(|id| held.contains(id)).collect();
        if !busy.is_empty() {
            return Err(CoreError::Conflict(format!(
                "Video(s) {busy:?} already have a job in progress"
            )));
        }

        held.extend(wanted.iter().copied());
        Ok(SourceGuard {
            locks: self.clone(),
            ids: wanted,
        })
    }

    /// Whether `id` is currently claimed.
    pub fn is_held(&self, id: DbId) -> bool {
        self.held().contains(&id)
    }
}

/// Releases its claimed sources on drop.
#[derive(Debug)]
pub struct SourceGuard {
    locks: SourceLocks,
    ids: BTreeSet<DbId>,
}

impl SourceGuard {
    pub fn ids(&self) -> impl Iterator<Item = DbId> + '_ {
        self.ids.iter().copied()
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        let mut held = self.locks.held();
        for id in &self.ids {
            held.remove(id);
        }
    }
}
