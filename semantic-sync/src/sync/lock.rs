//! Run locks: at most one sync in flight per (source, target) pair

use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{SyncError, SyncResult};

type Pair = (String, String);

#[derive(Debug, Clone, Default)]
pub struct RunLocks {
    held: Arc<Mutex<HashSet<Pair>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the set cannot leave it half-updated
    fn held(&self) -> MutexGuard<'_, HashSet<Pair>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the lock for `source -> target`, failing if a run already holds it
    pub fn try_acquire(&self, source_tag: &str, target_tag: &str) -> SyncResult<RunGuard> {
        let pair = (source_tag.to_string(), target_tag.to_string());
        if !self.held().insert(pair.clone()) {
            return Err(SyncError::validation(format!(
                "a sync from '{}' to '{}' is already running",
                source_tag, target_tag
            )));
        }

        debug!("Acquired run lock {} -> {}", source_tag, target_tag);
        Ok(RunGuard {
            locks: self.clone(),
            pair,
        })
    }

    pub fn is_held(&self, source_tag: &str, target_tag: &str) -> bool {
        self.held()
            .contains(&(source_tag.to_string(), target_tag.to_string()))
    }
}

/// Releases its pair when dropped, whatever path the run left by
#[derive(Debug)]
pub struct RunGuard {
    locks: RunLocks,
    pair: Pair,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.locks.held().remove(&self.pair);
        debug!("Released run lock {} -> {}", self.pair.0, self.pair.1);
    }
}
