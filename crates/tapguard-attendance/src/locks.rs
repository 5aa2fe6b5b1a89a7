//! Keyed admission locks
//!
//! Every read-check-append-advance sequence runs while holding the lock for its tag. With
//! [`LockScope::PerTag`] unrelated tags never contend; [`LockScope::Global`] funnels every
//! admission through one lock. Acquisition is bounded: a caller that cannot get the lock
//! within the configured wait receives [`LockTimeout`] instead of queueing forever.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tapguard_core::{LockScope, TagIdentity};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Idle lock slots are swept once the map grows past this many entries
const PRUNE_THRESHOLD: usize = 1024;

/// The admission lock was not acquired within the bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("admission lock not acquired within {waited:?}")]
pub struct LockTimeout {
    /// How long the caller waited
    pub waited: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LockKey {
    Global,
    Tag(TagIdentity),
}

/// Held admission lock; released on drop
#[derive(Debug)]
pub struct TagLockGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Lock provider keyed by tag identity
#[derive(Debug)]
pub struct TagLocks {
    scope: LockScope,
    wait: Duration,
    slots: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl TagLocks {
    /// Create a provider with the given scope and bounded wait
    pub fn new(scope: LockScope, wait: Duration) -> Self {
        Self {
            scope,
            wait,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Lock granularity
    pub fn scope(&self) -> LockScope {
        self.scope
    }

    /// Bounded wait applied to every acquisition
    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Acquire the lock covering `uid`
    pub async fn acquire(&self, uid: &TagIdentity) -> Result<TagLockGuard, LockTimeout> {
        let slot = self.slot(uid);
        match tokio::time::timeout(self.wait, slot.lock_owned()).await {
            Ok(guard) => Ok(TagLockGuard { _guard: guard }),
            Err(_) => Err(LockTimeout { waited: self.wait }),
        }
    }

    /// Number of lock slots currently allocated
    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    fn slot(&self, uid: &TagIdentity) -> Arc<AsyncMutex<()>> {
        let key = match self.scope {
            LockScope::Global => LockKey::Global,
            LockScope::PerTag => LockKey::Tag(uid.clone()),
        };

        let mut slots = self.slots.lock();
        if slots.len() >= PRUNE_THRESHOLD {
            // Only the map holds an idle slot; anyone holding or awaiting it has a clone
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
