//! Per-instance serialization of engine operations

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Hands out one async mutex per app instance. An entry lives only while
/// some operation holds or waits on it.
#[derive(Debug, Default)]
pub struct InstanceLocks {
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

/// Exclusive access to one instance, released on drop
#[derive(Debug)]
pub struct InstanceGuard<'a> {
    owner: &'a InstanceLocks,
    instance_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to an instance
    pub async fn lock(&self, instance_id: i64) -> InstanceGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(instance_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        InstanceGuard {
            owner: self,
            instance_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of instances currently locked or awaited
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, instance_id: i64) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Waiters hold their own clone, so a count of one means nobody else
        if locks
            .get(&instance_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&instance_id);
        }
    }
}

impl Drop for InstanceGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.owner.release(self.instance_id);
    }
}
