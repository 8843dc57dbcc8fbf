use ahash::AHashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Hands out one mutex per process instance.
///
/// Returns and jumps on the same instance are serialized from context build
/// through cleanup; operations on different instances never contend. An
/// instance's entry is dropped as soon as nobody holds or waits for it.
#[derive(Default)]
pub struct InstanceLocks {
    locks: Mutex<AHashMap<String, Arc<Mutex<()>>>>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, AHashMap<String, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_for(&self, instance_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.map().entry(instance_id.to_string()).or_default())
    }

    fn release(&self, instance_id: &str) {
        let mut locks = self.map();
        if locks
            .get(instance_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(instance_id);
        }
    }

    /// Runs `f` while holding the instance's lock, blocking until it is free.
    pub fn with_instance<T>(&self, instance_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(instance_id);
        let result = {
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            tracing::trace!(instance = %instance_id, "instance lock acquired");
            f()
        };
        drop(lock);
        self.release(instance_id);
        result
    }

    /// Number of instances currently locked or waited for.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
