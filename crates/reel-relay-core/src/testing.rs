//! Testing helpers.
//!
//! Provides an in-process [`KvBackend`] with switchable failures, used by unit
//! and integration tests to simulate outages and process restarts.

use crate::storage::{BackendKind, KvBackend, StorageError, VIDEO_STATE_KEY};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// In-memory key-value backend.
///
/// Values survive as long as the backend does, so sharing one instance
/// between two `VideoSlot`s models a restart against the same durable store.
#[derive(Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBackend {
    /// A backend pre-seeded with `value` under the video state key.
    #[must_use]
    pub fn with_value(value: &str) -> Self {
        let backend = Self::default();
        backend
            .lock()
            .insert(VIDEO_STATE_KEY.to_string(), value.to_string());
        backend
    }

    /// Make every subsequent `get` fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw value stored under the video state key.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.lock().get(VIDEO_STATE_KEY).cloned()
    }

    /// Number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unexpected("memory backend read failure".into()));
        }
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unexpected("memory backend write failure".into()));
        }
        self.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
