//! In-process store backed by a `BTreeMap`.
//!
//! Not persistent. Serves as the baseline the other backends are compared
//! against and as the store used by tests.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{Result, UidStore};

/// A [`UidStore`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, u64>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

impl UidStore for MemoryStore {
    fn get(&self, key: &str) -> Result<u64> {
        Ok(self.map.lock().get(key).copied().unwrap_or(0))
    }

    fn put(&self, key: &str, value: u64) -> Result<()> {
        self.map.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn release(&self) -> Result<()> {
        self.map.lock().clear();
        Ok(())
    }
}
