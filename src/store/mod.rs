//! Persistent XID → UID stores.
//!
//! A store is the durability or overflow layer behind the in-memory tries.
//! Every backend follows the same contract:
//!
//! - `get` returns `Ok(0)` for a missing key; `Err` only on a real failure.
//! - `put` stores the association.
//! - `release` wipes the backend's entire namespace, not just this map's
//!   keys. With a shared Redis database that includes other tenants' data.
//!
//! Each backend owns a single connection or environment. No ordering beyond
//! what the backend itself provides is added on top.

#[cfg(feature = "lmdb")]
mod lmdb_store;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;

#[cfg(feature = "lmdb")]
pub use lmdb_store::LmdbStore;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::StoreError;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A persistent map from XID to UID.
pub trait UidStore: Send + Sync {
    /// UID stored for `key`, or `0` if none.
    fn get(&self, key: &str) -> Result<u64>;

    /// Associate `key` with `value`.
    fn put(&self, key: &str, value: u64) -> Result<()>;

    /// Remove every entry in this store's namespace.
    fn release(&self) -> Result<()>;
}

impl<S: UidStore + ?Sized> UidStore for Box<S> {
    fn get(&self, key: &str) -> Result<u64> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: u64) -> Result<()> {
        (**self).put(key, value)
    }

    fn release(&self) -> Result<()> {
        (**self).release()
    }
}

impl<S: UidStore + ?Sized> UidStore for Arc<S> {
    fn get(&self, key: &str) -> Result<u64> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: u64) -> Result<()> {
        (**self).put(key, value)
    }

    fn release(&self) -> Result<()> {
        (**self).release()
    }
}

/// Open the backend described by `config`.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn UidStore>> {
    match config {
        #[cfg(feature = "redis")]
        StoreConfig::Redis(c) => Ok(Box::new(RedisStore::open(c)?)),
        #[cfg(not(feature = "redis"))]
        StoreConfig::Redis(_) => Err(StoreError::BackendDisabled("redis")),
        #[cfg(feature = "lmdb")]
        StoreConfig::Lmdb(c) => Ok(Box::new(LmdbStore::open(c)?)),
        #[cfg(not(feature = "lmdb"))]
        StoreConfig::Lmdb(_) => Err(StoreError::BackendDisabled("lmdb")),
    }
}

/// Unwrap a store result or abort the process.
///
/// For offline batch jobs where a failed store read or write means the run
/// is worthless. Long-running services should handle the error instead.
pub fn or_abort<T>(result: Result<T>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "uid store failure, aborting");
            std::process::abort()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Contract every backend must satisfy.
    pub(crate) fn round_trip(store: &dyn UidStore) {
        store.put("x", 42).unwrap();
        assert_eq!(store.get("x").unwrap(), 42);
        assert_eq!(store.get("y").unwrap(), 0);

        store.put("x", 43).unwrap();
        assert_eq!(store.get("x").unwrap(), 43);

        store.put("big", u64::MAX).unwrap();
        assert_eq!(store.get("big").unwrap(), u64::MAX);

        store.release().unwrap();
        assert_eq!(store.get("x").unwrap(), 0);
        assert_eq!(store.get("big").unwrap(), 0);
    }

    #[test]
    fn test_or_abort_passes_ok_through() {
        assert_eq!(or_abort(Ok(5)), 5);
    }

    #[test]
    fn test_boxed_store_delegates() {
        let store: Box<dyn UidStore> = Box::new(MemoryStore::new());
        round_trip(&store);
    }

    #[cfg(feature = "lmdb")]
    #[test]
    fn test_open_store_lmdb() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::Lmdb(crate::config::LmdbConfig::new(dir.path().join("uids")));
        let store = open_store(&config).unwrap();
        round_trip(store.as_ref());
    }
}
