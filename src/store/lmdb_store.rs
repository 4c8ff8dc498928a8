//! Store on an embedded LMDB environment.
//!
//! Keys are the raw XID strings; values are fixed 8-byte big-endian integers.
//! LMDB serves reads straight from its memory map, so the OS page cache plays
//! the role of a block cache. LMDB rejects zero-length keys, so the empty XID
//! reads as `0` and is never written.

use heed3::byteorder::BE;
use heed3::types::{Str, U64};
use heed3::{Database, Env, EnvOpenOptions};

use super::{Result, UidStore};
use crate::config::LmdbConfig;
use crate::error::StoreError;

/// A [`UidStore`] in an LMDB environment.
pub struct LmdbStore {
    env: Env,
    db: Database<Str, U64<BE>>,
}

impl LmdbStore {
    /// Open or create the environment at `config.path`.
    pub fn open(config: &LmdbConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.path).map_err(|source| StoreError::Io {
            path: config.path.clone(),
            source,
        })?;

        // SAFETY: the environment is opened once per store and the directory
        // is not opened twice in this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size)
                .open(&config.path)?
        };

        let mut wtxn = env.write_txn()?;
        let db: Database<Str, U64<BE>> = env.create_database(&mut wtxn, None)?;
        wtxn.commit()?;

        tracing::info!(path = %config.path.display(), map_size = config.map_size, "opened lmdb uid store");
        Ok(Self { env, db })
    }
}

impl UidStore for LmdbStore {
    fn get(&self, key: &str) -> Result<u64> {
        if key.is_empty() {
            return Ok(0);
        }
        let rtxn = self.env.read_txn()?;
        Ok(self.db.get(&rtxn, key)?.unwrap_or(0))
    }

    fn put(&self, key: &str, value: u64) -> Result<()> {
        if key.is_empty() {
            return Ok(());
        }
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, key, &value)?;
        wtxn.commit()?;
        Ok(())
    }

    fn release(&self) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.db.clear(&mut wtxn)?;
        wtxn.commit()?;
        tracing::info!(path = %self.env.path().display(), "cleared lmdb uid store");
        Ok(())
    }
}

impl std::fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbStore")
            .field("path", &self.env.path())
            .finish()
    }
}
