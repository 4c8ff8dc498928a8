//! Hash-partitioned tries for concurrent writers.
//!
//! A single [`Trie`] has one writer at a time. Rather than locking one big
//! trie, keys are spread over independent shards, each with its own arena and
//! its own lock, so writers only contend when they hash to the same shard.

use parking_lot::{Mutex, MutexGuard};

use crate::config::ArenaConfig;
use crate::error::TrieError;
use crate::trie::{Result, Trie};

/// FNV-1a over the key bytes.
#[inline]
pub(crate) fn fnv1a(key: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in key {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// A set of [`Trie`]s addressed by key hash.
pub struct ShardedTrie {
    shards: Box<[Mutex<Trie>]>,
}

impl ShardedTrie {
    /// Create `num_shards` tries, each on its own arena built from `config`.
    ///
    /// Fails with [`TrieError::NoShards`] if `num_shards` is zero.
    pub fn new(num_shards: usize, config: &ArenaConfig) -> Result<Self> {
        if num_shards == 0 {
            return Err(TrieError::NoShards);
        }
        let shards = (0..num_shards)
            .map(|_| Trie::with_config(config).map(Mutex::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            shards: shards.into_boxed_slice(),
        })
    }

    /// Number of shards.
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard owning `key`.
    #[inline]
    pub fn shard_index(&self, key: &[u8]) -> usize {
        (fnv1a(key) % self.shards.len() as u64) as usize
    }

    /// Lock the shard owning `key`.
    pub fn lock_shard(&self, key: &[u8]) -> MutexGuard<'_, Trie> {
        self.shards[self.shard_index(key)].lock()
    }

    /// Run `f` with exclusive access to the shard owning `key`.
    ///
    /// Use for read-modify-write sequences that must not interleave with
    /// other writers of the same key.
    pub fn with_shard<R>(&self, key: impl AsRef<[u8]>, f: impl FnOnce(&mut Trie) -> R) -> R {
        let mut shard = self.lock_shard(key.as_ref());
        f(&mut shard)
    }

    /// Look up `key`; `0` if absent.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<u64> {
        let key = key.as_ref();
        self.lock_shard(key).get(key)
    }

    /// Store `value` under `key`.
    pub fn put(&self, key: impl AsRef<[u8]>, value: u64) -> Result<()> {
        let key = key.as_ref();
        self.lock_shard(key).put(key, value)
    }

    /// Sum of every shard's [`Trie::size`].
    pub fn size(&self) -> usize {
        self.shards.iter().map(|s| s.lock().size()).sum()
    }

    /// Release every shard. Continues past failures and reports the first.
    pub fn release(&self) -> Result<()> {
        let mut first_err: Option<TrieError> = None;
        for shard in self.shards.iter() {
            if let Err(e) = shard.lock().release() {
                tracing::warn!(error = %e, "failed to release trie shard");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for ShardedTrie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedTrie")
            .field("num_shards", &self.shards.len())
            .finish()
    }
}
