//! Error types.
//!
//! Each layer has its own enum; higher layers wrap lower ones with `#[from]`
//! so `?` carries the original cause upward.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`Arena`](crate::arena::Arena).
#[derive(Error, Debug)]
pub enum ArenaError {
    /// Growing the arena would exceed its configured maximum capacity.
    #[error("arena capacity exceeded: requested {requested} bytes with {used} in use, maximum is {max}")]
    CapacityExceeded {
        /// Size of the allocation that failed.
        requested: usize,
        /// Bytes already allocated.
        used: usize,
        /// Configured maximum capacity.
        max: usize,
    },

    /// The arena configuration is unusable.
    #[error("invalid arena configuration: {0}")]
    InvalidConfig(String),

    /// Zero-byte allocations would alias the next slot.
    #[error("zero-sized allocation")]
    ZeroSizedAllocation,

    /// Creating, growing or removing the backing file failed.
    #[error("arena file {path}: {source}")]
    Io {
        /// Backing file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Errors raised by [`Trie`](crate::trie::Trie).
#[derive(Error, Debug)]
pub enum TrieError {
    /// The trie has been released and its arena freed.
    #[error("trie already released")]
    Released,

    /// A trie must be built on a fresh arena so the root is its first slot.
    #[error("arena already has {used} bytes allocated")]
    ArenaNotEmpty {
        /// Bytes in use in the rejected arena.
        used: usize,
    },

    /// A sharded trie was asked for zero shards.
    #[error("a sharded trie needs at least one shard")]
    NoShards,

    /// Arena failure, usually capacity exhaustion.
    #[error(transparent)]
    Arena(#[from] ArenaError),
}

/// Errors raised by [`UidStore`](crate::store::UidStore) backends.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Redis command or connection failure.
    #[cfg(feature = "redis")]
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    /// LMDB environment or transaction failure.
    #[cfg(feature = "lmdb")]
    #[error("lmdb: {0}")]
    Lmdb(#[from] heed3::Error),

    /// The configured backend was compiled out.
    #[error("store backend `{0}` is not enabled in this build")]
    BackendDisabled(&'static str),

    /// Preparing the store directory failed.
    #[error("store directory {path}: {source}")]
    Io {
        /// Store directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Errors raised by [`XidMap`](crate::xidmap::XidMap).
#[derive(Error, Debug)]
pub enum XidMapError {
    /// In-memory trie failure.
    #[error(transparent)]
    Trie(#[from] TrieError),

    /// Persistent store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The map configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The XID collides with the key the map reserves in its store.
    #[error("xid {0:?} is reserved")]
    ReservedXid(String),

    /// Every UID up to and including `u64::MAX` has been handed out.
    #[error("uid space exhausted")]
    UidSpaceExhausted,
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("config file {path}: {source}")]
    Io {
        /// Configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML for the expected shape.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but are inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ArenaError> for ConfigError {
    fn from(e: ArenaError) -> Self {
        ConfigError::Invalid(e.to_string())
    }
}
