//! Configuration for arenas, stores and the UID map.
//!
//! Everything deserializes from TOML; missing fields take their defaults.
//!
//! ```toml
//! num_shards = 16
//! start_uid = 1
//! uid_lease = 10000
//!
//! [arena]
//! initial_capacity = 1048576
//! max_capacity = 1073741824
//! directory = "/var/tmp/xidmap"
//!
//! [store]
//! backend = "lmdb"
//! path = "/var/lib/xidmap"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::arena::HEADER_SIZE;
use crate::error::{ArenaError, ConfigError};

/// Default initial arena capacity: 1 MiB.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1 << 20;

/// Default maximum arena capacity: 64 GiB.
pub const DEFAULT_MAX_CAPACITY: usize = 64 << 30;

/// Default number of trie shards in an [`XidMap`](crate::XidMap).
pub const DEFAULT_NUM_SHARDS: usize = 32;

/// Default number of UIDs reserved per lease write to the store.
pub const DEFAULT_UID_LEASE: u64 = 10_000;

/// Default LMDB map size: 1 GiB.
pub const DEFAULT_LMDB_MAP_SIZE: usize = 1 << 30;

/// Arena sizing and backing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Bytes reserved up front, header included.
    pub initial_capacity: usize,
    /// Hard ceiling; allocations past it fail.
    pub max_capacity: usize,
    /// Back the arena with a memory-mapped file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_capacity: DEFAULT_MAX_CAPACITY,
            directory: None,
        }
    }
}

impl ArenaConfig {
    /// Set the initial capacity.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the maximum capacity.
    pub fn with_max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Back the arena with a file in `directory`.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Check capacity bounds.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.initial_capacity < HEADER_SIZE {
            return Err(ArenaError::InvalidConfig(format!(
                "initial capacity {} is smaller than the {} byte header",
                self.initial_capacity, HEADER_SIZE
            )));
        }
        if self.initial_capacity > self.max_capacity {
            return Err(ArenaError::InvalidConfig(format!(
                "initial capacity {} exceeds maximum {}",
                self.initial_capacity, self.max_capacity
            )));
        }
        Ok(())
    }
}

/// Connection settings for [`RedisStore`](crate::store::RedisStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// `host:port` of the server.
    pub addr: String,
    /// Logical database index. `release()` flushes this whole database.
    pub db: i64,
    /// Optional AUTH password.
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:6379".to_string(),
            db: 0,
            password: None,
        }
    }
}

impl RedisConfig {
    /// Connection URL in the form the `redis` crate accepts.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}/{}", password, self.addr, self.db),
            None => format!("redis://{}/{}", self.addr, self.db),
        }
    }
}

/// Settings for [`LmdbStore`](crate::store::LmdbStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LmdbConfig {
    /// Directory holding the environment; created if missing.
    pub path: PathBuf,
    /// Maximum size of the memory map.
    #[serde(default = "default_lmdb_map_size")]
    pub map_size: usize,
}

fn default_lmdb_map_size() -> usize {
    DEFAULT_LMDB_MAP_SIZE
}

impl LmdbConfig {
    /// Store rooted at `path` with the default map size.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            map_size: DEFAULT_LMDB_MAP_SIZE,
        }
    }
}

/// Which persistent store backs an [`XidMap`](crate::XidMap).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Remote key-value server.
    Redis(RedisConfig),
    /// Embedded LMDB environment.
    Lmdb(LmdbConfig),
}

/// Top-level configuration for an [`XidMap`](crate::XidMap).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct XidMapConfig {
    /// Number of independent trie shards.
    pub num_shards: usize,
    /// First UID handed out. Must be non-zero.
    pub start_uid: u64,
    /// UIDs reserved in the store at a time. A restart skips whatever was
    /// left of the last block, so `1` keeps numbering dense at the cost of a
    /// store write per fresh UID.
    pub uid_lease: u64,
    /// Arena settings applied to every shard.
    pub arena: ArenaConfig,
    /// Optional persistent store.
    pub store: Option<StoreConfig>,
}

impl Default for XidMapConfig {
    fn default() -> Self {
        Self {
            num_shards: DEFAULT_NUM_SHARDS,
            start_uid: 1,
            uid_lease: DEFAULT_UID_LEASE,
            arena: ArenaConfig::default(),
            store: None,
        }
    }
}

impl XidMapConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_shards == 0 {
            return Err(ConfigError::Invalid("num_shards must be at least 1".into()));
        }
        if self.start_uid == 0 {
            return Err(ConfigError::Invalid("start_uid must be non-zero".into()));
        }
        if self.uid_lease == 0 {
            return Err(ConfigError::Invalid("uid_lease must be at least 1".into()));
        }
        self.arena.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = XidMapConfig::from_toml_str("").unwrap();
        assert_eq!(config, XidMapConfig::default());
        assert_eq!(config.num_shards, DEFAULT_NUM_SHARDS);
        assert_eq!(config.start_uid, 1);
        assert!(config.store.is_none());
    }

    #[test]
    fn test_full_document() {
        let config = XidMapConfig::from_toml_str(
            r#"
            num_shards = 4
            start_uid = 100
            uid_lease = 500

            [arena]
            initial_capacity = 4096
            max_capacity = 65536
            directory = "/tmp/arenas"

            [store]
            backend = "lmdb"
            path = "/tmp/uids"
            "#,
        )
        .unwrap();

        assert_eq!(config.num_shards, 4);
        assert_eq!(config.start_uid, 100);
        assert_eq!(config.uid_lease, 500);
        assert_eq!(config.arena.initial_capacity, 4096);
        assert_eq!(config.arena.max_capacity, 65536);
        assert_eq!(config.arena.directory, Some(PathBuf::from("/tmp/arenas")));
        assert_eq!(
            config.store,
            Some(StoreConfig::Lmdb(LmdbConfig {
                path: PathBuf::from("/tmp/uids"),
                map_size: DEFAULT_LMDB_MAP_SIZE,
            }))
        );
    }

    #[test]
    fn test_redis_store_section() {
        let config = XidMapConfig::from_toml_str(
            r#"
            [store]
            backend = "redis"
            addr = "10.0.0.5:6380"
            db = 3
            "#,
        )
        .unwrap();

        let Some(StoreConfig::Redis(redis)) = config.store else {
            panic!("expected redis store");
        };
        assert_eq!(redis.url(), "redis://10.0.0.5:6380/3");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            XidMapConfig::from_toml_str("num_shards = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            XidMapConfig::from_toml_str("start_uid = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            XidMapConfig::from_toml_str("uid_lease = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            XidMapConfig::from_toml_str("[arena]\ninitial_capacity = 8"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            XidMapConfig::from_toml_str("num_shards = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_arena_builder() {
        let config = ArenaConfig::default()
            .with_initial_capacity(64)
            .with_max_capacity(32);
        assert!(config.validate().is_err());

        let config = config.with_max_capacity(128).with_directory("/tmp");
        assert!(config.validate().is_ok());
        assert_eq!(config.directory, Some(PathBuf::from("/tmp")));
    }
}
