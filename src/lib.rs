//! # xidmap
//!
//! Maps external string identifiers (XIDs) to dense 64-bit UIDs for bulk
//! ingest pipelines.
//!
//! The core is a ternary search trie whose nodes live in an arena and refer to
//! each other by integer offset. The arena grows by reallocation (heap) or by
//! remapping a larger file (memory-mapped), and offsets stay valid across
//! growth, so no node is ever moved or re-linked.
//!
//! ## Layers
//!
//! 1. [`Arena`]: growable byte pool issuing stable [`Offset`]s.
//! 2. [`Node`]: 33-byte packed record (char, value, left/mid/right).
//! 3. [`Trie`]: `get`/`put`/`size`/`release` over nodes.
//! 4. [`ShardedTrie`]: independent tries per key hash for concurrent writers.
//! 5. [`XidMap`]: UID assignment on top, with an optional persistent
//!    [`UidStore`] (Redis or LMDB) for overflow and durability.
//!
//! ## Example
//!
//! ```rust
//! use xidmap::Trie;
//!
//! let mut trie = Trie::new().unwrap();
//! trie.put("apple", 1).unwrap();
//! trie.put("app", 2).unwrap();
//!
//! assert_eq!(trie.get("apple").unwrap(), 1);
//! assert_eq!(trie.get("app").unwrap(), 2);
//! assert_eq!(trie.get("appl").unwrap(), 0);
//!
//! trie.release().unwrap();
//! ```
//!
//! ```rust
//! use xidmap::{XidMap, XidMapConfig};
//!
//! let map = XidMap::new(&XidMapConfig::default()).unwrap();
//! let (uid, fresh) = map.assign_uid("_:alice").unwrap();
//! assert!(fresh);
//! assert_eq!(map.assign_uid("_:alice").unwrap(), (uid, false));
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod config;
pub mod error;
pub mod node;
pub mod sharded;
pub mod store;
pub mod trie;
pub mod xidmap;

pub use arena::{Arena, Offset};
pub use config::{ArenaConfig, LmdbConfig, RedisConfig, StoreConfig, XidMapConfig};
pub use error::{ArenaError, ConfigError, StoreError, TrieError, XidMapError};
pub use node::Node;
pub use sharded::ShardedTrie;
pub use store::{MemoryStore, UidStore};
pub use trie::Trie;
pub use xidmap::{XidMap, UID_LEASE_KEY};

#[cfg(test)]
mod proptests;
