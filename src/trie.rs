//! Ternary search trie over an offset-addressed [`Arena`].
//!
//! Each node compares one key byte. `left`/`right` lead to siblings with a
//! smaller/larger byte at the same key position; `mid` consumes the byte and
//! descends to the next position. Nodes are allocated lazily by `put` and
//! never freed individually.
//!
//! Limitations, both accepted:
//! - A stored value of `0` is indistinguishable from an absent key. UID `0`
//!   is never assigned, so callers never store it.
//! - No rebalancing. Inserting keys in sorted order turns sibling chains into
//!   linked lists, so lookups degrade toward O(alphabet * key length).

use std::cmp::Ordering;

use crate::arena::{Arena, Offset};
use crate::config::ArenaConfig;
use crate::error::TrieError;
use crate::node::{self, Child, NODE_SIZE};

/// Result type for trie operations.
pub type Result<T> = std::result::Result<T, TrieError>;

pub(crate) enum State {
    Open(Arena),
    Released,
}

/// Maps byte-string keys to non-zero `u64` values.
///
/// Not thread-safe for writers: wrap it in a lock or shard keys across
/// several tries (see [`ShardedTrie`](crate::ShardedTrie)).
pub struct Trie {
    pub(crate) state: State,
    pub(crate) root: Offset,
}

impl Trie {
    /// Create a trie on a default heap arena.
    pub fn new() -> Result<Self> {
        Self::with_config(&ArenaConfig::default())
    }

    /// Create a trie on a fresh arena built from `config`.
    pub fn with_config(config: &ArenaConfig) -> Result<Self> {
        Self::from_arena(Arena::new(config)?)
    }

    /// Take ownership of a fresh arena.
    ///
    /// The root node becomes the arena's first slot. `release` must be called
    /// to delete the backing file of a memory-mapped arena.
    pub fn from_arena(mut arena: Arena) -> Result<Self> {
        let used = arena.used_bytes();
        if used != crate::arena::HEADER_SIZE {
            return Err(TrieError::ArenaNotEmpty { used });
        }
        let root = arena.allocate(NODE_SIZE)?;
        Ok(Self {
            state: State::Open(arena),
            root,
        })
    }

    #[inline]
    fn arena(&self) -> Result<&Arena> {
        match &self.state {
            State::Open(arena) => Ok(arena),
            State::Released => Err(TrieError::Released),
        }
    }

    #[inline]
    fn arena_mut(&mut self) -> Result<&mut Arena> {
        match &mut self.state {
            State::Open(arena) => Ok(arena),
            State::Released => Err(TrieError::Released),
        }
    }

    /// Look up `key`, returning `0` if it was never stored.
    ///
    /// The empty key always yields `Ok(0)`, even after release.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<u64> {
        let mut key = key.as_ref();
        if key.is_empty() {
            return Ok(0);
        }
        let arena = self.arena()?;

        let mut off = self.root;
        while !off.is_null() {
            let ch = node::char_at(arena, off);
            off = match key[0].cmp(&ch) {
                Ordering::Less => node::child_at(arena, off, Child::Left),
                Ordering::Greater => node::child_at(arena, off, Child::Right),
                Ordering::Equal if key.len() > 1 => {
                    key = &key[1..];
                    node::child_at(arena, off, Child::Mid)
                }
                Ordering::Equal => return Ok(node::value_at(arena, off)),
            };
        }
        Ok(0)
    }

    /// Store `value` under `key`, overwriting any previous value.
    ///
    /// Re-inserting an existing key allocates nothing. An empty key is a
    /// no-op. Fails if the arena would outgrow its maximum capacity; nodes
    /// linked before the failure stay in place and hold no value.
    pub fn put(&mut self, key: impl AsRef<[u8]>, value: u64) -> Result<()> {
        let mut key = key.as_ref();
        let root = self.root;
        let arena = self.arena_mut()?;
        if key.is_empty() {
            return Ok(());
        }

        // `link` is the parent slot that must point at `off` once it exists.
        let mut link: Option<(Offset, Child)> = None;
        let mut off = root;
        loop {
            if off.is_null() {
                off = arena.allocate(NODE_SIZE)?;
                node::set_char(arena, off, key[0]);
                if let Some((parent, child)) = link {
                    node::set_child(arena, parent, child, off);
                }
            }

            let ch = node::char_at(arena, off);
            let next = match key[0].cmp(&ch) {
                Ordering::Less => Child::Left,
                Ordering::Greater => Child::Right,
                Ordering::Equal if key.len() > 1 => {
                    key = &key[1..];
                    Child::Mid
                }
                Ordering::Equal => {
                    node::set_value(arena, off, value);
                    return Ok(());
                }
            };
            link = Some((off, next));
            off = node::child_at(arena, off, next);
        }
    }

    /// Bytes allocated in the arena; `0` once released.
    ///
    /// Grows by [`NODE_SIZE`] per node, so it tracks node count.
    pub fn size(&self) -> usize {
        match &self.state {
            State::Open(arena) => arena.used_bytes(),
            State::Released => 0,
        }
    }

    /// Whether [`release`](Self::release) has been called.
    pub fn is_released(&self) -> bool {
        matches!(self.state, State::Released)
    }

    /// Flush a memory-mapped arena to disk.
    pub fn flush(&self) -> Result<()> {
        Ok(self.arena()?.flush()?)
    }

    /// Free the arena. Later `get`/`put` calls fail with
    /// [`TrieError::Released`]. Releasing twice is a no-op.
    pub fn release(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Released) {
            State::Open(arena) => {
                self.root = Offset::NULL;
                Ok(arena.release()?)
            }
            State::Released => Ok(()),
        }
    }
}

impl std::fmt::Debug for Trie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            State::Open(arena) => f
                .debug_struct("Trie")
                .field("root", &self.root)
                .field("arena", arena)
                .finish(),
            State::Released => f.write_str("Trie(released)"),
        }
    }
}
