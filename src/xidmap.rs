//! XID → UID assignment.
//!
//! [`XidMap`] hands out dense UIDs for external string identifiers. Lookups
//! hit the in-memory sharded tries first, then the optional persistent store.
//! New assignments are written to the store first and cached in the trie once
//! the store has accepted them.
//!
//! With a store attached, UIDs are leased in blocks: before a UID past the
//! current lease is handed out, the end of a new block is written under
//! [`UID_LEASE_KEY`]. A map reopened over the same store resumes after the
//! last lease, so it never reissues a UID an earlier run may have assigned.

use parking_lot::Mutex;

use crate::config::XidMapConfig;
use crate::error::XidMapError;
use crate::sharded::ShardedTrie;
use crate::store::{open_store, UidStore};
use crate::trie::Trie;

/// Store key holding the highest UID leased so far. Not usable as an XID.
pub const UID_LEASE_KEY: &str = "\0xidmap.uid_lease";

/// Result type for [`XidMap`] operations.
pub type Result<T> = std::result::Result<T, XidMapError>;

struct UidCounter {
    /// Next fresh UID, unless `exhausted`.
    next: u64,
    /// Highest UID covered by the lease in the store.
    leased: u64,
    /// `u64::MAX` has been handed out or bumped past.
    exhausted: bool,
}

/// Assigns and resolves UIDs for XIDs.
///
/// Safe to share between threads. Check-and-assign for one XID runs under its
/// shard's lock, so an XID never receives two UIDs.
pub struct XidMap {
    tries: ShardedTrie,
    store: Option<Box<dyn UidStore>>,
    uids: Mutex<UidCounter>,
    uid_lease: u64,
}

impl XidMap {
    /// Create a map with in-memory tries only. `config.store` is ignored.
    pub fn new(config: &XidMapConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a map backed by `store`. `config.store` is ignored.
    ///
    /// Fresh UIDs continue after the lease recorded in `store`, if any.
    pub fn with_store(config: &XidMapConfig, store: Box<dyn UidStore>) -> Result<Self> {
        Self::build(config, Some(store))
    }

    /// Create a map and open the store named in `config`, if any.
    pub fn open(config: &XidMapConfig) -> Result<Self> {
        let store = config.store.as_ref().map(open_store).transpose()?;
        Self::build(config, store)
    }

    fn build(config: &XidMapConfig, store: Option<Box<dyn UidStore>>) -> Result<Self> {
        config.validate()?;
        let tries = ShardedTrie::new(config.num_shards, &config.arena)?;

        let leased = match &store {
            Some(store) => store.get(UID_LEASE_KEY)?,
            None => 0,
        };
        let counter = UidCounter {
            next: config.start_uid.max(leased.saturating_add(1)),
            leased,
            exhausted: leased == u64::MAX,
        };

        tracing::debug!(
            num_shards = config.num_shards,
            start_uid = config.start_uid,
            next_uid = counter.next,
            has_store = store.is_some(),
            "created xid map"
        );
        Ok(Self {
            tries,
            store,
            uids: Mutex::new(counter),
            uid_lease: config.uid_lease,
        })
    }

    /// Make sure the store's lease covers `uid`, extending it by a block if not.
    fn lease_through(&self, counter: &mut UidCounter, uid: u64) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if uid <= counter.leased {
            return Ok(());
        }
        let end = uid.saturating_add(self.uid_lease - 1);
        store.put(UID_LEASE_KEY, end)?;
        tracing::debug!(from = uid, to = end, "leased uid block");
        counter.leased = end;
        Ok(())
    }

    fn allocate_uid(&self) -> Result<u64> {
        let mut counter = self.uids.lock();
        if counter.exhausted {
            return Err(XidMapError::UidSpaceExhausted);
        }
        let uid = counter.next;
        self.lease_through(&mut counter, uid)?;
        match uid.checked_add(1) {
            Some(next) => counter.next = next,
            None => counter.exhausted = true,
        }
        Ok(uid)
    }

    fn check_xid(xid: &str) -> Result<()> {
        if xid == UID_LEASE_KEY {
            return Err(XidMapError::ReservedXid(xid.to_string()));
        }
        Ok(())
    }

    /// Return the UID for `xid`, assigning a fresh one if it has none.
    ///
    /// The flag is `true` when the UID was newly assigned. The empty XID is
    /// never assigned and yields `(0, false)`.
    pub fn assign_uid(&self, xid: &str) -> Result<(u64, bool)> {
        if xid.is_empty() {
            return Ok((0, false));
        }
        Self::check_xid(xid)?;

        self.tries.with_shard(xid, |trie: &mut Trie| -> Result<(u64, bool)> {
            let uid = trie.get(xid)?;
            if uid != 0 {
                return Ok((uid, false));
            }

            if let Some(store) = &self.store {
                let uid = store.get(xid)?;
                if uid != 0 {
                    tracing::trace!(xid, uid, "resolved xid from store");
                    self.bump_to(uid)?;
                    trie.put(xid, uid)?;
                    return Ok((uid, false));
                }
            }

            let uid = self.allocate_uid()?;
            if let Some(store) = &self.store {
                store.put(xid, uid)?;
            }
            trie.put(xid, uid)?;
            Ok((uid, true))
        })
    }

    /// Look up `xid` without assigning; `0` if unknown.
    pub fn get_uid(&self, xid: &str) -> Result<u64> {
        if xid.is_empty() {
            return Ok(0);
        }
        Self::check_xid(xid)?;

        self.tries.with_shard(xid, |trie: &mut Trie| -> Result<u64> {
            let uid = trie.get(xid)?;
            if uid != 0 {
                return Ok(uid);
            }
            match &self.store {
                Some(store) => {
                    let uid = store.get(xid)?;
                    if uid != 0 {
                        self.bump_to(uid)?;
                        trie.put(xid, uid)?;
                    }
                    Ok(uid)
                }
                None => Ok(0),
            }
        })
    }

    /// Force `xid` to map to `uid`, and keep fresh UIDs above it.
    ///
    /// A `uid` of `0` or an empty `xid` is ignored.
    pub fn set_uid(&self, xid: &str, uid: u64) -> Result<()> {
        if xid.is_empty() || uid == 0 {
            return Ok(());
        }
        Self::check_xid(xid)?;

        self.tries.with_shard(xid, |trie: &mut Trie| -> Result<()> {
            self.bump_to(uid)?;
            if let Some(store) = &self.store {
                store.put(xid, uid)?;
            }
            trie.put(xid, uid)?;
            Ok(())
        })
    }

    /// Make sure the next fresh UID is greater than `uid`.
    ///
    /// With a store attached the lease is extended to cover `uid` first, so
    /// the guarantee survives a restart.
    pub fn bump_to(&self, uid: u64) -> Result<()> {
        let mut counter = self.uids.lock();
        self.lease_through(&mut counter, uid)?;
        match uid.checked_add(1) {
            Some(next) => counter.next = counter.next.max(next),
            None => counter.exhausted = true,
        }
        Ok(())
    }

    /// Highest UID handed out or bumped past so far.
    pub fn max_assigned(&self) -> u64 {
        let counter = self.uids.lock();
        if counter.exhausted {
            u64::MAX
        } else {
            counter.next - 1
        }
    }

    /// Bytes used by all trie arenas.
    pub fn size(&self) -> usize {
        self.tries.size()
    }

    /// The sharded tries behind this map.
    pub fn tries(&self) -> &ShardedTrie {
        &self.tries
    }

    /// Free the in-memory tries. The persistent store keeps its contents.
    pub fn release(&self) -> Result<()> {
        Ok(self.tries.release()?)
    }
}

impl std::fmt::Debug for XidMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counter = self.uids.lock();
        f.debug_struct("XidMap")
            .field("tries", &self.tries)
            .field("has_store", &self.store.is_some())
            .field("next_uid", &counter.next)
            .field("leased", &counter.leased)
            .finish()
    }
}
