//! Fixed-size trie node records stored in an [`Arena`].
//!
//! Layout (packed, little endian):
//!
//! ```text
//! 0        1            9           17          25          33
//! [ char ] [ value u64 ] [ left u64 ] [ mid u64 ] [ right u64 ]
//! ```
//!
//! `value == 0` means no key terminates at this node. A child offset of `0`
//! is [`Offset::NULL`] and means "no child".
//!
//! The byte layout is pinned so the same record reads identically from a heap
//! arena and a memory-mapped file.

use crate::arena::{Arena, Offset};

/// Bytes per node record.
pub const NODE_SIZE: usize = 33;

const CHAR_AT: usize = 0;
const VALUE_AT: usize = 1;
const LEFT_AT: usize = 9;
const MID_AT: usize = 17;
const RIGHT_AT: usize = 25;

/// One of the three child links of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Child {
    /// Sibling with a smaller character.
    Left,
    /// Subtree for the next key position.
    Mid,
    /// Sibling with a larger character.
    Right,
}

impl Child {
    #[inline]
    const fn at(self) -> usize {
        match self {
            Child::Left => LEFT_AT,
            Child::Mid => MID_AT,
            Child::Right => RIGHT_AT,
        }
    }
}

/// A decoded node record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Node {
    /// Character compared at this node.
    pub ch: u8,
    /// Terminal value, `0` if none.
    pub value: u64,
    /// Smaller sibling.
    pub left: Offset,
    /// Next key position.
    pub mid: Offset,
    /// Larger sibling.
    pub right: Offset,
}

impl Node {
    /// Encode into exactly [`NODE_SIZE`] bytes.
    pub fn encode(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), NODE_SIZE);
        buf[CHAR_AT] = self.ch;
        buf[VALUE_AT..LEFT_AT].copy_from_slice(&self.value.to_le_bytes());
        buf[LEFT_AT..MID_AT].copy_from_slice(&self.left.as_u64().to_le_bytes());
        buf[MID_AT..RIGHT_AT].copy_from_slice(&self.mid.as_u64().to_le_bytes());
        buf[RIGHT_AT..NODE_SIZE].copy_from_slice(&self.right.as_u64().to_le_bytes());
    }

    /// Decode from exactly [`NODE_SIZE`] bytes.
    pub fn decode(buf: &[u8]) -> Self {
        debug_assert_eq!(buf.len(), NODE_SIZE);
        Self {
            ch: buf[CHAR_AT],
            value: read_u64_le(buf, VALUE_AT),
            left: Offset::new(read_u64_le(buf, LEFT_AT)),
            mid: Offset::new(read_u64_le(buf, MID_AT)),
            right: Offset::new(read_u64_le(buf, RIGHT_AT)),
        }
    }

    /// Read the whole record at `off`.
    pub fn load(arena: &Arena, off: Offset) -> Self {
        Self::decode(arena.view(off, NODE_SIZE))
    }

    /// Overwrite the whole record at `off`.
    pub fn store(&self, arena: &mut Arena, off: Offset) {
        self.encode(arena.view_mut(off, NODE_SIZE));
    }
}

#[inline]
fn read_u64_le(buf: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(b)
}

// Field accessors. Each resolves a fresh view, so none of them can observe a
// region that has since been grown.

#[inline]
pub(crate) fn char_at(arena: &Arena, off: Offset) -> u8 {
    arena.view(off, NODE_SIZE)[CHAR_AT]
}

#[inline]
pub(crate) fn set_char(arena: &mut Arena, off: Offset, ch: u8) {
    arena.view_mut(off, NODE_SIZE)[CHAR_AT] = ch;
}

#[inline]
pub(crate) fn value_at(arena: &Arena, off: Offset) -> u64 {
    read_u64_le(arena.view(off, NODE_SIZE), VALUE_AT)
}

#[inline]
pub(crate) fn set_value(arena: &mut Arena, off: Offset, value: u64) {
    arena.view_mut(off, NODE_SIZE)[VALUE_AT..VALUE_AT + 8].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn child_at(arena: &Arena, off: Offset, child: Child) -> Offset {
    Offset::new(read_u64_le(arena.view(off, NODE_SIZE), child.at()))
}

#[inline]
pub(crate) fn set_child(arena: &mut Arena, off: Offset, child: Child, target: Offset) {
    let at = child.at();
    arena.view_mut(off, NODE_SIZE)[at..at + 8].copy_from_slice(&target.as_u64().to_le_bytes());
}
