//! Growable byte arena addressed by stable offsets.
//!
//! The arena is a single contiguous region that only ever grows. Slots are
//! handed out as [`Offset`]s rather than pointers, so growing the region
//! (reallocating a `Vec` or remapping a larger file) never invalidates them.
//! A view into the region is resolved from an offset on every access, and the
//! borrow checker keeps that view from outliving the next `allocate` call.
//!
//! Offset `0` is permanently taken by a small header page, which makes
//! [`Offset::NULL`] impossible to issue for a real slot.
//!
//! Slots are never freed individually; the whole arena is released at once.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::{MmapMut, MmapOptions};

use crate::config::ArenaConfig;
use crate::error::ArenaError;

/// Bytes reserved at the start of every arena.
pub const HEADER_SIZE: usize = 16;

/// Magic bytes at offset 0.
pub const ARENA_MAGIC: [u8; 8] = *b"XIDTRIE\0";

/// Layout version written after the magic.
pub const FORMAT_VERSION: u32 = 1;

/// Distinguishes arena files created by the same process.
static FILE_SEQ: AtomicU64 = AtomicU64::new(0);

/// A 64-bit offset into an arena, used in place of a pointer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Offset(u64);

impl Offset {
    /// The "no slot" sentinel. Never issued, since the header occupies it.
    pub const NULL: Offset = Offset(0);

    /// Wrap a raw offset.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Check if this is the null sentinel.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Raw value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Raw value as an index into the region.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A memory-mapped backing file.
struct MappedRegion {
    mmap: MmapMut,
    file: File,
    path: PathBuf,
}

impl MappedRegion {
    fn create(directory: &Path, capacity: usize) -> Result<Self, ArenaError> {
        std::fs::create_dir_all(directory).map_err(|source| ArenaError::Io {
            path: directory.to_path_buf(),
            source,
        })?;

        let name = format!(
            "xidmap-{}-{}.arena",
            std::process::id(),
            FILE_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let path = directory.join(name);
        let io_err = |source: std::io::Error| ArenaError::Io {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(io_err)?;
        file.set_len(capacity as u64).map_err(io_err)?;

        // SAFETY: the file was created exclusively above and is owned by this
        // region; nothing else maps or truncates it.
        let mmap = unsafe { MmapOptions::new().len(capacity).map_mut(&file) }.map_err(io_err)?;

        Ok(Self { mmap, file, path })
    }

    fn grow(&mut self, capacity: usize) -> Result<(), ArenaError> {
        self.mmap.flush().map_err(|source| ArenaError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.file
            .set_len(capacity as u64)
            .map_err(|source| ArenaError::Io {
                path: self.path.clone(),
                source,
            })?;
        // SAFETY: same exclusively owned file, now extended to `capacity`.
        self.mmap = unsafe { MmapOptions::new().len(capacity).map_mut(&self.file) }.map_err(
            |source| ArenaError::Io {
                path: self.path.clone(),
                source,
            },
        )?;
        Ok(())
    }
}

enum Region {
    Heap(Vec<u8>),
    Mapped(MappedRegion),
}

impl Region {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Region::Heap(data) => data.as_slice(),
            Region::Mapped(m) => &m.mmap[..],
        }
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Region::Heap(data) => data.as_mut_slice(),
            Region::Mapped(m) => &mut m.mmap[..],
        }
    }

    fn grow(&mut self, capacity: usize) -> Result<(), ArenaError> {
        match self {
            Region::Heap(data) => {
                data.resize(capacity, 0);
                Ok(())
            }
            Region::Mapped(m) => m.grow(capacity),
        }
    }
}

/// A growable arena handing out zeroed slots by offset.
///
/// Not safe for concurrent mutation; shard across arenas instead.
pub struct Arena {
    region: Region,
    /// High-water mark: the next slot starts here.
    cursor: usize,
    max_capacity: usize,
}

impl Arena {
    /// Create an arena according to `config`.
    ///
    /// With `config.directory` set the region is a memory-mapped file created
    /// in that directory; otherwise it lives on the heap.
    pub fn new(config: &ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;

        let region = match &config.directory {
            Some(dir) => Region::Mapped(MappedRegion::create(dir, config.initial_capacity)?),
            None => Region::Heap(vec![0u8; config.initial_capacity]),
        };

        let mut arena = Self {
            region,
            cursor: HEADER_SIZE,
            max_capacity: config.max_capacity,
        };
        arena.write_header();

        tracing::debug!(
            capacity = config.initial_capacity,
            max_capacity = config.max_capacity,
            path = ?arena.path(),
            "created arena"
        );
        Ok(arena)
    }

    /// Create a heap arena with the given initial and maximum capacity.
    pub fn with_capacity(initial_capacity: usize, max_capacity: usize) -> Result<Self, ArenaError> {
        Self::new(
            &ArenaConfig::default()
                .with_initial_capacity(initial_capacity)
                .with_max_capacity(max_capacity),
        )
    }

    fn write_header(&mut self) {
        let header = &mut self.region.bytes_mut()[..HEADER_SIZE];
        header[..8].copy_from_slice(&ARENA_MAGIC);
        header[8..12].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        header[12..16].fill(0);
    }

    /// Reserve a zeroed slot of `size` bytes and return its offset.
    ///
    /// Grows the region first when the slot does not fit. Fails with
    /// [`ArenaError::CapacityExceeded`] if that would pass the maximum.
    pub fn allocate(&mut self, size: usize) -> Result<Offset, ArenaError> {
        if size == 0 {
            return Err(ArenaError::ZeroSizedAllocation);
        }

        let end = self
            .cursor
            .checked_add(size)
            .filter(|&end| end <= self.max_capacity)
            .ok_or(ArenaError::CapacityExceeded {
                requested: size,
                used: self.cursor,
                max: self.max_capacity,
            })?;

        if end > self.capacity() {
            self.grow(end)?;
        }

        let start = self.cursor;
        self.region.bytes_mut()[start..end].fill(0);
        self.cursor = end;
        Ok(Offset(start as u64))
    }

    fn grow(&mut self, required: usize) -> Result<(), ArenaError> {
        let old = self.capacity();
        let new = old.saturating_mul(2).max(required).min(self.max_capacity);
        debug_assert!(new >= required);

        self.region.grow(new)?;
        tracing::debug!(from = old, to = new, path = ?self.path(), "grew arena");
        Ok(())
    }

    /// Resolve `offset` to a read-only window of `len` bytes.
    ///
    /// # Panics
    /// Panics if the window is null or reaches past the allocated region.
    #[inline]
    pub fn view(&self, offset: Offset, len: usize) -> &[u8] {
        let start = self.check_window(offset, len);
        &self.region.bytes()[start..start + len]
    }

    /// Resolve `offset` to a mutable window of `len` bytes.
    ///
    /// # Panics
    /// Panics if the window is null or reaches past the allocated region.
    #[inline]
    pub fn view_mut(&mut self, offset: Offset, len: usize) -> &mut [u8] {
        let start = self.check_window(offset, len);
        &mut self.region.bytes_mut()[start..start + len]
    }

    #[inline]
    fn check_window(&self, offset: Offset, len: usize) -> usize {
        let start = offset.as_usize();
        assert!(
            !offset.is_null()
                && start >= HEADER_SIZE
                && start.checked_add(len).is_some_and(|end| end <= self.cursor),
            "arena offset {offset} (+{len}) outside allocated range {HEADER_SIZE}..{}",
            self.cursor
        );
        start
    }

    /// Bytes allocated so far, header included.
    #[inline]
    pub fn used_bytes(&self) -> usize {
        self.cursor
    }

    /// Current size of the backing region.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.bytes().len()
    }

    /// Configured ceiling for [`capacity`](Self::capacity).
    #[inline]
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Path of the backing file, if memory-mapped.
    pub fn path(&self) -> Option<&Path> {
        match &self.region {
            Region::Heap(_) => None,
            Region::Mapped(m) => Some(&m.path),
        }
    }

    /// Flush a memory-mapped region to disk. No-op on the heap.
    pub fn flush(&self) -> Result<(), ArenaError> {
        match &self.region {
            Region::Heap(_) => Ok(()),
            Region::Mapped(m) => m.mmap.flush().map_err(|source| ArenaError::Io {
                path: m.path.clone(),
                source,
            }),
        }
    }

    /// Free the region. A memory-mapped arena also deletes its file.
    ///
    /// Every offset issued by this arena is invalid afterwards.
    pub fn release(self) -> Result<(), ArenaError> {
        let used = self.cursor;
        match self.region {
            Region::Heap(data) => drop(data),
            Region::Mapped(MappedRegion { mmap, file, path }) => {
                drop(mmap);
                drop(file);
                std::fs::remove_file(&path).map_err(|source| ArenaError::Io {
                    path: path.clone(),
                    source,
                })?;
            }
        }
        tracing::debug!(used, "released arena");
        Ok(())
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("used", &self.cursor)
            .field("capacity", &self.capacity())
            .field("max_capacity", &self.max_capacity)
            .field("path", &self.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_reserves_null() {
        let mut arena = Arena::with_capacity(64, 1024).unwrap();
        assert_eq!(arena.used_bytes(), HEADER_SIZE);

        let first = arena.allocate(8).unwrap();
        assert!(!first.is_null());
        assert_eq!(first.as_usize(), HEADER_SIZE);
        assert_eq!(arena.region.bytes()[..8], ARENA_MAGIC);
    }

    #[test]
    fn test_offsets_survive_growth() {
        let mut arena = Arena::with_capacity(32, 1 << 20).unwrap();

        let mut offsets = Vec::new();
        for i in 0..1000u64 {
            let off = arena.allocate(8).unwrap();
            arena.view_mut(off, 8).copy_from_slice(&i.to_le_bytes());
            offsets.push(off);
        }
        assert!(arena.capacity() > 32);

        for (i, off) in offsets.iter().enumerate() {
            let bytes: [u8; 8] = arena.view(*off, 8).try_into().unwrap();
            assert_eq!(u64::from_le_bytes(bytes), i as u64);
        }
    }

    #[test]
    fn test_offsets_are_unique_and_increasing() {
        let mut arena = Arena::with_capacity(64, 4096).unwrap();
        let a = arena.allocate(10).unwrap();
        let b = arena.allocate(3).unwrap();
        let c = arena.allocate(33).unwrap();
        assert_eq!(b.as_u64(), a.as_u64() + 10);
        assert_eq!(c.as_u64(), b.as_u64() + 3);
        assert_eq!(arena.used_bytes(), HEADER_SIZE + 46);
    }

    #[test]
    fn test_slots_are_zeroed() {
        let mut arena = Arena::with_capacity(64, 4096).unwrap();
        for _ in 0..20 {
            let off = arena.allocate(33).unwrap();
            assert!(arena.view(off, 33).iter().all(|&b| b == 0));
            arena.view_mut(off, 33).fill(0xAB);
        }
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut arena = Arena::with_capacity(32, 64).unwrap();
        arena.allocate(40).unwrap();
        let err = arena.allocate(16).unwrap_err();
        assert!(matches!(
            err,
            ArenaError::CapacityExceeded {
                requested: 16,
                used: 56,
                max: 64
            }
        ));
        // A failed allocation leaves the arena untouched.
        assert_eq!(arena.used_bytes(), 56);
        arena.allocate(8).unwrap();
        assert_eq!(arena.capacity(), 64);
    }

    #[test]
    fn test_zero_sized_allocation() {
        let mut arena = Arena::with_capacity(64, 4096).unwrap();
        assert!(matches!(
            arena.allocate(0),
            Err(ArenaError::ZeroSizedAllocation)
        ));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            Arena::with_capacity(4, 1024),
            Err(ArenaError::InvalidConfig(_))
        ));
        assert!(matches!(
            Arena::with_capacity(2048, 1024),
            Err(ArenaError::InvalidConfig(_))
        ));
    }

    #[test]
    #[should_panic(expected = "outside allocated range")]
    fn test_view_null_panics() {
        let arena = Arena::with_capacity(64, 4096).unwrap();
        let _ = arena.view(Offset::NULL, 1);
    }

    #[test]
    #[should_panic(expected = "outside allocated range")]
    fn test_view_past_cursor_panics() {
        let mut arena = Arena::with_capacity(64, 4096).unwrap();
        let off = arena.allocate(8).unwrap();
        let _ = arena.view(off, 9);
    }

    #[test]
    #[should_panic(expected = "outside allocated range")]
    fn test_view_wrapping_offset_panics() {
        let arena = Arena::with_capacity(64, 4096).unwrap();
        let _ = arena.view(Offset::new(u64::MAX), 8);
    }

    #[test]
    fn test_mapped_arena_grows_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArenaConfig::default()
            .with_initial_capacity(64)
            .with_max_capacity(1 << 20)
            .with_directory(dir.path());
        let mut arena = Arena::new(&config).unwrap();

        let path = arena.path().unwrap().to_path_buf();
        assert!(path.exists());

        let mut offsets = Vec::new();
        for i in 0..500u64 {
            let off = arena.allocate(8).unwrap();
            arena.view_mut(off, 8).copy_from_slice(&i.to_le_bytes());
            offsets.push(off);
        }
        arena.flush().unwrap();
        assert_eq!(
            std::fs::metadata(&path).unwrap().len() as usize,
            arena.capacity()
        );
        for (i, off) in offsets.iter().enumerate() {
            assert_eq!(arena.view(*off, 8), &(i as u64).to_le_bytes());
        }

        arena.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_mapped_arenas_use_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArenaConfig::default()
            .with_initial_capacity(64)
            .with_directory(dir.path());
        let a = Arena::new(&config).unwrap();
        let b = Arena::new(&config).unwrap();
        assert_ne!(a.path(), b.path());
        a.release().unwrap();
        b.release().unwrap();
    }
}
