#![forbid(unsafe_code)]

//! A bump allocator over caller-supplied memory.
//!
//! All of the codec's working memory comes from an [`Arena`]. Allocation is
//! sequential, every allocation is 16-byte aligned and zero filled, and nothing
//! is ever freed on its own. Memory goes back only in bulk:
//!
//! * Drop the arena (or the memory it was built over), or
//! * take a [`scratch`](Arena::scratch) arena, allocate from that, and then
//!   drop it. Everything the scratch arena handed out is reclaimed when it
//!   goes away, which works as a mark/revert checkpoint. The borrow checker
//!   makes sure none of those allocations are still in use by then.

use crate::{PngError, PngResult};

/// Alignment of every allocation, in bytes.
pub const ARENA_ALIGN: usize = 16;

/// Bump allocator over a borrowed byte slice.
pub struct Arena<'m> {
  free: &'m mut [u8],
  used: usize,
  capacity: usize,
}
impl core::fmt::Debug for Arena<'_> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Arena")
      .field("used", &self.used)
      .field("remaining", &self.free.len())
      .field("capacity", &self.capacity)
      .finish()
  }
}

impl<'m> Arena<'m> {
  /// Makes an arena that allocates out of `memory`.
  #[inline]
  #[must_use]
  pub fn new(memory: &'m mut [u8]) -> Self {
    let capacity = memory.len();
    Self { free: memory, used: 0, capacity }
  }

  /// Total bytes this arena started with (for a scratch arena, the total of the
  /// root arena).
  #[inline]
  #[must_use]
  pub const fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes used so far, alignment padding included.
  #[inline]
  #[must_use]
  pub const fn used(&self) -> usize {
    self.used
  }

  /// Bytes still available, before any alignment padding.
  #[inline]
  #[must_use]
  pub fn remaining(&self) -> usize {
    self.free.len()
  }

  /// Allocates `count` zeroed bytes, 16-byte aligned.
  ///
  /// ## Failure
  /// * [`PngError::OutOfMemory`] if the arena doesn't have the space left.
  pub fn alloc_bytes(&mut self, count: usize) -> PngResult<&'m mut [u8]> {
    let pad = self.free.as_ptr().align_offset(ARENA_ALIGN);
    let needed = pad.checked_add(count).ok_or(PngError::OutOfMemory)?;
    if needed > self.free.len() {
      log::trace!("arena: wanted {count} bytes, {} left", self.free.len());
      return Err(PngError::OutOfMemory);
    }
    let free = core::mem::take(&mut self.free);
    let (taken, rest) = free.split_at_mut(needed);
    self.free = rest;
    self.used += needed;
    let out = &mut taken[pad..];
    out.fill(0);
    Ok(out)
  }

  /// Allocates `count` zeroed `u16` values.
  pub fn alloc_u16(&mut self, count: usize) -> PngResult<&'m mut [u16]> {
    let byte_count = count.checked_mul(2).ok_or(PngError::OutOfMemory)?;
    let bytes = self.alloc_bytes(byte_count)?;
    Ok(bytemuck::try_cast_slice_mut(bytes)?)
  }

  /// Makes a checkpoint arena over the space that's still free.
  ///
  /// Allocations from the returned arena don't count against `self`: once the
  /// scratch arena and everything it handed out are gone, the space is all
  /// available again.
  #[inline]
  pub fn scratch(&mut self) -> Arena<'_> {
    Arena { free: &mut *self.free, used: self.used, capacity: self.capacity }
  }
}

#[test]
fn test_arena_alignment_and_zeroing() {
  let mut memory = [0xAB_u8; 256];
  let mut arena = Arena::new(&mut memory);
  let a = arena.alloc_bytes(3).unwrap();
  assert_eq!(a, &[0, 0, 0]);
  assert_eq!(a.as_ptr() as usize % ARENA_ALIGN, 0);
  let b = arena.alloc_u16(5).unwrap();
  assert_eq!(b, &[0; 5]);
  assert_eq!(b.as_ptr() as usize % ARENA_ALIGN, 0);
  assert!(arena.used() >= 3 + 10);
}

#[test]
fn test_arena_out_of_memory() {
  let mut memory = [0_u8; 64];
  let mut arena = Arena::new(&mut memory);
  assert_eq!(arena.alloc_bytes(1000), Err(PngError::OutOfMemory));
  // a failed allocation doesn't use anything up
  assert_eq!(arena.remaining(), 64);
  assert_eq!(arena.alloc_bytes(usize::MAX), Err(PngError::OutOfMemory));
}

#[test]
fn test_arena_scratch_reverts() {
  let mut memory = [0_u8; 512];
  let mut arena = Arena::new(&mut memory);
  let keep = arena.alloc_bytes(16).unwrap();
  keep[0] = 7;
  let before = arena.remaining();
  {
    let mut scratch = arena.scratch();
    let temp = scratch.alloc_bytes(200).unwrap();
    temp.fill(9);
    assert!(scratch.remaining() < before);
  }
  assert_eq!(arena.remaining(), before);
  // the space is handed out again, and zeroed again
  let again = arena.alloc_bytes(200).unwrap();
  assert!(again.iter().all(|&b| b == 0));
  assert_eq!(keep[0], 7);
}
