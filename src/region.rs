use std::mem;

use libc::{c_void, intptr_t, sbrk};

use crate::{AllocError, align};

/// Source of new memory for an allocator.
///
/// A provider extends the managed region upward by at least the requested
/// number of bytes and returns the start address of the extension.
///
/// # Safety
///
/// Implementations must uphold the region contract the allocator's
/// bookkeeping depends on:
///
/// - every successful `grow` returns memory contiguous with the previously
///   granted region (the new extension starts exactly where the last one
///   ended);
/// - granted memory is valid for reads and writes, exclusive to the caller,
///   and word aligned;
/// - the region never shrinks, moves or gets reclaimed while the allocator
///   is alive.
pub unsafe trait HeapRegion {
  /// Extends the region by at least `nbytes` bytes and returns the start
  /// address of the new extension, or [`AllocError::ResourceExhausted`] when
  /// the underlying resource is spent.
  fn grow(
    &mut self,
    nbytes: usize,
  ) -> Result<*mut u8, AllocError>;
}

/// Region provider backed by the program break, grown with `sbrk(2)`.
///
/// Unix only. The program break is a single per-process resource, so at most
/// one allocator should drive it at a time.
pub struct Sbrk;

unsafe impl HeapRegion for Sbrk {
  fn grow(
    &mut self,
    nbytes: usize,
  ) -> Result<*mut u8, AllocError> {
    let address = unsafe { sbrk(nbytes as intptr_t) };

    if address == usize::MAX as *mut c_void {
      return Err(AllocError::ResourceExhausted);
    }

    Ok(address as *mut u8)
  }
}

/// Region provider backed by an owned, bounded buffer.
///
/// Grows monotonically through the buffer and fails once the capacity is
/// spent, which makes exhaustion and growth behavior deterministic. This is
/// what the crate's own tests run against, and it lets several allocators
/// coexist in one process.
pub struct Arena {
  words: Box<[usize]>,
  used: usize,
}

impl Arena {
  /// Reserves a region of (word-aligned) `capacity` bytes up front.
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      words: vec![0usize; align!(capacity) / mem::size_of::<usize>()].into_boxed_slice(),
      used: 0,
    }
  }

  /// Total bytes this region can ever grant.
  pub fn capacity(&self) -> usize {
    self.words.len() * mem::size_of::<usize>()
  }

  /// Total bytes granted so far.
  pub fn granted(&self) -> usize {
    self.used
  }
}

unsafe impl HeapRegion for Arena {
  fn grow(
    &mut self,
    nbytes: usize,
  ) -> Result<*mut u8, AllocError> {
    let nbytes = align!(nbytes);

    if nbytes > self.capacity() - self.used {
      return Err(AllocError::ResourceExhausted);
    }

    let address = unsafe { (self.words.as_mut_ptr() as *mut u8).add(self.used) };
    self.used += nbytes;

    Ok(address)
  }
}
