use std::{cmp, mem, ptr};

use log::{debug, trace};

use crate::block::{Block, MIN_BLOCK, OVERHEAD, WORD, pack, put};
use crate::error::AllocError;
use crate::list::FreeList;
use crate::region::HeapRegion;
use crate::align;

/// Default heap-growth chunk: 4 KiB.
const DEFAULT_CHUNK: usize = 1 << 12;

/// First-fit allocator over an explicit, LIFO-ordered free list with
/// boundary-tagged blocks.
///
/// The managed region is fenced by an allocated prologue block below and a
/// zero-size allocated epilogue header above, so neighbor scans never step
/// outside it. The free-list sentinel lives in the prologue's payload.
///
/// Not reentrant and not thread safe: callers must serialize all operations
/// themselves.
pub struct ExplicitAllocator<R: HeapRegion> {
  region: R,
  list: FreeList,
  chunk: usize,
}

/// Allocated block size for a requested payload of `request` bytes: the
/// aligned payload plus header/footer overhead, never below the minimum
/// block size.
fn block_size_for(request: usize) -> usize {
  if request <= MIN_BLOCK - OVERHEAD {
    MIN_BLOCK
  } else {
    align!(request) + OVERHEAD
  }
}

impl<R: HeapRegion> ExplicitAllocator<R> {
  /// Initializes an allocator over `region` with the default growth chunk.
  ///
  /// Fails only if the initial reservation from the region provider fails.
  pub fn new(region: R) -> Result<Self, AllocError> {
    Self::with_chunk_size(region, DEFAULT_CHUNK)
  }

  /// Initializes an allocator that grows the heap in steps of at least
  /// `chunk` bytes (rounded up to the alignment unit and the minimum block
  /// size).
  pub fn with_chunk_size(
    mut region: R,
    chunk: usize,
  ) -> Result<Self, AllocError> {
    let chunk = cmp::max(align!(chunk), MIN_BLOCK);

    // One padding word, prologue (header, two sentinel link words, footer),
    // epilogue header.
    let base = region.grow(6 * WORD)?;

    unsafe {
      put(base, 0);
      put(base.add(WORD), pack(4 * WORD, true));
      put(base.add(2 * WORD), 0);
      put(base.add(3 * WORD), 0);
      put(base.add(4 * WORD), pack(4 * WORD, true));
      put(base.add(5 * WORD), pack(0, true));
    }

    let sentinel = Block::from_payload(unsafe { base.add(2 * WORD) });
    let mut allocator = Self {
      region,
      list: FreeList::new(sentinel),
      chunk,
    };

    unsafe { allocator.extend(allocator.chunk)? };

    debug!("initialized managed region with {chunk} byte growth chunk");

    Ok(allocator)
  }

  /// The region provider this allocator draws from.
  pub fn region(&self) -> &R {
    &self.region
  }

  /// Allocates a block with at least `size` usable bytes and returns its
  /// payload address, aligned to the word size.
  ///
  /// A zero `size` is a no-op returning a null pointer. Fails only when the
  /// region provider cannot grow the heap; the allocator stays valid and
  /// usable after such a failure.
  ///
  /// # Safety
  ///
  /// The returned memory is uninitialized. The caller must not use it past
  /// `deallocate` and must not exceed the requested size.
  pub unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> Result<*mut u8, AllocError> {
    if size == 0 {
      return Ok(ptr::null_mut());
    }

    let asize = block_size_for(size);

    unsafe {
      let block = self.obtain(asize)?;
      let (granted, found) = self.reserve(block, asize);
      self.release_remainder(block, granted, found);

      Ok(block.payload())
    }
  }

  /// Frees the block at `address` and eagerly merges it with any free
  /// physical neighbor. A null `address` is accepted silently.
  ///
  /// # Safety
  ///
  /// `address` must be null or a payload address previously returned by
  /// `allocate`/`reallocate` of this allocator and not freed since. Freeing
  /// a foreign or already-freed address is a contract violation with
  /// undefined behavior.
  pub unsafe fn deallocate(
    &mut self,
    address: *mut u8,
  ) {
    if address.is_null() {
      return;
    }

    unsafe {
      let block = Block::from_payload(address);

      block.set_tags(block.size(), false);
      self.coalesce(block);
    }
  }

  /// Resizes the block at `address` to hold at least `size` bytes, moving it
  /// to a freshly placed block and copying the common payload prefix.
  ///
  /// A null `address` behaves as `allocate(size)`; a zero `size` frees the
  /// block and returns a null pointer. No in-place growth or shrink is
  /// attempted: growing and shrinking both search for a new block. On
  /// failure the original block is left intact.
  ///
  /// # Safety
  ///
  /// Same contract as `deallocate` for `address`; on success the old address
  /// must no longer be used.
  pub unsafe fn reallocate(
    &mut self,
    address: *mut u8,
    size: usize,
  ) -> Result<*mut u8, AllocError> {
    if address.is_null() {
      return unsafe { self.allocate(size) };
    }

    if size == 0 {
      unsafe { self.deallocate(address) };
      return Ok(ptr::null_mut());
    }

    let asize = block_size_for(size);

    unsafe {
      let old = Block::from_payload(address);
      let old_size = old.size();

      let block = self.obtain(asize)?;
      let (granted, found) = self.reserve(block, asize);

      // Copy before freeing: freeing first would let the coalescer rewrite
      // the old payload's leading words as list links.
      let common = cmp::min(old_size, granted) - OVERHEAD;
      ptr::copy_nonoverlapping(address, block.payload(), common);

      old.set_tags(old_size, false);
      self.coalesce(old);

      self.release_remainder(block, granted, found);

      Ok(block.payload())
    }
  }

  /// Finds a free block of at least `asize` bytes, growing the heap when the
  /// free list has no fit. The returned block is still linked into the list.
  unsafe fn obtain(
    &mut self,
    asize: usize,
  ) -> Result<Block, AllocError> {
    unsafe {
      match self.list.first_fit(asize) {
        Some(block) => Ok(block),
        None => self.extend(cmp::max(asize, self.chunk)),
      }
    }
  }

  /// Grows the managed region by `nbytes` and shapes the extension into a
  /// free block whose header overwrites the old epilogue; a fresh epilogue
  /// header is written at the new top.
  ///
  /// When the block just below the old top is already free, the extension is
  /// absorbed into it instead of entering the list as a second, adjacent
  /// free block. Either way the surviving block is linked into the list and
  /// returned.
  ///
  /// The provider is consulted before any tag is written, so a failed grow
  /// leaves no observable mutation.
  unsafe fn extend(
    &mut self,
    nbytes: usize,
  ) -> Result<Block, AllocError> {
    trace!("growing managed region by {nbytes} bytes");

    let address = self.region.grow(nbytes)?;

    unsafe {
      let block = Block::from_payload(address);

      block.set_tags(nbytes, false);
      block.next().set_header(0, true);

      let prev = block.prev();

      if prev.is_allocated() {
        self.list.push_front(block);
        Ok(block)
      } else {
        // The predecessor keeps its place in the list; only its tags grow.
        prev.set_tags(prev.size() + nbytes, false);
        Ok(prev)
      }
    }
  }

  /// Marks `block` allocated and unlinks it from the free list.
  ///
  /// When splitting would leave a tail smaller than the minimum block size,
  /// the whole block is granted instead. Returns the granted size and the
  /// block's size as found.
  unsafe fn reserve(
    &mut self,
    block: Block,
    asize: usize,
  ) -> (usize, usize) {
    unsafe {
      let found = block.size();
      let granted = if found - asize < MIN_BLOCK { found } else { asize };

      // The link words sit at the front of the payload, clear of both tags,
      // so the block can still be spliced out after retagging.
      block.set_tags(granted, true);
      self.list.remove(block);

      (granted, found)
    }
  }

  /// Carves the ungranted tail of a reserved block into a free block and
  /// hands it to the coalescer.
  unsafe fn release_remainder(
    &mut self,
    block: Block,
    granted: usize,
    found: usize,
  ) {
    if granted < found {
      unsafe {
        let tail = block.next();

        tail.set_tags(found - granted, false);
        self.coalesce(tail);
      }
    }
  }

  /// Merges the free block `block` with its free physical neighbors and
  /// leaves the surviving block linked into the free list exactly once.
  ///
  /// Returns the surviving block, which is the physical predecessor whenever
  /// that side merges; callers must use the returned identity, as `block`
  /// itself may no longer exist.
  unsafe fn coalesce(
    &mut self,
    block: Block,
  ) -> Block {
    unsafe {
      let prev = block.prev();
      let next = block.next();
      let size = block.size();

      match (prev.is_allocated(), next.is_allocated()) {
        // No free neighbor: the block enters the list as-is.
        (true, true) => {
          self.list.push_front(block);
          block
        }
        // Absorb the successor, then take its place at the list front.
        (true, false) => {
          self.list.remove(next);
          block.set_tags(size + next.size(), false);
          self.list.push_front(block);
          block
        }
        // The predecessor absorbs this block and keeps its list position.
        (false, true) => {
          prev.set_tags(prev.size() + size, false);
          prev
        }
        // Three-way merge into the predecessor; the successor leaves the
        // list, the predecessor keeps its position.
        (false, false) => {
          self.list.remove(next);
          prev.set_tags(prev.size() + size + next.size(), false);
          prev
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;
  use crate::region::Arena;

  // Bookkeeping bytes that never belong to any block: padding word, prologue,
  // epilogue header.
  const FENCE: usize = 6 * WORD;

  impl<R: HeapRegion> ExplicitAllocator<R> {
    // Walks the physical blocks between prologue and epilogue, as
    // (payload address, size, allocated) triples.
    fn physical_blocks(&self) -> Vec<(usize, usize, bool)> {
      let mut blocks = Vec::new();

      unsafe {
        let mut block = self.list.sentinel().next();

        while block.size() != 0 {
          blocks.push((block.payload() as usize, block.size(), block.is_allocated()));
          block = block.next();
        }
      }

      blocks
    }

    fn free_list_payloads(&self) -> Vec<usize> {
      let mut payloads = Vec::new();

      unsafe {
        let mut current = self.list.sentinel().succ();

        while let Some(block) = current {
          payloads.push(block.payload() as usize);
          current = block.succ();
        }
      }

      payloads
    }

    fn assert_invariants(&self) {
      let blocks = self.physical_blocks();

      // No two physically adjacent blocks are both free.
      for pair in blocks.windows(2) {
        assert!(
          pair[0].2 || pair[1].2,
          "adjacent free blocks at {:#x} and {:#x}",
          pair[0].0,
          pair[1].0
        );
      }

      // The free list holds exactly the blocks tagged free, each once.
      let tagged_free: HashSet<usize> =
        blocks.iter().filter(|block| !block.2).map(|block| block.0).collect();
      let listed = self.free_list_payloads();
      let listed_set: HashSet<usize> = listed.iter().copied().collect();

      assert_eq!(listed.len(), listed_set.len(), "duplicate free-list entry");
      assert_eq!(listed_set, tagged_free);
    }
  }

  impl ExplicitAllocator<Arena> {
    // Every byte the provider ever granted is either fence bookkeeping or
    // part of exactly one block.
    fn assert_size_conservation(&self) {
      let total: usize = self.physical_blocks().iter().map(|block| block.1).sum();

      assert_eq!(total + FENCE, self.region().granted());
    }
  }

  fn arena_allocator(capacity: usize) -> ExplicitAllocator<Arena> {
    ExplicitAllocator::new(Arena::with_capacity(capacity)).unwrap()
  }

  #[test]
  fn test_zero_size_and_null_inputs() {
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      assert!(allocator.allocate(0).unwrap().is_null());
      allocator.deallocate(ptr::null_mut());
      assert!(allocator.reallocate(ptr::null_mut(), 0).unwrap().is_null());
    }

    allocator.assert_invariants();
  }

  #[test]
  fn test_alignment() {
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      for size in [1, 2, 3, 8, 13, 24, 100, 1000] {
        let address = allocator.allocate(size).unwrap();
        assert_eq!(address as usize % WORD, 0, "unaligned for size {size}");
      }
    }

    allocator.assert_invariants();
    allocator.assert_size_conservation();
  }

  #[test]
  fn test_lifo_reuse_of_single_free_block() {
    // Scenario A: free the only allocation, then allocate the same size
    // again; the same address must come back.
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      let first = allocator.allocate(16).unwrap();
      assert!(!first.is_null());

      allocator.deallocate(first);
      allocator.assert_invariants();

      let second = allocator.allocate(16).unwrap();
      assert_eq!(first, second);
    }
  }

  #[test]
  fn test_minimum_block_for_tiny_request() {
    // Scenario B: a 1-byte request is served from a minimum-size block,
    // whose usable capacity is MIN_BLOCK - OVERHEAD bytes.
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      let address = allocator.allocate(1).unwrap();

      let block = allocator
        .physical_blocks()
        .into_iter()
        .find(|candidate| candidate.0 == address as usize)
        .unwrap();
      assert_eq!(block.1, MIN_BLOCK);

      // All usable bytes are writable.
      ptr::write_bytes(address, 0x5A, MIN_BLOCK - OVERHEAD);
    }

    allocator.assert_invariants();
  }

  #[test]
  fn test_backward_coalescing_chain() {
    // Scenario C: three contiguous 32-byte allocations; freeing B then A
    // leaves one free block spanning A and B.
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      let a = allocator.allocate(32).unwrap();
      let b = allocator.allocate(32).unwrap();
      let c = allocator.allocate(32).unwrap();

      let block_size = block_size_for(32);
      assert_eq!(b as usize - a as usize, block_size);
      assert_eq!(c as usize - b as usize, block_size);

      allocator.deallocate(b);
      allocator.deallocate(a);
      allocator.assert_invariants();

      let merged = allocator
        .physical_blocks()
        .into_iter()
        .find(|block| block.0 == a as usize)
        .unwrap();
      assert_eq!(merged.1, 2 * block_size);
      assert!(!merged.2);
    }
  }

  #[test]
  fn test_forward_and_three_way_coalescing() {
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      let a = allocator.allocate(32).unwrap();
      let b = allocator.allocate(32).unwrap();
      let c = allocator.allocate(32).unwrap();
      let _hold = allocator.allocate(32).unwrap();

      // Free A, then C, then B: the final free merges all three.
      allocator.deallocate(a);
      allocator.deallocate(c);
      allocator.assert_invariants();

      allocator.deallocate(b);
      allocator.assert_invariants();

      let merged = allocator
        .physical_blocks()
        .into_iter()
        .find(|block| block.0 == a as usize)
        .unwrap();
      assert_eq!(merged.1, 3 * block_size_for(32));
      assert!(!merged.2);
    }
  }

  #[test]
  fn test_most_recently_freed_is_reused_first() {
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      let a = allocator.allocate(32).unwrap();
      let _b = allocator.allocate(32).unwrap();
      let c = allocator.allocate(32).unwrap();
      let _d = allocator.allocate(32).unwrap();

      // A and C are not adjacent, so they stay distinct free blocks.
      allocator.deallocate(a);
      allocator.deallocate(c);

      assert_eq!(allocator.allocate(32).unwrap(), c);
      assert_eq!(allocator.allocate(32).unwrap(), a);
    }

    allocator.assert_invariants();
  }

  #[test]
  fn test_realloc_null_and_zero() {
    // Scenario D: reallocate(null, n) allocates; reallocate(address, 0)
    // frees and returns null.
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      let address = allocator.reallocate(ptr::null_mut(), 64).unwrap();
      assert!(!address.is_null());
      assert_eq!(address as usize % WORD, 0);

      let freed = allocator.reallocate(address, 0).unwrap();
      assert!(freed.is_null());

      // Everything merged back into a single free block.
      let blocks = allocator.physical_blocks();
      assert_eq!(blocks.len(), 1);
      assert!(!blocks[0].2);
    }

    allocator.assert_invariants();
  }

  #[test]
  fn test_realloc_preserves_payload_prefix() {
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      let old = allocator.allocate(24).unwrap();
      for i in 0..24 {
        old.add(i).write(i as u8);
      }

      let new = allocator.reallocate(old, 200).unwrap();

      for i in 0..24 {
        assert_eq!(new.add(i).read(), i as u8);
      }
    }

    allocator.assert_invariants();
    allocator.assert_size_conservation();
  }

  #[test]
  fn test_realloc_shrink_copies_common_prefix() {
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      let old = allocator.allocate(100).unwrap();
      for i in 0..100 {
        old.add(i).write(!(i as u8));
      }

      let new = allocator.reallocate(old, 10).unwrap();

      for i in 0..10 {
        assert_eq!(new.add(i).read(), !(i as u8));
      }
    }

    allocator.assert_invariants();
  }

  #[test]
  fn test_growth_events_keep_invariants() {
    // Scenario E: requests larger than the growth chunk force repeated
    // extensions; invariants must hold across every growth boundary.
    let mut allocator = arena_allocator(256 * 1024);
    let mut held = Vec::new();

    unsafe {
      for size in [8_000, 16_000, 32_000] {
        let address = allocator.allocate(size).unwrap();
        ptr::write_bytes(address, 0xC3, size);
        held.push(address);

        allocator.assert_invariants();
        allocator.assert_size_conservation();
      }

      for address in held {
        allocator.deallocate(address);
        allocator.assert_invariants();
        allocator.assert_size_conservation();
      }

      // All space merged back into free blocks, reusable without growth.
      let granted_before = allocator.region().granted();
      let address = allocator.allocate(32_000).unwrap();
      assert!(!address.is_null());
      assert_eq!(allocator.region().granted(), granted_before);
    }
  }

  #[test]
  fn test_exhaustion_is_not_fatal() {
    let mut allocator = arena_allocator(8 * 1024);

    unsafe {
      assert_eq!(allocator.allocate(100_000), Err(AllocError::ResourceExhausted));

      allocator.assert_invariants();
      allocator.assert_size_conservation();

      // The allocator stays usable after a failed growth.
      let address = allocator.allocate(64).unwrap();
      assert!(!address.is_null());
    }
  }

  #[test]
  fn test_failed_realloc_leaves_block_intact() {
    let mut allocator = arena_allocator(8 * 1024);

    unsafe {
      let address = allocator.allocate(64).unwrap();
      for i in 0..64 {
        address.add(i).write(i as u8);
      }

      assert_eq!(
        allocator.reallocate(address, 100_000),
        Err(AllocError::ResourceExhausted)
      );

      for i in 0..64 {
        assert_eq!(address.add(i).read(), i as u8);
      }
    }

    allocator.assert_invariants();
  }

  #[test]
  fn test_init_failure() {
    assert!(ExplicitAllocator::new(Arena::with_capacity(0)).is_err());
    // Room for the fence but not for the first chunk.
    assert!(ExplicitAllocator::new(Arena::with_capacity(1024)).is_err());
  }

  #[test]
  fn test_custom_chunk_size() {
    let allocator =
      ExplicitAllocator::with_chunk_size(Arena::with_capacity(1024), 256).unwrap();
    assert_eq!(allocator.region().granted(), FENCE + 256);

    let mut allocator =
      ExplicitAllocator::with_chunk_size(Arena::with_capacity(4 * 1024), 64).unwrap();

    unsafe {
      // A request above the chunk grows by the request itself.
      let address = allocator.allocate(200).unwrap();
      assert!(!address.is_null());
    }

    allocator.assert_invariants();
    allocator.assert_size_conservation();
  }

  #[test]
  fn test_split_remainder_rule() {
    let mut allocator =
      ExplicitAllocator::with_chunk_size(Arena::with_capacity(4 * 1024), 2 * MIN_BLOCK).unwrap();

    unsafe {
      // Leaves exactly MIN_BLOCK behind: the block splits.
      let address = allocator.allocate(MIN_BLOCK - OVERHEAD).unwrap();
      let blocks = allocator.physical_blocks();
      assert_eq!(blocks.len(), 2);
      assert_eq!(blocks[0], (address as usize, MIN_BLOCK, true));
      assert_eq!(blocks[1].1, MIN_BLOCK);

      allocator.deallocate(address);

      // Would leave less than MIN_BLOCK behind: the whole block is granted.
      let address = allocator.allocate(MIN_BLOCK + WORD - OVERHEAD).unwrap();
      let blocks = allocator.physical_blocks();
      assert_eq!(blocks.len(), 1);
      assert_eq!(blocks[0], (address as usize, 2 * MIN_BLOCK, true));
    }

    allocator.assert_invariants();
  }
}
