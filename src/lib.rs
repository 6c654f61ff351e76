//! # fralloc - An Explicit Free-List Memory Allocator
//!
//! This crate provides a classic **explicit free-list allocator** with
//! boundary-tagged blocks, first-fit placement and eager coalescing, managing
//! a single contiguous region of raw memory that grows on demand.
//!
//! ## Overview
//!
//! ```text
//!   Managed Region:
//!
//!   ┌────┬──────────────┬─────────┬─────────┬─────────┬─────┬──────────┐
//!   │pad │  prologue    │ block 1 │ block 2 │ block 3 │ ... │ epilogue │
//!   │    │ (allocated)  │         │         │         │     │ (size 0) │
//!   └────┴──────────────┴─────────┴─────────┴─────────┴─────┴──────────┘
//!                       ▲                                    ▲
//!                       low fence                            high fence
//!
//!   The prologue and epilogue are permanently allocated sentinels, so a
//!   neighbor scan starting from any block never leaves the region.
//! ```
//!
//! Every block carries its size and allocated flag packed into one word at
//! its header and footer (boundary tags). The duplicated tag is what makes
//! the physical predecessor reachable in O(1): its footer sits immediately
//! below the current block's header.
//!
//! ```text
//!   Free Block:
//!
//!   ┌────────────┬──────┬──────┬────────────────────────┬────────────┐
//!   │ size | 0   │ pred │ succ │     unused payload     │ size | 0   │
//!   └────────────┴──────┴──────┴────────────────────────┴────────────┘
//!    header       free-list links                        footer
//!
//!   Allocated Block:
//!
//!   ┌────────────┬──────────────────────────────────────┬────────────┐
//!   │ size | 1   │            user payload              │ size | 1   │
//!   └────────────┴──────────────────────────────────────┴────────────┘
//!                ▲
//!                └── Pointer returned to the caller
//! ```
//!
//! Free blocks form a doubly linked list anchored at a sentinel inside the
//! prologue. The list is LIFO: freshly freed blocks go to the front, so the
//! most recently freed memory is reused first. Allocation scans the list
//! first-fit; freeing eagerly merges a block with its free physical
//! neighbors, so no two adjacent blocks are ever both free.
//!
//! ## Crate Structure
//!
//! ```text
//!   fralloc
//!   ├── align      - Alignment macro (align!)
//!   ├── block      - Boundary-tag block view (internal)
//!   ├── list       - Free-list manager (internal)
//!   ├── region     - HeapRegion provider trait, Sbrk and Arena providers
//!   ├── explicit   - ExplicitAllocator implementation
//!   └── error      - AllocError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fralloc::{Arena, ExplicitAllocator};
//!
//! let region = Arena::with_capacity(64 * 1024);
//! let mut allocator = ExplicitAllocator::new(region).unwrap();
//!
//! unsafe {
//!     // Allocate memory for a u64.
//!     let ptr = allocator.allocate(8).unwrap() as *mut u64;
//!
//!     // Use the memory.
//!     *ptr = 42;
//!     assert_eq!(*ptr, 42);
//!
//!     // Free the memory.
//!     allocator.deallocate(ptr as *mut u8);
//! }
//! ```
//!
//! ## How It Works
//!
//! New memory comes from a [`HeapRegion`] provider, the allocator's only
//! external collaborator. A provider extends the managed region contiguously
//! upward and never shrinks or moves it. Two providers ship with the crate:
//!
//! - [`Sbrk`] extends the program break with `sbrk(2)`, the traditional
//!   process heap;
//! - [`Arena`] draws from an owned, bounded buffer, which makes growth and
//!   exhaustion deterministic for tests and embedded use.
//!
//! The provider is asked for memory only when no free block fits, in chunks
//! of at least 4 KiB (configurable). When the block just below a fresh
//! extension is already free, the new space is absorbed into it so the
//! no-adjacent-free-blocks invariant survives growth events.
//!
//! ## Features
//!
//! - **Memory reuse**: freed blocks are recycled through the free list,
//!   split when oversized and merged when neighbors free up
//! - **Provider abstraction**: any growth source can back the allocator
//! - **O(1) free**: constant-time coalescing via boundary tags
//! - **Isolated instances**: each allocator owns its state; several can
//!   coexist over separate regions
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no internal locking; callers serialize
//! - **First-fit, single list**: no size classes or segregated lists
//! - **No in-place realloc**: resizing always searches, copies and frees
//! - **No corruption detection**: freeing a foreign or already-freed
//!   address is undefined behavior
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! All allocation and deallocation operations require `unsafe` blocks.

pub mod align;
mod block;
mod error;
mod explicit;
mod list;
mod region;

pub use error::AllocError;
pub use explicit::ExplicitAllocator;
pub use region::{Arena, HeapRegion, Sbrk};
