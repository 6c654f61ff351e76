use std::mem;
use std::ptr;

/// Word size in bytes. Headers, footers and free-list links are each one word.
pub(crate) const WORD: usize = mem::size_of::<usize>();

/// Bytes of bookkeeping carried by every block: one header plus one footer.
pub(crate) const OVERHEAD: usize = 2 * WORD;

/// Smallest legal block: header, footer and two link words.
///
/// A free block must be able to hold its list links inside the payload area,
/// so no block may ever shrink below this.
pub(crate) const MIN_BLOCK: usize = 4 * WORD;

/// Packs a block size and its allocated flag into one tag word.
///
/// Sizes are always word-aligned, so bit 0 is free to carry the flag.
pub(crate) const fn pack(size: usize, allocated: bool) -> usize {
  size | allocated as usize
}

/// Writes a raw word at `ptr`.
pub(crate) unsafe fn put(ptr: *mut u8, value: usize) {
  unsafe { (ptr as *mut usize).write(value) };
}

unsafe fn get(ptr: *const u8) -> usize {
  unsafe { (ptr as *const usize).read() }
}

const fn tag_size(tag: usize) -> usize {
  tag & !(WORD - 1)
}

const fn tag_allocated(tag: usize) -> bool {
  tag & 1 != 0
}

/// A view over one block of the managed region, identified by its payload
/// address (the address handed out to callers).
///
/// The block's metadata lives in the region itself:
///
/// ```text
///          header               payload                    footer
///   ┌──────────────────┬───────────────────────────┬──────────────────┐
///   │ size | allocated │ pred, succ when free ...  │ size | allocated │
///   └──────────────────┴───────────────────────────┴──────────────────┘
///   ▲                  ▲
///   payload - WORD     payload (word aligned)
/// ```
///
/// All accessors are unsafe: they are only meaningful while the payload
/// address points into a region whose tags have been written.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Block(*mut u8);

impl Block {
  pub(crate) fn from_payload(payload: *mut u8) -> Self {
    Self(payload)
  }

  pub(crate) fn payload(self) -> *mut u8 {
    self.0
  }

  /// Total block size in bytes, including header and footer.
  pub(crate) unsafe fn size(self) -> usize {
    unsafe { tag_size(get(self.0.sub(WORD))) }
  }

  pub(crate) unsafe fn is_allocated(self) -> bool {
    unsafe { tag_allocated(get(self.0.sub(WORD))) }
  }

  /// Writes matching header and footer tags for this block.
  pub(crate) unsafe fn set_tags(
    self,
    size: usize,
    allocated: bool,
  ) {
    unsafe {
      put(self.0.sub(WORD), pack(size, allocated));
      put(self.0.add(size - OVERHEAD), pack(size, allocated));
    }
  }

  /// Writes only the header tag. Used for the zero-size epilogue sentinel,
  /// which has no footer.
  pub(crate) unsafe fn set_header(
    self,
    size: usize,
    allocated: bool,
  ) {
    unsafe { put(self.0.sub(WORD), pack(size, allocated)) };
  }

  /// The physically following block.
  pub(crate) unsafe fn next(self) -> Block {
    unsafe { Block(self.0.add(self.size())) }
  }

  /// The physically preceding block, located through its footer, which sits
  /// immediately below this block's header.
  pub(crate) unsafe fn prev(self) -> Block {
    unsafe { Block(self.0.sub(tag_size(get(self.0.sub(OVERHEAD))))) }
  }

  /// Free-list predecessor link. Never null for a listed block: the list is
  /// anchored at a sentinel, so the front block's predecessor is the sentinel.
  pub(crate) unsafe fn pred(self) -> Block {
    unsafe { Block(get(self.0) as *mut u8) }
  }

  pub(crate) unsafe fn succ(self) -> Option<Block> {
    let link = unsafe { get(self.0.add(WORD)) as *mut u8 };
    if link.is_null() { None } else { Some(Block(link)) }
  }

  pub(crate) unsafe fn set_pred(
    self,
    pred: Block,
  ) {
    unsafe { put(self.0, pred.0 as usize) };
  }

  pub(crate) unsafe fn set_succ(
    self,
    succ: Option<Block>,
  ) {
    let link = succ.map_or(ptr::null_mut(), |block| block.0);
    unsafe { put(self.0.add(WORD), link as usize) };
  }
}
