use crate::block::Block;

/// Doubly linked list of every free block, anchored at a sentinel block.
///
/// The sentinel lives inside the prologue and is never handed out, matched or
/// removed; its successor is the front of the list. Ordering is LIFO: blocks
/// are always inserted at the front when they become free, so the most
/// recently freed block is found first.
pub(crate) struct FreeList {
  sentinel: Block,
}

impl FreeList {
  /// Anchors a list at `sentinel`, whose link words must already be cleared.
  pub(crate) fn new(sentinel: Block) -> Self {
    Self { sentinel }
  }

  #[cfg(test)]
  pub(crate) fn sentinel(&self) -> Block {
    self.sentinel
  }

  /// Links `block` as the immediate successor of the sentinel. O(1).
  pub(crate) unsafe fn push_front(
    &mut self,
    block: Block,
  ) {
    unsafe {
      let first = self.sentinel.succ();

      self.sentinel.set_succ(Some(block));
      block.set_pred(self.sentinel);
      block.set_succ(first);

      if let Some(first) = first {
        first.set_pred(block);
      }
    }
  }

  /// Splices `block` out of the list. O(1).
  ///
  /// `block` must currently be linked; its own link words are left stale.
  pub(crate) unsafe fn remove(
    &mut self,
    block: Block,
  ) {
    unsafe {
      let pred = block.pred();
      let succ = block.succ();

      pred.set_succ(succ);

      if let Some(succ) = succ {
        succ.set_pred(pred);
      }
    }
  }

  /// Scans from the front for the first block of at least `min_size` bytes.
  /// O(k) in the list length.
  pub(crate) unsafe fn first_fit(
    &self,
    min_size: usize,
  ) -> Option<Block> {
    unsafe {
      let mut current = self.sentinel.succ();

      while let Some(block) = current {
        if block.size() >= min_size {
          return Some(block);
        }
        current = block.succ();
      }

      None
    }
  }
}
