/// Failures an allocator operation can report.
///
/// There is exactly one failure kind: the heap-growth provider ran out of
/// resources. Zero-size requests and null pointers passed to
/// `deallocate`/`reallocate` are defined behaviors, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
  #[error("heap region provider could not extend the managed region")]
  ResourceExhausted,
}
