use std::fmt;

/// Running totals kept by the allocation and deallocation paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
  /// Bytes not covered by a live allocation, tag overhead included. The
  /// epilogue is never counted.
  pub available: usize,
  pub allocations: usize,
  pub deallocations: usize,
  /// Frees that merged with the block on the left only.
  pub left_coalesce: usize,
  /// Frees that merged with the block on the right only.
  pub right_coalesce: usize,
  /// Frees that merged with both neighbours.
  pub left_right_coalesce: usize,
}

impl Stats {
  pub(crate) fn new(available: usize) -> Self {
    Self {
      available,
      ..Self::default()
    }
  }

  /// Allocations that have not been freed yet.
  pub fn live(&self) -> usize {
    self.allocations - self.deallocations
  }
}

impl fmt::Display for Stats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "available={} allocations={} deallocations={} coalesce(l={} r={} lr={})",
      self.available,
      self.allocations,
      self.deallocations,
      self.left_coalesce,
      self.right_coalesce,
      self.left_right_coalesce,
    )
  }
}
