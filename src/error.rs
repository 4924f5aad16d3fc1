use std::io;

use snafu::Snafu;

/// Lifecycle failures. Host failures mean the allocator cannot operate at all,
/// so callers should treat them as fatal.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
  #[snafu(display("invalid heap capacity {capacity}: {reason}"))]
  InvalidConfig {
    capacity: usize,
    reason: &'static str,
  },

  #[snafu(display("failed to map a {length} byte heap region"))]
  MapRegion { length: usize, source: io::Error },

  #[snafu(display("failed to unmap the {length} byte heap region"))]
  UnmapRegion { length: usize, source: io::Error },
}

/// Caller misuse detected by [`crate::Heap::deallocate`]. The heap is left
/// untouched whenever one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FreeError {
  #[snafu(display("null pointer"))]
  Null,

  #[snafu(display("attempted to free the epilogue block"))]
  Epilogue,

  #[snafu(display("payload offset {offset:#06x} lies outside the heap"))]
  OutOfBounds { offset: usize },

  #[snafu(display("payload offset {offset:#06x} does not start a block"))]
  NotABlock { offset: usize },

  #[snafu(display("block at {offset:#06x} is already free"))]
  AlreadyFree { offset: usize },
}

/// A broken heap invariant found by [`crate::Heap::check`]. Any of these is a
/// bug in the allocator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Violation {
  #[snafu(display("block at {offset:#06x} has zero length"))]
  ZeroLength { offset: usize },

  #[snafu(display("block at {offset:#06x} has misaligned length {length}"))]
  Misaligned { offset: usize, length: usize },

  #[snafu(display("block at {offset:#06x} with length {length} runs past the epilogue"))]
  Overrun { offset: usize, length: usize },

  #[snafu(display(
    "block at {offset:#06x} records prev_allocated={recorded}, but the previous block is {}",
    if *actual { "allocated" } else { "free" }
  ))]
  PrevAllocatedMismatch {
    offset: usize,
    recorded: bool,
    actual: bool,
  },

  #[snafu(display("free block at {offset:#06x} has header {header:#06x} but footer {footer:#06x}"))]
  FooterMismatch { offset: usize, header: u16, footer: u16 },

  #[snafu(display("free block at {offset:#06x} follows another free block"))]
  AdjacentFree { offset: usize },

  #[snafu(display("epilogue corrupted: length={length} allocated={allocated}"))]
  EpilogueCorrupted { length: usize, allocated: bool },
}
