use std::{fmt, ptr::NonNull};

use crate::{
  HEAP_ALIGN, TAG_SIZE,
  config::HeapConfig,
  error::Error,
  region::Region,
  stats::Stats,
  tag::{self, Tag},
};

/// Offset of an allocation's payload inside its heap. This is what
/// [`Heap::allocate`] hands out and [`Heap::deallocate`] takes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Payload(usize);

impl Payload {
  pub const fn new(offset: usize) -> Self {
    Self(offset)
  }

  pub const fn offset(self) -> usize {
    self.0
  }

  /// Offset of the header that precedes this payload, if there is room for
  /// one.
  pub(crate) const fn header(self) -> Option<usize> {
    self.0.checked_sub(TAG_SIZE)
  }

  pub(crate) const fn of_block(block: usize) -> Self {
    Self(block + TAG_SIZE)
  }
}

/// A block seen while walking the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
  pub offset: usize,
  pub tag: Tag,
}

impl Block {
  pub fn length(&self) -> usize {
    self.tag.length()
  }

  pub fn is_allocated(&self) -> bool {
    self.tag.allocated()
  }

  pub fn payload(&self) -> Payload {
    Payload::of_block(self.offset)
  }
}

/// A fixed-capacity heap managed as an implicit free list.
///
/// The last [`HEAP_ALIGN`] bytes hold the epilogue, an allocated sentinel
/// that gives every real block a successor.
pub struct Heap {
  pub(crate) region: Region,
  pub(crate) stats: Stats,
}

impl Heap {
  /// Acquires a region in the reference configuration and lays out the
  /// initial heap.
  pub fn initialize() -> Result<Self, Error> {
    Self::with_config(HeapConfig::default())
  }

  pub fn with_config(config: HeapConfig) -> Result<Self, Error> {
    config.validate()?;
    let region = Region::acquire(config.capacity)?;
    let mut heap = Self {
      region,
      stats: Stats::default(),
    };
    heap.reset();
    Ok(heap)
  }

  /// Restores the single-free-block layout in place and clears the
  /// statistics. Outstanding payloads become invalid.
  pub fn reset(&mut self) {
    let epilogue = self.epilogue_offset();
    let bytes = self.region.bytes_mut();
    tag::write_boundaries(bytes, 0, Tag::free(epilogue, true));
    tag::write_boundaries(bytes, epilogue, Tag::new(HEAP_ALIGN, false, true));
    self.stats = Stats::new(epilogue);
    log::debug!("heap reset: {epilogue} bytes available");
  }

  /// Returns the region to the host.
  pub fn deinitialize(self) -> Result<(), Error> {
    log::debug!("heap deinitialized: {}", self.stats);
    self.region.release()
  }

  pub fn capacity(&self) -> usize {
    self.region.len()
  }

  pub fn stats(&self) -> &Stats {
    &self.stats
  }

  pub(crate) fn epilogue_offset(&self) -> usize {
    self.capacity() - HEAP_ALIGN
  }

  pub(crate) fn bytes(&self) -> &[u8] {
    self.region.bytes()
  }

  pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
    self.region.bytes_mut()
  }

  pub(crate) fn tag_at(
    &self,
    offset: usize,
  ) -> Tag {
    tag::read_tag(self.bytes(), offset)
  }

  /// The epilogue's current tag.
  pub fn epilogue(&self) -> Block {
    let offset = self.epilogue_offset();
    Block {
      offset,
      tag: self.tag_at(offset),
    }
  }

  /// Walks the real blocks in address order, stopping before the epilogue.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      heap: self,
      cursor: 0,
    }
  }

  /// Finds the block starting exactly at `offset` by walking from the heap
  /// start. Only real block boundaries qualify.
  pub(crate) fn locate(
    &self,
    offset: usize,
  ) -> Option<Block> {
    self
      .blocks()
      .take_while(|block| block.offset <= offset)
      .find(|block| block.offset == offset)
  }

  fn live_block(
    &self,
    payload: Payload,
  ) -> Option<Block> {
    let block = self.locate(payload.header()?)?;
    block.is_allocated().then_some(block)
  }

  /// Payload bytes of a live allocation. Padding is included, so the slice
  /// may be slightly longer than what was requested.
  pub fn payload(
    &self,
    payload: Payload,
  ) -> Option<&[u8]> {
    let block = self.live_block(payload)?;
    Some(&self.bytes()[payload.offset()..block.offset + block.length()])
  }

  pub fn payload_mut(
    &mut self,
    payload: Payload,
  ) -> Option<&mut [u8]> {
    let block = self.live_block(payload)?;
    Some(&mut self.bytes_mut()[payload.offset()..block.offset + block.length()])
  }

  /// Raw address of a live allocation's payload.
  pub fn payload_ptr(
    &mut self,
    payload: Payload,
  ) -> Option<NonNull<u8>> {
    self.payload_mut(payload).map(|bytes| NonNull::from(bytes).cast())
  }

  pub fn dump(&self) -> HeapDump<'_> {
    HeapDump { heap: self }
  }
}

impl fmt::Debug for Heap {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Heap")
      .field("base", &self.region.base())
      .field("capacity", &self.capacity())
      .field("stats", &self.stats)
      .finish_non_exhaustive()
  }
}

/// Iterator returned by [`Heap::blocks`].
pub struct Blocks<'a> {
  heap: &'a Heap,
  cursor: usize,
}

impl Iterator for Blocks<'_> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    if self.cursor >= self.heap.epilogue_offset() {
      return None;
    }

    let block = Block {
      offset: self.cursor,
      tag: self.heap.tag_at(self.cursor),
    };
    // A zero length would never advance; only a corrupted heap has one.
    self.cursor = match block.length() {
      0 => usize::MAX,
      length => self.cursor + length,
    };
    Some(block)
  }
}

/// Block-by-block listing of a heap, see [`Heap::dump`].
pub struct HeapDump<'a> {
  heap: &'a Heap,
}

impl HeapDump<'_> {
  fn line(
    f: &mut fmt::Formatter<'_>,
    index: usize,
    block: &Block,
  ) -> fmt::Result {
    writeln!(
      f,
      "[{index:3}] {:#06x} | length={:04} | {} | p_alloc={}",
      block.offset,
      block.length(),
      if block.is_allocated() { "alloc" } else { "free " },
      u8::from(block.tag.prev_allocated()),
    )
  }
}

impl fmt::Display for HeapDump<'_> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(f, "==================== HEAPDUMP =====================")?;
    let mut count = 0;
    for (index, block) in self.heap.blocks().enumerate() {
      Self::line(f, index, &block)?;
      count = index + 1;
    }
    writeln!(f, "==================== EPILOGUE =====================")?;
    Self::line(f, count, &self.heap.epilogue())?;
    writeln!(f, "===================================================")
  }
}
