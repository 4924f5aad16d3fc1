//! Boundary tag codec.
//!
//! A tag packs the block length and two allocation flags into one `u16`:
//!
//! ```text
//!   15                              2     1     0
//!   ┌───────────────────────────────┬─────┬─────┐
//!   │            length             │  P  │  A  │
//!   └───────────────────────────────┴─────┴─────┘
//!     P = previous block allocated
//!     A = this block allocated
//! ```
//!
//! Tags are stored in native byte order at the first two bytes of a block
//! (header) and, for free blocks, at its last two bytes (footer).

use std::fmt;

use crate::config::{MAX_BLOCK_LENGTH, TAG_SIZE};

/// Encoded form of a [`Tag`] as it sits in the heap.
pub type RawTag = u16;

const PREV_ALLOCATED: RawTag = 0b10;
const ALLOCATED: RawTag = 0b01;

/// Decoded boundary tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
  length: u16,
  prev_allocated: bool,
  allocated: bool,
}

impl Tag {
  /// # Panics
  ///
  /// Panics if `length` does not fit the 14-bit length field.
  pub const fn new(
    length: usize,
    prev_allocated: bool,
    allocated: bool,
  ) -> Self {
    assert!(length <= MAX_BLOCK_LENGTH, "block length does not fit in a tag");
    Self {
      length: length as u16,
      prev_allocated,
      allocated,
    }
  }

  pub const fn free(
    length: usize,
    prev_allocated: bool,
  ) -> Self {
    Self::new(length, prev_allocated, false)
  }

  pub const fn decode(raw: RawTag) -> Self {
    Self {
      length: raw >> 2,
      prev_allocated: raw & PREV_ALLOCATED != 0,
      allocated: raw & ALLOCATED != 0,
    }
  }

  pub const fn encode(self) -> RawTag {
    let mut raw = self.length << 2;
    if self.prev_allocated {
      raw |= PREV_ALLOCATED;
    }
    if self.allocated {
      raw |= ALLOCATED;
    }
    raw
  }

  /// Whole block length, tags and padding included.
  pub const fn length(self) -> usize {
    self.length as usize
  }

  pub const fn prev_allocated(self) -> bool {
    self.prev_allocated
  }

  pub const fn allocated(self) -> bool {
    self.allocated
  }

  #[must_use]
  pub const fn with_length(
    self,
    length: usize,
  ) -> Self {
    Self::new(length, self.prev_allocated, self.allocated)
  }

  #[must_use]
  pub const fn with_prev_allocated(
    self,
    prev_allocated: bool,
  ) -> Self {
    Self {
      prev_allocated,
      ..self
    }
  }

  #[must_use]
  pub const fn with_allocated(
    self,
    allocated: bool,
  ) -> Self {
    Self { allocated, ..self }
  }
}

impl fmt::Debug for Tag {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Tag")
      .field("length", &self.length)
      .field("prev_allocated", &self.prev_allocated)
      .field("allocated", &self.allocated)
      .field("raw", &format_args!("{:#06x}", self.encode()))
      .finish()
  }
}

/// Reads the raw tag stored at `offset`.
///
/// Panics if the tag would extend past `heap`; every caller derives its
/// offsets from block lengths that keep it inside.
pub(crate) fn read_raw(
  heap: &[u8],
  offset: usize,
) -> RawTag {
  let mut bytes = [0; TAG_SIZE];
  bytes.copy_from_slice(&heap[offset..offset + TAG_SIZE]);
  RawTag::from_ne_bytes(bytes)
}

pub(crate) fn read_tag(
  heap: &[u8],
  offset: usize,
) -> Tag {
  Tag::decode(read_raw(heap, offset))
}

fn write_raw(
  heap: &mut [u8],
  offset: usize,
  raw: RawTag,
) {
  heap[offset..offset + TAG_SIZE].copy_from_slice(&raw.to_ne_bytes());
}

pub(crate) fn write_header(
  heap: &mut [u8],
  block: usize,
  tag: Tag,
) {
  write_raw(heap, block, tag.encode());
}

pub(crate) fn write_footer(
  heap: &mut [u8],
  block: usize,
  tag: Tag,
) {
  write_raw(heap, block + tag.length() - TAG_SIZE, tag.encode());
}

/// Writes the header, plus the footer when the block is free. Allocated
/// blocks never carry a footer.
pub(crate) fn write_boundaries(
  heap: &mut [u8],
  block: usize,
  tag: Tag,
) {
  write_header(heap, block, tag);
  if !tag.allocated() {
    write_footer(heap, block, tag);
  }
}
