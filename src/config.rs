use snafu::ensure;

use crate::error::{Error, InvalidConfigSnafu};

/// Capacity of the heap region in the reference configuration.
pub const HEAP_SIZE: usize = 4096;

/// Every block length is a multiple of this. Also the epilogue length.
pub const HEAP_ALIGN: usize = 8;

/// Width of an encoded boundary tag in bytes.
pub const TAG_SIZE: usize = size_of::<crate::tag::RawTag>();

/// Smallest free block: a header and a footer, rounded to the alignment unit.
pub const MIN_BLOCK_SIZE: usize = align!(2 * TAG_SIZE);

/// Largest length the tag's length field can hold (14 bits).
pub const MAX_BLOCK_LENGTH: usize = (crate::tag::RawTag::MAX >> 2) as usize;

/// Largest heap capacity whose initial free block still fits in a tag.
pub const MAX_HEAP_SIZE: usize = (MAX_BLOCK_LENGTH + 1) & !(HEAP_ALIGN - 1);

/// Heap parameters chosen at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Total size of the region, epilogue included.
  pub capacity: usize,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      capacity: HEAP_SIZE,
    }
  }
}

impl HeapConfig {
  pub fn with_capacity(capacity: usize) -> Self {
    Self { capacity }
  }

  pub fn validate(&self) -> Result<(), Error> {
    let capacity = self.capacity;
    ensure!(
      capacity % HEAP_ALIGN == 0,
      InvalidConfigSnafu {
        capacity,
        reason: "not a multiple of the alignment unit",
      }
    );
    ensure!(
      capacity >= HEAP_ALIGN + MIN_BLOCK_SIZE,
      InvalidConfigSnafu {
        capacity,
        reason: "too small for one free block and the epilogue",
      }
    );
    ensure!(
      capacity <= MAX_HEAP_SIZE,
      InvalidConfigSnafu {
        capacity,
        reason: "larger than a boundary tag can describe",
      }
    );
    Ok(())
  }
}
