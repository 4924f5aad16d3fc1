use snafu::{Report, ensure};

use crate::{
  HEAP_ALIGN, TAG_SIZE,
  error::{
    AdjacentFreeSnafu, EpilogueCorruptedSnafu, FooterMismatchSnafu, MisalignedSnafu, OverrunSnafu,
    PrevAllocatedMismatchSnafu, Violation, ZeroLengthSnafu,
  },
  heap::Heap,
  tag,
};

impl Heap {
  /// Walks the whole heap and verifies every structural invariant.
  ///
  /// The walk reads raw tags itself instead of going through [`Heap::blocks`],
  /// so it shares nothing with the code it is checking beyond the codec.
  pub fn check(&self) -> Result<(), Violation> {
    let bytes = self.bytes();
    let epilogue = self.epilogue_offset();
    let mut offset = 0;
    // The heap start behaves as if preceded by an allocated block.
    let mut prev_allocated = true;

    while offset < epilogue {
      let raw = tag::read_raw(bytes, offset);
      let tag = tag::Tag::decode(raw);
      let length = tag.length();

      ensure!(length != 0, ZeroLengthSnafu { offset });
      ensure!(length % HEAP_ALIGN == 0, MisalignedSnafu { offset, length });
      ensure!(offset + length <= epilogue, OverrunSnafu { offset, length });
      ensure!(
        tag.prev_allocated() == prev_allocated,
        PrevAllocatedMismatchSnafu {
          offset,
          recorded: tag.prev_allocated(),
          actual: prev_allocated,
        }
      );

      if !tag.allocated() {
        let footer = tag::read_raw(bytes, offset + length - TAG_SIZE);
        ensure!(
          footer == raw,
          FooterMismatchSnafu {
            offset,
            header: raw,
            footer,
          }
        );
        ensure!(prev_allocated, AdjacentFreeSnafu { offset });
      }

      prev_allocated = tag.allocated();
      offset += length;
    }

    let tag = tag::read_tag(bytes, epilogue);
    ensure!(
      tag.length() == HEAP_ALIGN && tag.allocated(),
      EpilogueCorruptedSnafu {
        length: tag.length(),
        allocated: tag.allocated(),
      }
    );
    ensure!(
      tag.prev_allocated() == prev_allocated,
      PrevAllocatedMismatchSnafu {
        offset: epilogue,
        recorded: tag.prev_allocated(),
        actual: prev_allocated,
      }
    );
    Ok(())
  }

  /// Runs [`Heap::check`] and panics on any violation. A violation means the
  /// allocator itself is broken, so there is nothing sensible to continue
  /// with.
  #[track_caller]
  pub fn assert_consistent(&self) {
    if let Err(violation) = self.check() {
      log::error!("heap integrity violated: {violation}\n{}", self.dump());
      panic!("heap integrity violated\n\n{}", Report::from_error(violation));
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    HEAP_ALIGN, HEAP_SIZE, Heap, TAG_SIZE, Violation,
    tag::{self, Tag},
  };

  fn heap_with_three_blocks() -> Heap {
    let mut heap = Heap::initialize().unwrap();
    for _ in 0..3 {
      heap.allocate(30).unwrap();
    }
    heap
  }

  #[test]
  fn test_fresh_heap_passes() {
    let heap = Heap::initialize().unwrap();
    assert_eq!(heap.check(), Ok(()));
    heap.assert_consistent();
  }

  #[test]
  fn test_zero_length() {
    let mut heap = heap_with_three_blocks();
    tag::write_header(heap.bytes_mut(), 32, Tag::new(0, true, true));
    assert_eq!(heap.check(), Err(Violation::ZeroLength { offset: 32 }));
  }

  #[test]
  fn test_misaligned_length() {
    let mut heap = heap_with_three_blocks();
    tag::write_header(heap.bytes_mut(), 32, Tag::new(30, true, true));
    assert_eq!(
      heap.check(),
      Err(Violation::Misaligned {
        offset: 32,
        length: 30
      })
    );
  }

  #[test]
  fn test_overrun() {
    let mut heap = heap_with_three_blocks();
    tag::write_header(heap.bytes_mut(), 96, Tag::new(HEAP_SIZE, true, true));
    assert_eq!(
      heap.check(),
      Err(Violation::Overrun {
        offset: 96,
        length: HEAP_SIZE
      })
    );
  }

  #[test]
  fn test_prev_allocated_mismatch() {
    let mut heap = heap_with_three_blocks();
    tag::write_header(heap.bytes_mut(), 32, Tag::new(32, false, true));
    assert_eq!(
      heap.check(),
      Err(Violation::PrevAllocatedMismatch {
        offset: 32,
        recorded: false,
        actual: true
      })
    );
  }

  #[test]
  fn test_footer_mismatch() {
    let mut heap = heap_with_three_blocks();
    let end = HEAP_SIZE - HEAP_ALIGN;
    heap.bytes_mut()[end - TAG_SIZE] ^= 0xFF;
    assert!(matches!(
      heap.check(),
      Err(Violation::FooterMismatch { offset: 96, .. })
    ));
  }

  #[test]
  fn test_adjacent_free() {
    let mut heap = heap_with_three_blocks();
    // Free two neighbours by hand, skipping coalescing.
    let bytes = heap.bytes_mut();
    tag::write_boundaries(bytes, 0, Tag::free(32, true));
    tag::write_boundaries(bytes, 32, Tag::free(32, false));
    tag::write_header(bytes, 64, Tag::new(32, false, true));
    assert_eq!(heap.check(), Err(Violation::AdjacentFree { offset: 32 }));
  }

  #[test]
  fn test_epilogue_corrupted() {
    let mut heap = Heap::initialize().unwrap();
    tag::write_header(heap.bytes_mut(), HEAP_SIZE - HEAP_ALIGN, Tag::new(HEAP_ALIGN, false, false));
    assert_eq!(
      heap.check(),
      Err(Violation::EpilogueCorrupted {
        length: HEAP_ALIGN,
        allocated: false
      })
    );
  }

  #[test]
  #[should_panic(expected = "heap integrity violated")]
  fn test_assert_consistent_panics() {
    let mut heap = heap_with_three_blocks();
    tag::write_header(heap.bytes_mut(), 0, Tag::new(0, true, true));
    heap.assert_consistent();
  }
}
