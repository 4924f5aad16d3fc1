use snafu::{OptionExt, ensure};

use crate::{
  TAG_SIZE,
  error::{AlreadyFreeSnafu, EpilogueSnafu, FreeError, NotABlockSnafu, NullSnafu, OutOfBoundsSnafu},
  heap::{Block, Heap, Payload},
  tag::{self, Tag},
};

/// Which neighbours a freed block was merged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coalesce {
  None,
  Left,
  Right,
  Both,
}

impl Heap {
  /// Frees an allocation and merges it with any free neighbour.
  ///
  /// `None` stands for a null pointer. Misuse (null, the epilogue, something
  /// that is not a live block) is reported as an error and leaves the heap
  /// untouched.
  pub fn deallocate(
    &mut self,
    payload: Option<Payload>,
  ) -> Result<Coalesce, FreeError> {
    let block = self.validate_free(payload).inspect_err(|err| {
      if *err != FreeError::Null {
        log::warn!("ignoring deallocate: {err}");
      }
    })?;

    let next_offset = block.offset + block.length();
    let next = self.tag_at(next_offset);

    let (start, merged, kind) = match (block.tag.prev_allocated(), next.allocated()) {
      (true, true) => (block.offset, Tag::free(block.length(), true), Coalesce::None),
      (false, true) => {
        let prev = self.predecessor(block.offset);
        let merged = Tag::free(prev.length() + block.length(), prev.prev_allocated());
        (block.offset - prev.length(), merged, Coalesce::Left)
      }
      (true, false) => {
        let merged = Tag::free(block.length() + next.length(), true);
        (block.offset, merged, Coalesce::Right)
      }
      (false, false) => {
        let prev = self.predecessor(block.offset);
        let merged = Tag::free(
          prev.length() + block.length() + next.length(),
          prev.prev_allocated(),
        );
        (block.offset - prev.length(), merged, Coalesce::Both)
      }
    };

    let bytes = self.bytes_mut();
    tag::write_boundaries(bytes, start, merged);
    // When the right neighbour was absorbed the block after the merged one
    // already saw a free predecessor, so only the other two cases propagate.
    if next.allocated() {
      tag::write_boundaries(bytes, next_offset, next.with_prev_allocated(false));
    }

    match kind {
      Coalesce::None => {}
      Coalesce::Left => self.stats.left_coalesce += 1,
      Coalesce::Right => self.stats.right_coalesce += 1,
      Coalesce::Both => self.stats.left_right_coalesce += 1,
    }
    self.stats.deallocations += 1;
    self.stats.available += block.length();

    log::trace!(
      "deallocate({:#06x}) -> {kind:?}, free block of {} at {start:#06x}",
      block.offset,
      merged.length()
    );
    Ok(kind)
  }

  fn validate_free(
    &self,
    payload: Option<Payload>,
  ) -> Result<Block, FreeError> {
    let payload = payload.context(NullSnafu)?;
    let offset = payload.offset();
    let header = payload
      .header()
      .filter(|&header| header <= self.epilogue_offset())
      .context(OutOfBoundsSnafu { offset })?;
    ensure!(header != self.epilogue_offset(), EpilogueSnafu);

    let block = self.locate(header).context(NotABlockSnafu { offset })?;
    ensure!(block.is_allocated(), AlreadyFreeSnafu { offset });
    Ok(block)
  }

  /// Tag of the free block ending right before `block`, read from its footer.
  fn predecessor(
    &self,
    block: usize,
  ) -> Tag {
    self.tag_at(block - TAG_SIZE)
  }
}
