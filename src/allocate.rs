use crate::{
  MIN_BLOCK_SIZE, TAG_SIZE,
  heap::{Block, Heap, Payload},
  tag::{self, Tag},
};

impl Heap {
  /// First-fit allocation of `length` payload bytes.
  ///
  /// Returns `None` for a zero-length request or when no free block is large
  /// enough; neither case touches the heap.
  pub fn allocate(
    &mut self,
    length: usize,
  ) -> Option<Payload> {
    if length == 0 {
      return None;
    }
    if length > self.capacity() {
      log::trace!("allocate({length}) -> none, larger than the heap");
      return None;
    }

    let required = align!(length + TAG_SIZE);
    let Some(block) = self
      .blocks()
      .find(|block| !block.is_allocated() && block.length() >= required)
    else {
      log::trace!("allocate({length}) -> none, no free block of {required} bytes");
      return None;
    };

    let allocated = if block.length() - required < MIN_BLOCK_SIZE {
      self.claim_whole(block)
    } else {
      self.split(block, required)
    };

    self.stats.available -= allocated.length();
    self.stats.allocations += 1;
    log::trace!(
      "allocate({length}) -> {:#06x}, block of {}",
      block.offset,
      allocated.length()
    );
    Some(Payload::of_block(block.offset))
  }

  /// Marks the whole free block allocated. Its end does not move, so the
  /// successor only needs its `prev_allocated` bit flipped.
  fn claim_whole(
    &mut self,
    block: Block,
  ) -> Tag {
    let allocated = block.tag.with_allocated(true);
    let next = block.offset + allocated.length();
    let next_tag = self.tag_at(next).with_prev_allocated(true);

    let bytes = self.bytes_mut();
    tag::write_boundaries(bytes, block.offset, allocated);
    tag::write_boundaries(bytes, next, next_tag);
    allocated
  }

  /// Carves `required` bytes off the front of a free block. The remainder
  /// stays free and keeps the original far boundary, so the block after it is
  /// unaffected.
  fn split(
    &mut self,
    block: Block,
    required: usize,
  ) -> Tag {
    let allocated = Tag::new(required, block.tag.prev_allocated(), true);
    let remainder = Tag::free(block.length() - required, true);

    let bytes = self.bytes_mut();
    tag::write_boundaries(bytes, block.offset + required, remainder);
    tag::write_boundaries(bytes, block.offset, allocated);
    allocated
  }
}
