use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use tagalloc::{Coalesce, FreeError, HEAP_ALIGN, HEAP_SIZE, Heap, Payload, Tag};

const USABLE: usize = HEAP_SIZE - HEAP_ALIGN;

fn assert_initial_layout(heap: &Heap) {
  let blocks: Vec<_> = heap.blocks().collect();
  assert_eq!(blocks.len(), 1);
  assert_eq!(blocks[0].tag, Tag::free(USABLE, true));
  assert_eq!(heap.epilogue().tag, Tag::new(HEAP_ALIGN, false, true));
  assert_eq!(heap.stats().available, USABLE);
}

/// Four blocks of 1016 bytes and one of 24 fill the heap exactly.
fn fill_exactly(heap: &mut Heap) -> Vec<Payload> {
  let mut ptrs: Vec<_> = (0..4).map(|_| heap.allocate(1014).unwrap()).collect();
  ptrs.push(heap.allocate(22).unwrap());
  ptrs
}

#[test]
fn test_allocate_minimal_blocks_then_free_all() {
  let mut heap = Heap::initialize().unwrap();
  let blocks = USABLE / 8;

  let ptrs: Vec<_> = (0..blocks).map(|_| heap.allocate(1).unwrap()).collect();
  assert_eq!(heap.stats().allocations, blocks);
  assert_eq!(heap.allocate(1), None);

  for p in &ptrs {
    heap.deallocate(Some(*p)).unwrap();
  }
  assert_eq!(heap.stats().deallocations, blocks);
  assert_initial_layout(&heap);
  heap.deinitialize().unwrap();
}

#[test]
fn test_exhaustion_and_left_coalesce_chain() {
  let mut heap = Heap::initialize().unwrap();
  let ptrs = fill_exactly(&mut heap);

  let lengths: Vec<_> = heap.blocks().map(|block| block.length()).collect();
  assert_eq!(lengths, [1016, 1016, 1016, 1016, 24]);
  assert_eq!(heap.stats().available, 0);
  assert_eq!(heap.allocate(1), None);

  heap.deallocate(Some(ptrs[0])).unwrap();
  for (i, p) in ptrs[1..].iter().enumerate() {
    assert_eq!(heap.deallocate(Some(*p)), Ok(Coalesce::Left));
    assert_eq!(heap.stats().left_coalesce, i + 1);
    heap.assert_consistent();
  }

  assert_eq!(heap.stats().left_coalesce, 4);
  assert_eq!(heap.stats().right_coalesce, 0);
  assert_initial_layout(&heap);
}

#[test]
fn test_right_coalesce_chain() {
  let mut heap = Heap::initialize().unwrap();
  let ptrs = fill_exactly(&mut heap);

  heap.deallocate(Some(ptrs[4])).unwrap();
  for (i, p) in ptrs[..4].iter().rev().enumerate() {
    assert_eq!(heap.deallocate(Some(*p)), Ok(Coalesce::Right));
    assert_eq!(heap.stats().right_coalesce, i + 1);
  }

  assert_eq!(heap.stats().right_coalesce, 4);
  assert_initial_layout(&heap);
}

#[test]
fn test_left_right_coalesce() {
  let mut heap = Heap::initialize().unwrap();
  let p1 = heap.allocate(1358).unwrap();
  let p2 = heap.allocate(1358).unwrap();
  let p3 = heap.allocate(1366).unwrap();
  assert_eq!(heap.stats().available, 0);

  heap.deallocate(Some(p1)).unwrap();
  heap.deallocate(Some(p3)).unwrap();
  assert_eq!(heap.deallocate(Some(p2)), Ok(Coalesce::Both));

  assert_eq!(heap.stats().left_right_coalesce, 1);
  assert_eq!(heap.stats().left_coalesce, 0);
  assert_eq!(heap.stats().right_coalesce, 0);
  assert_initial_layout(&heap);
}

#[test]
fn test_reset_between_scenarios() {
  let mut heap = Heap::initialize().unwrap();
  fill_exactly(&mut heap);
  heap.reset();
  assert_initial_layout(&heap);
  assert_eq!(heap.stats().allocations, 0);

  let ptrs = fill_exactly(&mut heap);
  assert_eq!(ptrs.len(), 5);
  heap.deinitialize().unwrap();
}

#[test]
fn test_double_free_is_idempotent() {
  let mut heap = Heap::initialize().unwrap();
  let a = heap.allocate(40).unwrap();
  let _b = heap.allocate(40).unwrap();

  heap.deallocate(Some(a)).unwrap();
  let stats = *heap.stats();
  assert!(matches!(heap.deallocate(Some(a)), Err(FreeError::AlreadyFree { .. })));
  assert_eq!(*heap.stats(), stats);
  heap.assert_consistent();
}

#[test]
fn test_round_trip_and_no_overlap() {
  let mut heap = Heap::initialize().unwrap();
  let mut live = Vec::new();
  for i in 0..40u8 {
    let p = heap.allocate(usize::from(i) % 50 + 1).unwrap();
    heap.payload_mut(p).unwrap().fill(i);
    live.push((p, i));
  }

  for (p, value) in &live {
    assert!(heap.payload(*p).unwrap().iter().all(|b| b == value));
  }

  let mut ranges: Vec<_> = live
    .iter()
    .map(|(p, _)| (p.offset(), p.offset() + heap.payload(*p).unwrap().len()))
    .collect();
  ranges.sort_unstable();
  for pair in ranges.windows(2) {
    assert!(pair[0].1 <= pair[1].0, "{:?} overlaps {:?}", pair[0], pair[1]);
  }
}

fn assert_conservation(
  heap: &Heap,
  live: &[Payload],
) {
  let stats = heap.stats();
  assert_eq!(stats.live(), live.len());

  let allocated: usize = heap
    .blocks()
    .filter(|block| block.is_allocated())
    .map(|block| block.length())
    .sum();
  assert_eq!(stats.available + allocated, USABLE);
}

#[test]
fn test_randomized_stress() {
  let mut heap = Heap::initialize().unwrap();
  let mut rng = StdRng::seed_from_u64(0x5EED);
  let mut live: Vec<Payload> = Vec::new();

  for _ in 0..20_000 {
    if live.is_empty() || rng.random_bool(0.5) {
      let length = rng.random_range(1..=256);
      if let Some(p) = heap.allocate(length) {
        heap.payload_mut(p).unwrap()[0] = length as u8;
        live.push(p);
      }
    } else {
      let p = live.swap_remove(rng.random_range(0..live.len()));
      heap.deallocate(Some(p)).unwrap();
    }
    heap.assert_consistent();
    assert_conservation(&heap, &live);
  }

  live.shuffle(&mut rng);
  for p in live.drain(..) {
    heap.deallocate(Some(p)).unwrap();
    heap.assert_consistent();
  }
  assert_initial_layout(&heap);
}

#[test]
fn test_full_reclaim_in_random_order() {
  let mut heap = Heap::initialize().unwrap();
  let mut rng = StdRng::seed_from_u64(7);

  for _ in 0..20 {
    let mut live = Vec::new();
    while let Some(p) = heap.allocate(rng.random_range(1..=128)) {
      live.push(p);
    }
    live.shuffle(&mut rng);
    for p in live {
      heap.deallocate(Some(p)).unwrap();
    }
    heap.assert_consistent();
    assert_eq!(heap.blocks().count(), 1);
    assert_eq!(heap.blocks().next().unwrap().tag, Tag::free(USABLE, true));
  }
}
