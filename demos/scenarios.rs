//! Runs the built-in validation scenarios against one heap, resetting it
//! between scenarios, and prints the heap after each one.

use log::{Level, LevelFilter, Log, Metadata, Record};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tagalloc::{Error, HEAP_ALIGN, HEAP_SIZE, Heap, Payload};

const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Prints every record to stderr as `[LEVEL] target: message`.
struct StderrLogger;

impl Log for StderrLogger {
  fn enabled(
    &self,
    metadata: &Metadata,
  ) -> bool {
    metadata.level() <= LOG_LEVEL
  }

  fn log(
    &self,
    record: &Record,
  ) {
    if self.enabled(record.metadata()) {
      let level = match record.level() {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
      };
      eprintln!("[{level}] {}: {}", record.target(), record.args());
    }
  }

  fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn fill_exactly(heap: &mut Heap) -> Vec<Payload> {
  // 4 * 1016 + 24 == 4096 - 8
  let mut ptrs: Vec<_> = (0..4).filter_map(|_| heap.allocate(1014)).collect();
  ptrs.extend(heap.allocate(22));
  assert_eq!(ptrs.len(), 5);
  assert_eq!(heap.allocate(1), None);
  ptrs
}

fn free_all(
  heap: &mut Heap,
  ptrs: impl IntoIterator<Item = Payload>,
) {
  for p in ptrs {
    heap.deallocate(Some(p)).expect("live pointer");
    heap.assert_consistent();
  }
}

fn minimal_blocks(heap: &mut Heap) {
  let blocks = (HEAP_SIZE - HEAP_ALIGN) / HEAP_ALIGN;
  let ptrs: Vec<_> = (0..blocks).filter_map(|_| heap.allocate(1)).collect();
  assert_eq!(ptrs.len(), blocks);
  free_all(heap, ptrs);
  assert_eq!(heap.stats().deallocations, blocks);
}

fn left_coalesce(heap: &mut Heap) {
  let ptrs = fill_exactly(heap);
  free_all(heap, ptrs);
  assert_eq!(heap.stats().left_coalesce, 4);
}

fn right_coalesce(heap: &mut Heap) {
  let ptrs = fill_exactly(heap);
  free_all(heap, ptrs.into_iter().rev());
  assert_eq!(heap.stats().right_coalesce, 4);
}

fn left_right_coalesce(heap: &mut Heap) {
  let ptrs: Vec<_> = [1358, 1358, 1366]
    .into_iter()
    .filter_map(|length| heap.allocate(length))
    .collect();
  assert_eq!(ptrs.len(), 3);
  free_all(heap, [ptrs[0], ptrs[2], ptrs[1]]);
  assert_eq!(heap.stats().left_right_coalesce, 1);
}

fn stress(heap: &mut Heap) {
  let mut rng = StdRng::seed_from_u64(0);
  let mut live = Vec::new();

  for _ in 0..200_000 {
    if live.is_empty() || rng.random_bool(0.5) {
      live.extend(heap.allocate(rng.random_range(1..=256)));
    } else {
      let p = live.swap_remove(rng.random_range(0..live.len()));
      heap.deallocate(Some(p)).expect("live pointer");
    }
    heap.assert_consistent();
  }

  log::info!("stress peak state: {}", heap.stats());
  free_all(heap, live);
}

#[snafu::report]
fn main() -> Result<(), Error> {
  log::set_logger(&LOGGER).expect("logger installed once");
  log::set_max_level(LOG_LEVEL);

  let mut heap = Heap::initialize()?;
  let scenarios: [(&str, fn(&mut Heap)); 5] = [
    ("minimal blocks", minimal_blocks),
    ("left coalesce", left_coalesce),
    ("right coalesce", right_coalesce),
    ("left-right coalesce", left_right_coalesce),
    ("stress", stress),
  ];

  for (name, scenario) in scenarios {
    scenario(&mut heap);
    heap.assert_consistent();
    log::info!("{name}: ok, {}", heap.stats());
    println!("{}", heap.dump());
    heap.reset();
  }

  heap.deinitialize()
}
