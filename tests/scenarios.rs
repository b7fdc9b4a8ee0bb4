use tagheap::{AllocError, BlockPtr, Heap, HeapConfig, MemorySource, MmapSource};

fn init_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}

/// Small deterministic generator so workloads are reproducible.
struct Lcg(u64);

impl Lcg {
  fn next(&mut self) -> u64 {
    self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    self.0 >> 33
  }

  fn below(
    &mut self,
    bound: u64,
  ) -> usize {
    (self.next() % bound) as usize
  }
}

fn assert_disjoint(live: &[(BlockPtr, usize)]) {
  let mut ranges: Vec<_> = live
    .iter()
    .map(|&(bp, size)| (bp.offset(), bp.offset() + size))
    .collect();
  ranges.sort();

  for pair in ranges.windows(2) {
    assert!(pair[0].1 <= pair[1].0, "payloads overlap: {:?} and {:?}", pair[0], pair[1]);
  }
}

fn run_workload<S: MemorySource>(
  heap: &mut Heap<S>,
  seed: u64,
) {
  let mut rng = Lcg(seed);
  let mut live: Vec<(BlockPtr, usize, u8)> = Vec::new();

  for step in 0..2000 {
    let op = rng.below(10);

    if live.is_empty() || op < 5 {
      let size = 1 + rng.below(2048);
      let bp = heap.allocate(size).unwrap();
      let fill = step as u8;

      assert_eq!(bp.offset() % 8, 0);
      assert!(heap.payload_size(bp) >= size);

      heap.payload_mut(bp)[..size].fill(fill);
      live.push((bp, size, fill));
    } else if op < 8 {
      let (bp, size, fill) = live.swap_remove(rng.below(live.len() as u64));

      assert!(heap.payload(bp)[..size].iter().all(|&byte| byte == fill));
      heap.free(bp);

      let report = heap.check_heap(false);
      assert!(report.is_ok(), "{:?}", report.faults);
    } else {
      let index = rng.below(live.len() as u64);
      let (bp, size, fill) = live[index];
      let new_size = 1 + rng.below(4096);

      let moved = heap.resize(bp, new_size).unwrap();
      let kept = size.min(new_size);

      assert!(heap.payload(moved)[..kept].iter().all(|&byte| byte == fill));
      heap.payload_mut(moved)[..new_size].fill(fill);
      live[index] = (moved, new_size, fill);
    }

    let sizes: Vec<_> = live.iter().map(|&(bp, size, _)| (bp, size)).collect();
    assert_disjoint(&sizes);
  }

  for (bp, _, _) in live {
    heap.free(bp);
  }

  let report = heap.check_heap(false);
  assert!(report.is_ok(), "{:?}", report.faults);
  assert_eq!(report.blocks.len(), 1);
  assert!(!report.blocks[0].header.allocated);
}

#[test]
fn first_fit_reuses_freed_region() {
  init_logger();
  let mut heap = Heap::new().unwrap();

  let first = heap.allocate(100).unwrap();
  heap.allocate(200).unwrap();
  heap.free(first);
  let size = heap.heap_size();

  let third = heap.allocate(50).unwrap();

  assert_eq!(third, first);
  assert_eq!(heap.heap_size(), size);
}

#[test]
fn freed_neighbours_coalesce_for_large_request() {
  let mut heap = Heap::new().unwrap();

  let first = heap.allocate(4000).unwrap();
  let second = heap.allocate(4000).unwrap();
  heap.free(first);
  heap.free(second);
  let size = heap.heap_size();

  let big = heap.allocate(7000).unwrap();

  assert_eq!(big, first);
  assert_eq!(heap.heap_size(), size);
  assert!(heap.check_heap(false).is_ok());
}

#[test]
fn zero_sized_allocation_fails_without_mutation() {
  let mut heap = Heap::new().unwrap();
  let before: Vec<_> = heap.blocks().collect();
  let size = heap.heap_size();

  assert_eq!(heap.allocate(0), Err(AllocError::InvalidSize));
  assert_eq!(heap.blocks().collect::<Vec<_>>(), before);
  assert_eq!(heap.heap_size(), size);
}

#[test]
fn repeated_cycles_do_not_grow_the_heap() {
  let mut heap = Heap::new().unwrap();

  for size in [8, 100, 3000, 9000] {
    let bp = heap.allocate(size).unwrap();
    heap.free(bp);
    let settled = heap.heap_size();

    for _ in 0..200 {
      let bp = heap.allocate(size).unwrap();
      heap.free(bp);
    }

    assert_eq!(heap.heap_size(), settled);
  }
}

#[test]
fn resize_preserves_prefix() {
  let mut heap = Heap::new().unwrap();
  let bp = heap.allocate(300).unwrap();
  let bytes: Vec<u8> = (0..300).map(|i| (i * 7) as u8).collect();
  heap.payload_mut(bp)[..300].copy_from_slice(&bytes);

  // Pin a block behind it so the resized block cannot land in place.
  let pin = heap.allocate(16).unwrap();
  let moved = heap.resize(bp, 5000).unwrap();

  assert_eq!(&heap.payload(moved)[..300], &bytes[..]);
  heap.free(pin);
  heap.free(moved);
  assert!(heap.check_heap(false).is_ok());
}

#[test]
fn exhaustion_is_reported_not_fatal() {
  let config = HeapConfig::default().with_max_heap(64 * 1024);
  let mut heap = Heap::with_config(config).unwrap();
  let mut live = Vec::new();

  let err = loop {
    match heap.allocate(1000) {
      Ok(bp) => live.push(bp),
      Err(err) => break err,
    }
  };

  assert!(matches!(err, AllocError::OutOfMemory { .. }));
  assert!(heap.check_heap(false).is_ok());

  // Space freed after exhaustion is usable again.
  heap.free(live[0]);
  assert_eq!(heap.allocate(1000), Ok(live[0]));
}

#[test]
fn random_workload_over_arena() {
  init_logger();
  let mut heap = Heap::new().unwrap();

  run_workload(&mut heap, 0x5eed);
}

#[test]
fn random_workload_over_mmap() {
  let config = HeapConfig::default();
  let mut heap = Heap::init(MmapSource::reserve(config.max_heap).unwrap(), config).unwrap();

  run_workload(&mut heap, 0xC0FFEE);

  let base = heap.source().base() as usize;
  let bp = heap.allocate(24).unwrap();
  assert_eq!((base + bp.offset()) % 8, 0);
}
