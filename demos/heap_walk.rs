use std::{env, io::Read};

use tagheap::{BlockPtr, Heap, HeapConfig, MemorySource, MmapSource};

/// Waits until the user presses ENTER, unless `--batch` was passed.
/// Useful when you want to follow the heap walk one step at a time.
fn block_until_enter_pressed(batch: bool) {
  if batch {
    return;
  }
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_alloc<S: MemorySource>(
  heap: &Heap<S>,
  requested: usize,
  bp: BlockPtr,
) {
  println!(
    "Allocated {} bytes at {} (payload capacity = {}, heap size = {})",
    requested,
    bp,
    heap.payload_size(bp),
    heap.heap_size()
  );
}

fn walk<S: MemorySource>(heap: &Heap<S>) {
  let report = heap.check_heap(true);

  for block in &report.blocks {
    println!("  {block}");
  }
  for fault in &report.faults {
    println!("  !! {fault}");
  }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let batch = env::args().any(|arg| arg == "--batch");
  let config = HeapConfig::from_env()?;
  let mut heap = Heap::init(MmapSource::reserve(config.max_heap)?, config)?;

  println!("[start] heap size = {}", heap.heap_size());
  walk(&heap);
  block_until_enter_pressed(batch);

  // --------------------------------------------------------------------
  // 1) Two allocations carved from the initial chunk.
  // --------------------------------------------------------------------
  let first = heap.allocate(100)?;
  print_alloc(&heap, 100, first);
  let second = heap.allocate(200)?;
  print_alloc(&heap, 200, second);

  heap.payload_mut(first)[..4].copy_from_slice(&0xDEADBEEFu32.to_ne_bytes());
  walk(&heap);
  block_until_enter_pressed(batch);

  // --------------------------------------------------------------------
  // 2) Free the first block, then ask for less: first fit reuses the hole.
  // --------------------------------------------------------------------
  heap.free(first);
  let third = heap.allocate(50)?;
  print_alloc(&heap, 50, third);
  println!(
    "[2] third == first? {}",
    if third == first {
      "Yes, it reused the freed block"
    } else {
      "No, it allocated somewhere else"
    }
  );
  walk(&heap);
  block_until_enter_pressed(batch);

  // --------------------------------------------------------------------
  // 3) Grow the second block. Its bytes move to a new block.
  // --------------------------------------------------------------------
  heap.payload_mut(second)[..12].copy_from_slice(b"hello, heap!");
  let second = heap.resize(second, 1000)?;
  println!(
    "[3] resized to {}, prefix = {:?}",
    second,
    String::from_utf8_lossy(&heap.payload(second)[..12])
  );
  walk(&heap);
  block_until_enter_pressed(batch);

  // --------------------------------------------------------------------
  // 4) A request larger than the chunk size grows the heap.
  // --------------------------------------------------------------------
  let before = heap.heap_size();
  let big = heap.allocate(64 * 1024)?;
  print_alloc(&heap, 64 * 1024, big);
  println!("[4] heap grew from {} to {} bytes", before, heap.heap_size());
  block_until_enter_pressed(batch);

  // --------------------------------------------------------------------
  // 5) Free everything; the heap collapses back into one free block.
  // --------------------------------------------------------------------
  for bp in [third, second, big] {
    heap.free(bp);
  }
  walk(&heap);

  println!("\n[5] End of example. The mapping is released when the heap is dropped.");

  Ok(())
}
