use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tagheap::Heap;

fn allocate_free_cycle(c: &mut Criterion) {
  let mut group = c.benchmark_group("allocate_free");

  for size in [16, 256, 4096] {
    group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
      let mut heap = Heap::new().unwrap();

      b.iter(|| {
        let bp = heap.allocate(black_box(size)).unwrap();
        heap.free(bp);
      });
    });
  }

  group.finish();
}

fn first_fit_scan(c: &mut Criterion) {
  let mut group = c.benchmark_group("first_fit_scan");

  for live in [16, 256, 1024] {
    group.bench_with_input(BenchmarkId::from_parameter(live), &live, |b, &live| {
      let mut heap = Heap::new().unwrap();
      // Small allocated blocks in front of the free space lengthen every scan.
      for _ in 0..live {
        heap.allocate(24).unwrap();
      }

      b.iter(|| {
        let bp = heap.allocate(black_box(512)).unwrap();
        heap.free(bp);
      });
    });
  }

  group.finish();
}

fn resize_growth(c: &mut Criterion) {
  c.bench_function("resize_doubling", |b| {
    b.iter(|| {
      let mut heap = Heap::new().unwrap();
      let mut bp = heap.allocate(8).unwrap();
      let mut size = 8;

      while size < 64 * 1024 {
        size *= 2;
        bp = heap.resize(bp, size).unwrap();
      }

      black_box(bp)
    });
  });
}

criterion_group!(benches, allocate_free_cycle, first_fit_scan, resize_growth);
criterion_main!(benches);
