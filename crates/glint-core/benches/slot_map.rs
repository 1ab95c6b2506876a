//! Benchmarks for the generational SlotMap

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use glint_core::alloc::{SlotKey, SlotMap};

#[derive(Clone, Copy, Debug, Default)]
struct TextureRecord {
    width: u32,
    height: u32,
    handle: u32,
}

fn bench_slot_map_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_map_insert");

    for size in [10, 100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut map = SlotMap::new();
                for i in 0..size {
                    map.insert(black_box(TextureRecord {
                        width: i,
                        height: i,
                        handle: i,
                    }));
                }
                map
            });
        });
    }

    group.finish();
}

fn bench_slot_map_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_map_lookup");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        let mut map = SlotMap::new();
        let keys: Vec<SlotKey> = (0..size).map(|_| map.insert(TextureRecord::default())).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0u64;
                for &key in &keys {
                    if let Some(record) = map.get(black_box(key)) {
                        sum += record.width as u64 + record.height as u64 + record.handle as u64;
                    }
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn bench_slot_map_churn(c: &mut Criterion) {
    c.bench_function("slot_map_churn_1000", |b| {
        let mut map = SlotMap::new();
        b.iter(|| {
            let keys: Vec<SlotKey> = (0..1000).map(|_| map.insert(TextureRecord::default())).collect();
            for key in keys {
                black_box(map.remove(key));
            }
        });
    });
}

criterion_group!(benches, bench_slot_map_insert, bench_slot_map_lookup, bench_slot_map_churn);
criterion_main!(benches);
