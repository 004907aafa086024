//! Buffer pool and B+tree throughput benchmarks.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ministore::common::{IndexId, PageId, RowId};
use ministore::index::{ensure_index_roots_page, BPlusTree, BytewiseComparator};
use ministore::storage::DiskManager;
use ministore::BufferPoolManager;
use tempfile::TempDir;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("bench.db")).unwrap();
    (BufferPoolManager::new(pool_size, dm), dir)
}

/// Fetches that always hit a cached frame.
fn bench_fetch_hit(c: &mut Criterion) {
    let (bpm, _dir) = create_bpm(64);
    let pages: Vec<PageId> = (0..32).map(|_| bpm.new_page().unwrap().page_id()).collect();

    c.bench_function("fetch_read_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            let guard = bpm.fetch_page_read(pages[i % pages.len()]).unwrap();
            black_box(guard.as_slice()[0]);
            i += 1;
        })
    });
}

/// A cyclic scan over more pages than frames, so LRU evicts on every fetch.
fn bench_fetch_evicting(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_read_evicting");
    for pool_size in [8usize, 32] {
        let (bpm, _dir) = create_bpm(pool_size);
        let pages: Vec<PageId> = (0..pool_size * 2)
            .map(|_| bpm.new_page().unwrap().page_id())
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(pool_size), &pages, |b, pages| {
            let mut i = 0;
            b.iter(|| {
                let guard = bpm.fetch_page_read(pages[i % pages.len()]).unwrap();
                black_box(guard.as_slice()[0]);
                i += 1;
            })
        });
    }
    group.finish();
}

fn bench_btree(c: &mut Criterion) {
    let (bpm, _dir) = create_bpm(256);
    let bpm = Arc::new(bpm);
    ensure_index_roots_page(&bpm).unwrap();
    let mut tree =
        BPlusTree::new(IndexId(0), bpm, Arc::new(BytewiseComparator), 8, None, None).unwrap();
    for n in 0u64..10_000 {
        tree.insert(&n.to_be_bytes(), RowId::new(PageId::new(1), n as u32))
            .unwrap();
    }

    c.bench_function("btree_get_value", |b| {
        let mut n = 0u64;
        b.iter(|| {
            black_box(tree.get_value(&(n % 10_000).to_be_bytes()).unwrap());
            n = n.wrapping_add(7919);
        })
    });

    c.bench_function("btree_scan_1000", |b| {
        b.iter(|| black_box(tree.begin_at(&5_000u64.to_be_bytes()).unwrap().take(1000).count()))
    });
}

criterion_group!(benches, bench_fetch_hit, bench_fetch_evicting, bench_btree);
criterion_main!(benches);
