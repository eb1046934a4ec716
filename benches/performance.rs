//! Performance benchmarks for the content store.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use snipvault::{EntryId, EntryInput, PageQuery, Store, StoreConfig};
use tempfile::TempDir;

fn create_store(dir: &TempDir, head_cache_size: usize) -> Store {
    Store::create(StoreConfig {
        path: dir.path().join("store"),
        head_cache_size,
        ..Default::default()
    })
    .unwrap()
}

fn populate(store: &Store, count: usize) {
    for i in 0..count {
        let body = format!("// snippet {}\nfn f{}() {{}}\n", i, i).repeat(20);
        store
            .create_entry_from_bytes(EntryInput::new("Rust", "127.0.0.1"), body.as_bytes())
            .unwrap();
    }
}

/// Create cost grows with the index, since every create rewrites it.
fn bench_create_entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_entry");
    group.sample_size(20);

    for existing in [0, 1_000, 5_000] {
        group.bench_with_input(
            BenchmarkId::new("existing_entries", existing),
            &existing,
            |b, &existing| {
                let dir = TempDir::new().unwrap();
                let store = create_store(&dir, 0);
                populate(&store, existing);

                b.iter(|| {
                    black_box(
                        store
                            .create_entry_from_bytes(
                                EntryInput::new("Rust", "127.0.0.1"),
                                b"fn main() {}\n",
                            )
                            .unwrap(),
                    );
                });
            },
        );
    }

    group.finish();
}

/// A listing page: one page query plus a head preview per entry.
fn bench_listing_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("listing_page");

    for cache in [0, 256] {
        group.bench_with_input(BenchmarkId::new("head_cache", cache), &cache, |b, &cache| {
            let dir = TempDir::new().unwrap();
            let store = create_store(&dir, cache);
            populate(&store, 500);

            b.iter(|| {
                let page = store.page(PageQuery::Latest, 15);
                for entry in &page.entries {
                    black_box(store.head(entry.id).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Deep pagination against a sparse id range.
fn bench_entries_before(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = create_store(&dir, 0);
    populate(&store, 2_000);
    for id in (0..2_000).filter(|id| id % 4 != 0) {
        let entry = store.entry(EntryId(id)).unwrap();
        store.delete_entry(&entry).unwrap();
    }

    c.bench_function("entries_before_sparse", |b| {
        b.iter(|| black_box(store.entries_before(EntryId(1_000), 15)));
    });
}

fn bench_open_entry(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = create_store(&dir, 0);
    populate(&store, 200);
    let token = store.entry(EntryId(100)).unwrap().share_id;

    c.bench_function("read_entry", |b| {
        b.iter(|| black_box(store.read_entry(&token).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_create_entry,
    bench_listing_page,
    bench_entries_before,
    bench_open_entry
);
criterion_main!(benches);
