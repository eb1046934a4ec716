//! Concurrent access tests.
//!
//! Many writer and reader threads share one store handle, the way request
//! handlers in the serving layer do.

use snipvault::{Entry, EntryId, EntryInput, PageQuery, ShareToken, Store, StoreConfig};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const WRITERS: usize = 8;
const PER_WRITER: usize = 40;

fn test_store(dir: &TempDir) -> Store {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Store::create(StoreConfig {
        path: dir.path().join("store"),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_concurrent_creates_get_unique_dense_ids() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    let per_thread: Vec<Vec<Entry>> = thread::scope(|s| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|w| {
                let store = &store;
                s.spawn(move || {
                    (0..PER_WRITER)
                        .map(|i| {
                            let body = format!("writer {} snippet {}\n", w, i);
                            store
                                .create_entry_from_bytes(
                                    EntryInput::new("Plain Text", format!("10.0.0.{}", w)),
                                    body.as_bytes(),
                                )
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Each writer sees its own ids strictly increasing.
    for entries in &per_thread {
        assert!(entries.windows(2).all(|w| w[0].id < w[1].id));
    }

    // Across writers: no repeats, no gaps.
    let mut all: Vec<u64> = per_thread.iter().flatten().map(|e| e.id.0).collect();
    all.sort_unstable();
    let expected: Vec<u64> = (0..(WRITERS * PER_WRITER) as u64).collect();
    assert_eq!(all, expected);

    let tokens: HashSet<&ShareToken> = per_thread.iter().flatten().map(|e| &e.share_id).collect();
    assert_eq!(tokens.len(), WRITERS * PER_WRITER);

    // Every entry's content belongs to it.
    for entry in per_thread.iter().flatten() {
        let (_, content) = store.read_entry(&entry.share_id).unwrap();
        let text = String::from_utf8(content).unwrap();
        let writer = entry.poster_address.trim_start_matches("10.0.0.");
        assert!(text.starts_with(&format!("writer {} ", writer)));
    }
}

#[test]
fn test_readers_see_consistent_pages_during_writes() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(test_store(&dir));
    let done = Arc::new(AtomicBool::new(false));

    for i in 0..20 {
        store
            .create_entry_from_bytes(EntryInput::new("Go", "::1"), format!("{}\n", i).as_bytes())
            .unwrap();
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut pages = 0usize;
                while !done.load(Ordering::Acquire) {
                    let page = store.page(PageQuery::Latest, 15);
                    assert_eq!(page.entries.len(), 15);
                    assert!(page.entries.windows(2).all(|w| w[0].id < w[1].id));
                    assert!(page.has_older);
                    assert!(!page.has_newer);

                    for entry in &page.entries {
                        // Entries may be deleted between the page read and here.
                        match store.head(entry.id) {
                            Ok(head) => assert!(!head.is_empty()),
                            Err(e) => assert!(e.is_not_found()),
                        }
                    }
                    pages += 1;
                }
                pages
            })
        })
        .collect();

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..25 {
                    let entry = store
                        .create_entry_from_bytes(
                            EntryInput::new("Go", "::1"),
                            format!("w{} {}\n", w, i).as_bytes(),
                        )
                        .unwrap();
                    if i % 3 == 0 {
                        store.delete_entry(&entry).unwrap();
                    }
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().unwrap();
    }

    // 20 seeded + 4 writers x (25 created - 9 deleted).
    let stats = store.stats().unwrap();
    assert_eq!(stats.entry_count, 20 + 4 * 16);
    assert_eq!(stats.next_id, 20 + 4 * 25);
    assert_eq!(store.latest_entries(1000).len(), 84);
}

#[test]
fn test_concurrent_deletes_of_same_entry() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    let entry = store
        .create_entry_from_bytes(EntryInput::new("C", "::1"), b"int x;\n")
        .unwrap();

    let outcomes: Vec<bool> = thread::scope(|s| {
        let handles: Vec<_> = (0..6)
            .map(|_| s.spawn(|| store.delete_entry(&entry).is_ok()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    assert!(store.entry(EntryId(0)).is_none());
}
