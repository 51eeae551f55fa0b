//! Orphan reclamation: grace window, cascade, interleaving with puts.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use atomgraph_core::config::SearchConfig;
use atomgraph_storage::{
    AtomMetadata, AtomStore, AtomStoreConfig, ContentDigest, CoreError, EmbeddingStore,
    ReclaimOptions, RocksDbAtomStore, SearchFilters,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

use common::{create_test_store, init_test_logging, random_unit_vector, text, DIM};

fn now_options() -> ReclaimOptions {
    ReclaimOptions {
        grace: Duration::ZERO,
        batch_size: 3,
    }
}

#[test]
fn test_grace_window_protects_fresh_orphans() {
    init_test_logging();
    let tmp = TempDir::new().unwrap();
    let config = AtomStoreConfig {
        reclaim_grace: Duration::from_secs(3600),
        ..AtomStoreConfig::with_dimension(DIM)
    };
    let store = RocksDbAtomStore::open_with_config(tmp.path(), config).unwrap();

    let r = store.put(b"soon gone", "text", None, AtomMetadata::default()).unwrap();
    store.release(r.atom_id).unwrap();

    // Inside the window: still there, still readable
    assert_eq!(store.reclaim_orphans().unwrap(), 0);
    assert_eq!(store.get(r.atom_id).unwrap().content(), b"soon gone");

    let report = store.reclaim_orphans_with(now_options(), None).unwrap();
    println!("=== TEST report: {:?}", report);
    assert_eq!(report.reclaimed, 1);
    assert!(matches!(store.get(r.atom_id), Err(CoreError::NotFound { .. })));
    assert_eq!(store.find_by_digest(&ContentDigest::of(b"soon gone")).unwrap(), None);
}

#[test]
fn test_only_orphans_are_reclaimed() {
    let tmp = TempDir::new().unwrap();
    let store = create_test_store(&tmp);

    let ids: Vec<_> = (0..10)
        .map(|i| store.put(&text(i), "text", None, AtomMetadata::default()).unwrap().atom_id)
        .collect();
    for id in ids.iter().step_by(2) {
        store.release(*id).unwrap();
    }

    let report = store.reclaim_orphans_with(now_options(), None).unwrap();
    assert_eq!(report.scanned, 10);
    assert_eq!(report.reclaimed, 5);
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(store.get(*id).is_ok(), i % 2 == 1, "atom {}", id);
    }

    // Idempotent
    assert_eq!(store.reclaim_orphans().unwrap(), 0);
}

#[test]
fn test_reclaim_cascades_to_embeddings_and_index() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(create_test_store(&tmp));
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let blob = vec![3u8; 400];
    let doomed = store.put(&blob, "binary", None, AtomMetadata::default()).unwrap();
    let keeper = store.put(b"keeper", "text", None, AtomMetadata::default()).unwrap();
    let v = random_unit_vector(&mut rng, DIM);
    let e1 = store.attach(doomed.atom_id, &v, "content", "m").unwrap();
    let e2 = store.attach(doomed.atom_id, &v, "summary", "m").unwrap();
    let e3 = store.attach(keeper.atom_id, &random_unit_vector(&mut rng, DIM), "content", "m").unwrap();
    assert_eq!(store.index().len(), 3);

    store.release(doomed.atom_id).unwrap();
    assert_eq!(store.reclaim_orphans().unwrap(), 1);

    for e in [e1.embedding_id, e2.embedding_id] {
        assert!(matches!(store.get_embedding(e), Err(CoreError::NotFound { .. })));
        assert!(store.index().get(e).is_none());
    }
    assert!(store.embeddings_for_atom(doomed.atom_id).unwrap().is_empty());
    assert!(store.get_embedding(e3.embedding_id).is_ok());

    let stats = store.stats().unwrap();
    assert_eq!(stats.atoms, 1);
    assert_eq!(stats.overflow_atoms, 0);
    assert_eq!(stats.embeddings, 1);

    let engine = store.search_engine(SearchConfig::default());
    let outcome = engine.search(&v, 5, &SearchFilters::none()).unwrap();
    assert_eq!(outcome.atom_ids(), vec![keeper.atom_id]);
}

#[test]
fn test_rereferenced_orphan_survives() {
    let tmp = TempDir::new().unwrap();
    let store = create_test_store(&tmp);

    let r = store.put(b"comeback", "text", None, AtomMetadata::default()).unwrap();
    store.release(r.atom_id).unwrap();
    store.put(b"comeback", "text", None, AtomMetadata::default()).unwrap();

    assert_eq!(store.reclaim_orphans().unwrap(), 0);
    assert_eq!(store.get(r.atom_id).unwrap().reference_count, 1);
}

#[test]
fn test_stop_flag_interrupts_and_rerun_finishes() {
    let tmp = TempDir::new().unwrap();
    let store = create_test_store(&tmp);
    for i in 0..6 {
        let r = store.put(&text(i), "text", None, AtomMetadata::default()).unwrap();
        store.release(r.atom_id).unwrap();
    }

    let stop = AtomicBool::new(true);
    let report = store.reclaim_orphans_with(now_options(), Some(&stop)).unwrap();
    assert!(report.interrupted);
    assert_eq!(report.reclaimed, 0);

    stop.store(false, Ordering::SeqCst);
    let report = store.reclaim_orphans_with(now_options(), Some(&stop)).unwrap();
    assert!(!report.interrupted);
    assert_eq!(report.reclaimed, 6);
    assert_eq!(store.stats().unwrap().atoms, 0);
}

#[test]
fn test_reinsert_after_reclaim_gets_fresh_id() {
    let tmp = TempDir::new().unwrap();
    let store = create_test_store(&tmp);

    let old = store.put(b"phoenix", "text", None, AtomMetadata::default()).unwrap();
    store.release(old.atom_id).unwrap();
    store.reclaim_orphans().unwrap();

    let new = store.put(b"phoenix", "text", None, AtomMetadata::default()).unwrap();
    assert!(new.is_new);
    assert!(new.atom_id > old.atom_id);
}

#[test]
fn test_reclaim_interleaved_with_puts_never_loses_live_atoms() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(create_test_store(&tmp));
    let done = Arc::new(AtomicBool::new(false));
    let contents: Vec<Vec<u8>> = (0..8)
        .map(|i| if i % 2 == 0 { text(i) } else { vec![i as u8; 100 + i] })
        .collect();

    let reclaimer = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut total = 0;
            while !done.load(Ordering::SeqCst) {
                total += store.reclaim_orphans_with(now_options(), None).unwrap().reclaimed;
            }
            total
        })
    };

    let workers: Vec<_> = (0..4)
        .map(|w| {
            let store = Arc::clone(&store);
            let contents = contents.clone();
            thread::spawn(move || {
                for round in 0..200 {
                    let content = &contents[(w + round) % contents.len()];
                    let r = store.put(content, "binary", None, AtomMetadata::default()).unwrap();
                    // We hold a reference: the atom must be readable and intact
                    let atom = store.get(r.atom_id).unwrap();
                    assert_eq!(atom.content(), content.as_slice());
                    assert!(atom.reference_count >= 1);
                    store.release(r.atom_id).unwrap();
                }
            })
        })
        .collect();

    for w in workers {
        w.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    let reclaimed = reclaimer.join().unwrap();
    println!("=== TEST reclaimed during interleaving: {}", reclaimed);

    // Every remaining atom is an orphan; a final pass clears them all
    store.reclaim_orphans().unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.atoms, 0);
    assert_eq!(stats.total_references, 0);
}
