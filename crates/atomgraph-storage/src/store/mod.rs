//! RocksDB-backed AtomStore and EmbeddingStore.
//!
//! # Column Families Used
//!
//! - `atoms`, `atom_digests`, `atom_overflow`: deduplicated content
//! - `embeddings`, `embedding_vectors`, `atom_embeddings`: vectors and coordinates
//! - `landmarks`, `system`: landmark sets, id counters, active landmark version
//! - `dedup_policies`, `dedup_active`: served by `DeduplicationPolicyEngine`
//!
//! # FAIL FAST Policy
//!
//! Every RocksDB operation that fails returns a detailed error with:
//! - The operation that failed
//! - The column family involved
//! - The key being accessed
//! - The underlying RocksDB error
//!
//! # Thread Safety
//!
//! Writers touching one atom serialize on a 64-way striped mutex keyed by
//! the content digest. RocksDB handles everything else. The spatial index
//! sits behind a `parking_lot::RwLock`.
//!
//! # Module Structure
//!
//! - `types`: Error types, configuration, records and reports
//! - `store`: Struct, open, counters, landmarks bootstrap, operational methods
//! - `atoms`: put / get / release / metadata
//! - `reclaim`: Orphan reclamation
//! - `embeddings`: attach / lookups, `VectorSource` implementation
//! - `landmarks`: Landmark installation and re-projection
//! - `trait_impl`: `AtomStore` / `EmbeddingStore` trait implementations
//! - `tests`: Store test suite

mod atoms;
mod embeddings;
mod landmarks;
mod reclaim;
#[allow(clippy::module_inception)]
mod store;
mod trait_impl;
mod types;


pub use store::RocksDbAtomStore;
pub use types::{
    AtomRecord, AtomStoreConfig, ReclaimOptions, ReclaimReport, ReprojectionReport,
    StoreError, StoreResult, StoreStats,
};
