//! atomgraph Storage Layer
//!
//! Persistent, deduplicated atom storage with spatial search, using RocksDB
//! as the underlying storage engine.
//!
//! # Architecture
//! - `column_families`: Column family definitions and tuned options
//! - `schema`: Key formats for every column family
//! - `serialization`: Versioned bincode records and padded vector bytes
//! - `store`: `RocksDbAtomStore`, implementing `AtomStore` and `EmbeddingStore`
//! - `index`: In-memory 3-D grid over coarse coordinates
//! - `search`: Two-stage hybrid search (spatial filter, exact rerank)
//! - `policy`: Versioned deduplication policies per scope
//!
//! # FAIL FAST
//! Storage failures are logged at error level and returned. Nothing is
//! retried silently.

pub mod column_families;
pub mod index;
pub mod policy;
pub mod schema;
pub mod search;
pub mod serialization;
pub mod store;

pub use column_families::{cf_names, get_column_family_descriptors};
pub use index::{IndexEntry, IndexView, SearchFilters, SpatialCandidate, SpatialIndex};
pub use policy::DeduplicationPolicyEngine;
pub use search::{
    DuplicateMatch, HybridSearchEngine, InMemoryVectorSource, PipelineStage, SearchHit,
    SearchOutcome, StageStats, VectorSource,
};
pub use store::{
    AtomRecord, AtomStoreConfig, ReclaimOptions, ReclaimReport, ReprojectionReport,
    RocksDbAtomStore, StoreError, StoreResult, StoreStats,
};

// Re-export core types for storage consumers
pub use atomgraph_core::{
    Atom, AtomId, AtomMetadata, AtomRef, AtomStore, ContentDigest, CoreError, CoreResult,
    DedupStrategy, DeduplicationPolicy, Embedding, EmbeddingId, EmbeddingStore, LandmarkSet,
    SpatialCoord,
};
