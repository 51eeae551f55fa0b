//! atomgraph Core Library
//!
//! Domain types and pure algorithms for the content-addressable atom store
//! and its hybrid spatial/vector search engine.
//!
//! # Architecture
//!
//! This crate defines:
//! - Domain types (`Atom`, `Embedding`, `AtomMetadata`, `ContentDigest`, ...)
//! - The fingerprint codec that bounds every inline value slot
//! - Landmark sets and the trilateration projector
//! - Deduplication policy variants
//! - Storage traits (`AtomStore`, `EmbeddingStore`)
//! - Error types, configuration and logging setup
//!
//! Persistence lives in `atomgraph-storage`.
//!
//! # Example
//!
//! ```
//! use atomgraph_core::codec::FingerprintCodec;
//!
//! let codec = FingerprintCodec::default();
//! let record = codec.encode(b"hello");
//! assert!(!record.overflow);
//! assert_eq!(record.bytes.len(), 64);
//! ```

pub mod codec;
pub mod config;
pub mod dedup;
pub mod distance;
pub mod error;
pub mod logging;
pub mod projection;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use codec::{FingerprintCodec, InlineRecord, InlineView};
pub use config::Config;
pub use dedup::{DedupEvidence, DedupStrategy, DeduplicationPolicy};
pub use distance::DistanceMetric;
pub use error::{CoreError, CoreResult};
pub use projection::{LandmarkProjector, LandmarkSet, Resolution};
pub use traits::{AtomStore, EmbeddingStore};
pub use types::{
    Atom, AtomId, AtomMetadata, AtomRef, ContentDigest, Embedding, EmbeddingId, EmbeddingRecord,
    EmbeddingRef, MetadataValue, OverflowPayload, SpatialCoord,
};
