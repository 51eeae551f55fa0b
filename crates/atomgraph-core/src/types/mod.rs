//! Core domain types for atomgraph.
//!
//! - [`Atom`] - a deduplicated content fragment keyed by its SHA-256 digest
//! - [`Embedding`] - a vector attached to an atom, with its 3-D coordinates
//! - [`AtomMetadata`] - typed, versioned metadata carried by every atom

mod atom;
mod digest;
mod embedding;
mod metadata;

pub use atom::{Atom, AtomId, AtomRef, OverflowPayload};
pub use digest::{hex_encode, ContentDigest, DIGEST_LEN};
pub use embedding::{
    validate_vector, Embedding, EmbeddingId, EmbeddingRecord, EmbeddingRef, SpatialCoord,
};
pub use metadata::{AtomMetadata, FingerprintAlgorithm, MetadataValue, METADATA_SCHEMA_VERSION};

/// Largest native dimension an embedding space may have.
pub const MAX_EMBEDDING_DIMENSION: usize = 1998;
