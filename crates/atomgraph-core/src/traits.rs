//! Storage contracts.
//!
//! The read/write contract consumed by ingestion, orchestration and
//! provenance collaborators. `atomgraph-storage` provides the RocksDB
//! implementation. All methods are synchronous and the implementations are
//! `Send + Sync`; callers that need deadlines wrap calls themselves.

use crate::error::CoreResult;
use crate::types::{
    Atom, AtomId, AtomMetadata, AtomRef, ContentDigest, Embedding, EmbeddingId, EmbeddingRecord,
    EmbeddingRef,
};

/// Deduplicated, reference-counted content storage.
pub trait AtomStore: Send + Sync {
    /// Insert `content` or, when an atom with the same digest exists,
    /// increment its reference count. Atomic per digest.
    ///
    /// `is_new` in the result tells the caller whether embeddings still
    /// need to be generated.
    ///
    /// # Errors
    ///
    /// - `DigestCollisionSuspected` when the digest matches but bytes differ
    /// - `OverflowStorageFailure` when the overflow payload cannot be written
    /// - `StorageError` on other I/O failures
    fn put(
        &self,
        content: &[u8],
        modality: &str,
        subtype: Option<&str>,
        metadata: AtomMetadata,
    ) -> CoreResult<AtomRef>;

    /// Fetch an atom with its full content.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown or reclaimed ids, `IntegrityViolation` when
    /// the overflow payload is missing or corrupt.
    fn get(&self, atom_id: AtomId) -> CoreResult<Atom>;

    /// Batch [`get`](Self::get). Missing ids map to `None`.
    fn get_many(&self, atom_ids: &[AtomId]) -> CoreResult<Vec<Option<Atom>>>;

    /// Drop one reference. Returns the new count.
    ///
    /// Reaching 0 only marks the atom orphaned; deletion happens in
    /// [`reclaim_orphans`](Self::reclaim_orphans) after the grace window.
    ///
    /// # Errors
    ///
    /// `ReferenceUnderflow` when the count is already 0.
    fn release(&self, atom_id: AtomId) -> CoreResult<u64>;

    /// Delete orphans older than the grace window, with their overflow
    /// payloads and embeddings. Returns the number reclaimed.
    ///
    /// Idempotent. Atoms re-referenced while the job runs are skipped.
    fn reclaim_orphans(&self) -> CoreResult<usize>;

    fn find_by_digest(&self, digest: &ContentDigest) -> CoreResult<Option<AtomId>>;

    /// Merge caller metadata into an atom. Codec-owned fields are kept.
    /// Returns the merged metadata.
    fn merge_metadata(&self, atom_id: AtomId, metadata: AtomMetadata) -> CoreResult<AtomMetadata>;
}

/// Embeddings attached to atoms.
pub trait EmbeddingStore: Send + Sync {
    /// Store a vector for `(atom_id, embedding_type)`, project it with the
    /// active landmarks and index it. Re-attaching the same type replaces
    /// the vector and keeps the embedding id.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch`, `ValidationError` for non-finite values, and
    /// `NotFound` when the atom does not exist.
    fn attach(
        &self,
        atom_id: AtomId,
        vector: &[f32],
        embedding_type: &str,
        model_id: &str,
    ) -> CoreResult<EmbeddingRef>;

    fn get_embedding(&self, embedding_id: EmbeddingId) -> CoreResult<Embedding>;

    fn embeddings_for_atom(&self, atom_id: AtomId) -> CoreResult<Vec<EmbeddingRecord>>;
}
