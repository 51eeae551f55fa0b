//! AtomStore and EmbeddingStore trait implementations.
//!
//! Thin wrappers over the inherent methods in `atoms`, `reclaim` and
//! `embeddings`.

use atomgraph_core::error::CoreResult;
use atomgraph_core::traits::{AtomStore, EmbeddingStore};
use atomgraph_core::types::{
    Atom, AtomId, AtomMetadata, AtomRef, ContentDigest, Embedding, EmbeddingId, EmbeddingRecord,
    EmbeddingRef,
};

use super::store::RocksDbAtomStore;

impl AtomStore for RocksDbAtomStore {
    fn put(
        &self,
        content: &[u8],
        modality: &str,
        subtype: Option<&str>,
        metadata: AtomMetadata,
    ) -> CoreResult<AtomRef> {
        self.put_atom(content, modality, subtype, metadata)
    }

    fn get(&self, atom_id: AtomId) -> CoreResult<Atom> {
        self.get_atom(atom_id)
    }

    fn get_many(&self, atom_ids: &[AtomId]) -> CoreResult<Vec<Option<Atom>>> {
        self.get_atoms(atom_ids)
    }

    fn release(&self, atom_id: AtomId) -> CoreResult<u64> {
        self.release_atom(atom_id)
    }

    fn reclaim_orphans(&self) -> CoreResult<usize> {
        self.reclaim().map(|report| report.reclaimed)
    }

    fn find_by_digest(&self, digest: &ContentDigest) -> CoreResult<Option<AtomId>> {
        self.lookup_digest(digest)
    }

    fn merge_metadata(&self, atom_id: AtomId, metadata: AtomMetadata) -> CoreResult<AtomMetadata> {
        self.merge_atom_metadata(atom_id, metadata)
    }
}

impl EmbeddingStore for RocksDbAtomStore {
    fn attach(
        &self,
        atom_id: AtomId,
        vector: &[f32],
        embedding_type: &str,
        model_id: &str,
    ) -> CoreResult<EmbeddingRef> {
        self.attach_embedding(atom_id, vector, embedding_type, model_id)
    }

    fn get_embedding(&self, embedding_id: EmbeddingId) -> CoreResult<Embedding> {
        self.load_embedding(embedding_id)
    }

    fn embeddings_for_atom(&self, atom_id: AtomId) -> CoreResult<Vec<EmbeddingRecord>> {
        self.atom_embedding_records(atom_id)
    }
}
