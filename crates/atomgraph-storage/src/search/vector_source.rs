//! Vector loading seam for the rerank stage.

use dashmap::DashMap;

use atomgraph_core::error::CoreResult;
use atomgraph_core::types::EmbeddingId;

/// Batch access to stored vectors by embedding id.
///
/// Implemented by `RocksDbAtomStore`. Ids whose vector is gone map to
/// `None`; the caller skips them.
pub trait VectorSource: Send + Sync {
    fn load_vectors(&self, ids: &[EmbeddingId]) -> CoreResult<Vec<Option<Vec<f32>>>>;
}

/// Concurrent in-memory vector table, for tools and tests that drive the
/// search engine without RocksDB.
#[derive(Debug, Default)]
pub struct InMemoryVectorSource {
    vectors: DashMap<EmbeddingId, Vec<f32>>,
}

impl InMemoryVectorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: EmbeddingId, vector: Vec<f32>) {
        self.vectors.insert(id, vector);
    }

    pub fn remove(&self, id: EmbeddingId) -> Option<Vec<f32>> {
        self.vectors.remove(&id).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl VectorSource for InMemoryVectorSource {
    fn load_vectors(&self, ids: &[EmbeddingId]) -> CoreResult<Vec<Option<Vec<f32>>>> {
        Ok(ids
            .iter()
            .map(|id| self.vectors.get(id).map(|v| v.value().clone()))
            .collect())
    }
}
