//! Search result types.

use std::fmt;

use atomgraph_core::types::{AtomId, EmbeddingId};

/// A single search result.
///
/// - `distance`: exact distance in the embedding space (lower = closer)
/// - `score`: `1 - d` for cosine, `1 / (1 + d)` for Euclidean (higher = closer)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub atom_id: AtomId,
    /// Best-scoring embedding of the atom
    pub embedding_id: EmbeddingId,
    pub score: f32,
    pub distance: f32,
}

/// Pipeline stage identifiers, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    CoarseFilter,
    FineNarrow,
    ExactRerank,
    /// Replaces the spatial stages when they find too few candidates
    LinearScan,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoarseFilter => "coarse_filter",
            Self::FineNarrow => "fine_narrow",
            Self::ExactRerank => "exact_rerank",
            Self::LinearScan => "linear_scan",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one executed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStats {
    pub stage: PipelineStage,
    pub candidates_in: usize,
    pub candidates_out: usize,
    pub latency_us: u64,
}

/// Hits plus a trace of how they were found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// Sorted by descending score, one per atom, at most `top_k`
    pub hits: Vec<SearchHit>,
    /// Executed stages in order
    pub stages: Vec<StageStats>,
    /// Final coarse radius (0 when no spatial query ran)
    pub radius_used: f32,
    pub widenings: u32,
    pub used_fallback: bool,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn atom_ids(&self) -> Vec<AtomId> {
        self.hits.iter().map(|h| h.atom_id).collect()
    }

    pub fn stage(&self, stage: PipelineStage) -> Option<&StageStats> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn total_latency_us(&self) -> u64 {
        self.stages.iter().map(|s| s.latency_us).sum()
    }
}

/// A stored embedding the active policy treats as a duplicate of a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateMatch {
    pub atom_id: AtomId,
    pub embedding_id: EmbeddingId,
    /// Cosine similarity between query and stored vector
    pub semantic_similarity: f32,
    /// Distance between fine coordinates
    pub spatial_distance: f32,
}
