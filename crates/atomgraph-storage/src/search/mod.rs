//! Hybrid spatial/vector search.
//!
//! # Pipeline Stages
//!
//! 1. **Coarse filter**: radius query on the spatial grid around the
//!    query's coarse coordinate, widening until enough candidates are found
//! 2. **Fine narrow**: keep the `target` candidates nearest by fine coordinate
//! 3. **Exact rerank**: load vectors, exact distance in the embedding space
//!
//! When widening still leaves fewer than `top_k` candidates, a linear scan
//! over every filtered index entry replaces stages 1 and 2.
//!
//! Projection loses information, so stages 1 and 2 are approximate. Stage 3
//! is exact over whatever survives; quality is measured with
//! [`quality::recall_at_k`] against [`HybridSearchEngine::search_exact`].

mod engine;
pub mod quality;
mod types;
mod vector_source;


pub use engine::HybridSearchEngine;
pub use types::{DuplicateMatch, PipelineStage, SearchHit, SearchOutcome, StageStats};
pub use vector_source::{InMemoryVectorSource, VectorSource};
