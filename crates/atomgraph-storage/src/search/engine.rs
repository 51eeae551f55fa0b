//! HybridSearchEngine: coarse spatial filter, fine narrowing, exact rerank.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, warn};

use atomgraph_core::config::SearchConfig;
use atomgraph_core::dedup::{DedupEvidence, DeduplicationPolicy};
use atomgraph_core::distance::{cosine_distance, DistanceMetric};
use atomgraph_core::error::CoreResult;
use atomgraph_core::types::{validate_vector, AtomId, EmbeddingId, SpatialCoord};

use crate::index::{IndexView, SearchFilters, SpatialCandidate, SpatialIndex};

use super::types::{DuplicateMatch, PipelineStage, SearchHit, SearchOutcome, StageStats};
use super::vector_source::VectorSource;

/// Nearest hits examined when looking for a semantic near-duplicate.
const DUPLICATE_PROBE: usize = 16;

/// Two-stage search over a [`SpatialIndex`] and a [`VectorSource`].
///
/// Cheap to clone behind an `Arc`; holds no per-query state.
pub struct HybridSearchEngine {
    index: Arc<SpatialIndex>,
    vectors: Arc<dyn VectorSource>,
    metric: DistanceMetric,
    config: SearchConfig,
}

impl std::fmt::Debug for HybridSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearchEngine")
            .field("index", &self.index)
            .field("metric", &self.metric)
            .field("config", &self.config)
            .finish()
    }
}

impl HybridSearchEngine {
    pub fn new(
        index: Arc<SpatialIndex>,
        vectors: Arc<dyn VectorSource>,
        metric: DistanceMetric,
        config: SearchConfig,
    ) -> Self {
        Self {
            index,
            vectors,
            metric,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Top `top_k` atoms nearest to `query`, at most one hit per atom.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` when `query` does not match the active projector
    /// - `ValidationError` on NaN or Infinity in `query`
    /// - whatever the vector source returns on I/O failure
    ///
    /// No candidates passing `filters` yields an empty outcome, not an error.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> CoreResult<SearchOutcome> {
        let view = self.index.view();
        let projector = Arc::clone(view.projector());
        validate_vector(query, projector.dimension())?;

        let mut outcome = SearchOutcome::default();
        if top_k == 0 {
            return Ok(outcome);
        }

        let (coarse, fine) = projector.project_both(query)?;
        let target = self.candidate_target(top_k, view.len());

        // Stage 1: coarse radius query, widening until `target` atoms are in
        let started = Instant::now();
        let covering = view.covering_radius();
        let mut radius = self.config.initial_radius.min(covering);
        let mut candidates = view.within_radius(&coarse, radius, filters);
        let mut widenings = 0u32;
        while distinct_atoms(&candidates) < target
            && widenings < self.config.max_widenings
            && radius < covering
        {
            radius = (radius * self.config.radius_growth).min(covering);
            widenings += 1;
            candidates = view.within_radius(&coarse, radius, filters);
        }
        outcome.stages.push(StageStats {
            stage: PipelineStage::CoarseFilter,
            candidates_in: view.len(),
            candidates_out: candidates.len(),
            latency_us: started.elapsed().as_micros() as u64,
        });
        outcome.radius_used = radius;
        outcome.widenings = widenings;

        let candidates = if distinct_atoms(&candidates) < top_k {
            // Stage 1b: not enough spatial neighbours, scan everything that passes the filters
            Self::linear_scan(&view, filters, &mut outcome)
        } else {
            // Stage 2: keep the nearest `target` atoms by fine coordinate
            let started = Instant::now();
            let candidates_in = candidates.len();
            let narrowed = narrow_by_fine(candidates, &fine, target);
            outcome.stages.push(StageStats {
                stage: PipelineStage::FineNarrow,
                candidates_in,
                candidates_out: narrowed.len(),
                latency_us: started.elapsed().as_micros() as u64,
            });
            narrowed
        };
        drop(view);

        // Stage 3: exact distances on stored vectors
        self.rerank_stage(query, candidates, top_k, &mut outcome)?;

        if outcome.hits.len() < top_k && !outcome.used_fallback {
            // Stale candidates left the spatial path short
            let view = self.index.view();
            let all = Self::linear_scan(&view, filters, &mut outcome);
            drop(view);
            self.rerank_stage(query, all, top_k, &mut outcome)?;
        }

        debug!(
            top_k,
            target,
            radius = outcome.radius_used,
            widenings,
            fallback = outcome.used_fallback,
            hits = outcome.hits.len(),
            latency_us = outcome.total_latency_us(),
            "Hybrid search finished"
        );
        Ok(outcome)
    }

    /// Candidates to keep for reranking, counted in distinct atoms.
    fn candidate_target(&self, top_k: usize, indexed: usize) -> usize {
        let share = (self.config.min_candidate_fraction * indexed as f32).ceil() as usize;
        top_k
            .saturating_mul(self.config.oversample_factor)
            .max(self.config.min_candidates)
            .max(top_k)
            .max(share)
    }

    fn linear_scan(
        view: &IndexView<'_>,
        filters: &SearchFilters,
        outcome: &mut SearchOutcome,
    ) -> Vec<SpatialCandidate> {
        let started = Instant::now();
        let all = view.filtered(filters);
        outcome.used_fallback = true;
        outcome.stages.push(StageStats {
            stage: PipelineStage::LinearScan,
            candidates_in: view.len(),
            candidates_out: all.len(),
            latency_us: started.elapsed().as_micros() as u64,
        });
        all
    }

    fn rerank_stage(
        &self,
        query: &[f32],
        candidates: Vec<SpatialCandidate>,
        top_k: usize,
        outcome: &mut SearchOutcome,
    ) -> CoreResult<()> {
        let started = Instant::now();
        let candidates_in = candidates.len();
        outcome.hits = self.rerank(query, candidates, top_k)?;
        outcome.stages.push(StageStats {
            stage: PipelineStage::ExactRerank,
            candidates_in,
            candidates_out: outcome.hits.len(),
            latency_us: started.elapsed().as_micros() as u64,
        });
        Ok(())
    }

    /// Brute-force ranking of every filtered embedding. Ground truth for
    /// measuring [`search`](Self::search); same scoring and deduplication.
    pub fn search_exact(
        &self,
        query: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> CoreResult<Vec<SearchHit>> {
        let view = self.index.view();
        validate_vector(query, view.projector().dimension())?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let candidates = view.filtered(filters);
        drop(view);
        self.rerank(query, candidates, top_k)
    }

    /// A stored embedding that `policy` treats as a duplicate of `query`.
    ///
    /// Semantic evidence is cosine similarity between vectors; spatial
    /// evidence is the distance between fine coordinates. Hash-only
    /// policies return `None`: exact duplicates never reach this point
    /// because `put` already collapsed them.
    pub fn find_duplicate(
        &self,
        query: &[f32],
        policy: &DeduplicationPolicy,
        filters: &SearchFilters,
    ) -> CoreResult<Option<DuplicateMatch>> {
        let semantic = policy.semantic_threshold();
        let spatial = policy.spatial_threshold();
        if semantic.is_none() && spatial.is_none() {
            return Ok(None);
        }

        // (atom, embedding, fine distance) in the order to try them
        let ordered: Vec<(AtomId, EmbeddingId, f32)> = match (semantic, spatial) {
            (None, Some(threshold)) => {
                let view = self.index.view();
                validate_vector(query, view.projector().dimension())?;
                let fine = view.projector().project_both(query)?.1;
                let mut near: Vec<_> = view
                    .filtered(filters)
                    .into_iter()
                    .map(|c| (c.atom_id, c.embedding_id, c.fine.distance(&fine)))
                    .filter(|(_, _, d)| *d <= threshold)
                    .collect();
                near.sort_by(|a, b| a.2.total_cmp(&b.2));
                near
            }
            _ => {
                let hits = self.search(query, DUPLICATE_PROBE, filters)?.hits;
                let view = self.index.view();
                let fine = view.projector().project_both(query)?.1;
                hits.iter()
                    .filter_map(|h| {
                        view.entry(h.embedding_id)
                            .map(|e| (h.atom_id, h.embedding_id, e.fine.distance(&fine)))
                    })
                    .collect()
            }
        };

        let ids: Vec<EmbeddingId> = ordered.iter().map(|(_, id, _)| *id).collect();
        let vectors = self.vectors.load_vectors(&ids)?;
        for ((atom_id, embedding_id, spatial_distance), vector) in ordered.into_iter().zip(vectors) {
            let Some(vector) = vector else { continue };
            if vector.len() != query.len() {
                continue;
            }
            let semantic_similarity = 1.0 - cosine_distance(query, &vector);
            let evidence = DedupEvidence {
                exact_digest_match: false,
                semantic_similarity: Some(semantic_similarity),
                spatial_distance: Some(spatial_distance),
            };
            if policy.is_duplicate(&evidence) {
                debug!(
                    %atom_id,
                    %embedding_id,
                    semantic_similarity,
                    spatial_distance,
                    policy = policy.strategy.name(),
                    "Near-duplicate found"
                );
                return Ok(Some(DuplicateMatch {
                    atom_id,
                    embedding_id,
                    semantic_similarity,
                    spatial_distance,
                }));
            }
        }
        Ok(None)
    }

    /// Exact distances, best embedding per atom, ascending distance.
    fn rerank(
        &self,
        query: &[f32],
        candidates: Vec<SpatialCandidate>,
        top_k: usize,
    ) -> CoreResult<Vec<SearchHit>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<EmbeddingId> = candidates.iter().map(|c| c.embedding_id).collect();
        let vectors = self.vectors.load_vectors(&ids)?;

        let loaded: Vec<(SpatialCandidate, Vec<f32>)> = candidates
            .into_iter()
            .zip(vectors)
            .filter_map(|(c, v)| v.map(|v| (c, v)))
            .filter(|(_, v)| v.len() == query.len())
            .collect();
        let stale = ids.len() - loaded.len();
        if stale > 0 {
            // Index lags deletes briefly; reclaimed vectors are simply skipped
            warn!(stale, "Skipped candidates without a stored vector");
        }

        let metric = self.metric;
        let score = |(c, v): &(SpatialCandidate, Vec<f32>)| (*c, metric.distance(query, v));
        let mut scored: Vec<(SpatialCandidate, f32)> =
            if loaded.len() >= self.config.parallel_threshold {
                loaded.par_iter().map(score).collect()
            } else {
                loaded.iter().map(score).collect()
            };
        scored.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| a.0.embedding_id.cmp(&b.0.embedding_id))
        });

        let mut seen = HashSet::with_capacity(top_k);
        Ok(scored
            .into_iter()
            .filter(|(c, _)| seen.insert(c.atom_id))
            .take(top_k)
            .map(|(c, distance)| SearchHit {
                atom_id: c.atom_id,
                embedding_id: c.embedding_id,
                score: metric.similarity(distance),
                distance,
            })
            .collect())
    }
}

fn distinct_atoms(candidates: &[SpatialCandidate]) -> usize {
    candidates
        .iter()
        .map(|c| c.atom_id)
        .collect::<HashSet<AtomId>>()
        .len()
}

/// Keep the candidates of the `target` atoms closest to `fine` by fine
/// coordinate. Every embedding of a kept atom that ranks before the first
/// dropped atom stays, so reranking still sees `target` atoms.
fn narrow_by_fine(
    mut candidates: Vec<SpatialCandidate>,
    fine: &SpatialCoord,
    target: usize,
) -> Vec<SpatialCandidate> {
    if candidates.len() <= target {
        return candidates;
    }
    candidates.sort_unstable_by(|a, b| {
        a.fine
            .distance(fine)
            .total_cmp(&b.fine.distance(fine))
            .then_with(|| a.embedding_id.cmp(&b.embedding_id))
    });
    let mut seen = HashSet::with_capacity(target);
    let cut = candidates
        .iter()
        .position(|c| {
            seen.insert(c.atom_id);
            seen.len() > target
        })
        .unwrap_or(candidates.len());
    candidates.truncate(cut);
    candidates
}
