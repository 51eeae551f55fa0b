//! Deduplication policies.
//!
//! Exact duplicates are always collapsed by the atom store on digest. A
//! policy decides what ELSE counts as a duplicate: near-identical vectors,
//! nearby coordinates, or both. The ingestion layer gathers
//! [`DedupEvidence`] and asks the active policy's [`DedupStrategy`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Equivalence rule beyond exact digest match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DedupStrategy {
    /// Exact content digest only
    Hash,
    /// Exact digest, or cosine similarity >= threshold
    Semantic { threshold: f32 },
    /// Exact digest, or coordinate distance <= threshold
    Spatial { threshold: f32 },
    /// Exact digest, or both the semantic and the spatial test pass
    Hybrid {
        semantic_threshold: f32,
        spatial_threshold: f32,
    },
}

/// Observations about a candidate pair, gathered by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DedupEvidence {
    pub exact_digest_match: bool,
    /// Similarity in the embedding space (higher = closer)
    pub semantic_similarity: Option<f32>,
    /// Distance between fine coordinates
    pub spatial_distance: Option<f32>,
}

impl DedupStrategy {
    /// Decide whether the evidence describes a duplicate.
    ///
    /// Missing evidence for a test counts as a failed test.
    pub fn is_duplicate(&self, evidence: &DedupEvidence) -> bool {
        if evidence.exact_digest_match {
            return true;
        }
        let semantic_ok = |t: f32| evidence.semantic_similarity.is_some_and(|s| s >= t);
        let spatial_ok = |t: f32| evidence.spatial_distance.is_some_and(|d| d <= t);
        match *self {
            Self::Hash => false,
            Self::Semantic { threshold } => semantic_ok(threshold),
            Self::Spatial { threshold } => spatial_ok(threshold),
            Self::Hybrid {
                semantic_threshold,
                spatial_threshold,
            } => semantic_ok(semantic_threshold) && spatial_ok(spatial_threshold),
        }
    }

    /// Reject NaN or out-of-range thresholds.
    pub fn validate(&self) -> CoreResult<()> {
        let check_semantic = |t: f32| {
            if !(-1.0..=1.0).contains(&t) {
                return Err(CoreError::validation(
                    "semantic_threshold",
                    format!("must be in [-1, 1], got {}", t),
                ));
            }
            Ok(())
        };
        let check_spatial = |t: f32| {
            if !(t.is_finite() && t >= 0.0) {
                return Err(CoreError::validation(
                    "spatial_threshold",
                    format!("must be a finite non-negative distance, got {}", t),
                ));
            }
            Ok(())
        };
        match *self {
            Self::Hash => Ok(()),
            Self::Semantic { threshold } => check_semantic(threshold),
            Self::Spatial { threshold } => check_spatial(threshold),
            Self::Hybrid {
                semantic_threshold,
                spatial_threshold,
            } => {
                check_semantic(semantic_threshold)?;
                check_spatial(spatial_threshold)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Semantic { .. } => "semantic",
            Self::Spatial { .. } => "spatial",
            Self::Hybrid { .. } => "hybrid",
        }
    }
}

/// An immutable policy row. Replaced, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeduplicationPolicy {
    pub policy_id: Uuid,
    pub policy_name: String,
    pub scope: String,
    pub strategy: DedupStrategy,
    /// Filled in on read from the scope's active pointer
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Policy that was active in the scope when this one was created
    pub supersedes: Option<Uuid>,
}

impl DeduplicationPolicy {
    pub fn new(
        scope: impl Into<String>,
        policy_name: impl Into<String>,
        strategy: DedupStrategy,
        supersedes: Option<Uuid>,
    ) -> Self {
        Self {
            policy_id: Uuid::new_v4(),
            policy_name: policy_name.into(),
            scope: scope.into(),
            strategy,
            is_active: false,
            created_at: Utc::now(),
            supersedes,
        }
    }

    /// Hash-based matching is the whole rule or part of it.
    pub fn hash_enabled(&self) -> bool {
        matches!(self.strategy, DedupStrategy::Hash | DedupStrategy::Hybrid { .. })
    }

    pub fn semantic_threshold(&self) -> Option<f32> {
        match self.strategy {
            DedupStrategy::Semantic { threshold } => Some(threshold),
            DedupStrategy::Hybrid {
                semantic_threshold, ..
            } => Some(semantic_threshold),
            _ => None,
        }
    }

    pub fn spatial_threshold(&self) -> Option<f32> {
        match self.strategy {
            DedupStrategy::Spatial { threshold } => Some(threshold),
            DedupStrategy::Hybrid {
                spatial_threshold, ..
            } => Some(spatial_threshold),
            _ => None,
        }
    }

    pub fn is_duplicate(&self, evidence: &DedupEvidence) -> bool {
        self.strategy.is_duplicate(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(sim: Option<f32>, dist: Option<f32>) -> DedupEvidence {
        DedupEvidence {
            exact_digest_match: false,
            semantic_similarity: sim,
            spatial_distance: dist,
        }
    }

    #[test]
    fn test_exact_match_is_always_duplicate() {
        let exact = DedupEvidence {
            exact_digest_match: true,
            ..Default::default()
        };
        for strategy in [
            DedupStrategy::Hash,
            DedupStrategy::Semantic { threshold: 0.99 },
            DedupStrategy::Spatial { threshold: 0.0 },
            DedupStrategy::Hybrid {
                semantic_threshold: 0.99,
                spatial_threshold: 0.0,
            },
        ] {
            assert!(strategy.is_duplicate(&exact), "{} must accept exact", strategy.name());
        }
    }

    #[test]
    fn test_hash_ignores_similarity() {
        assert!(!DedupStrategy::Hash.is_duplicate(&evidence(Some(1.0), Some(0.0))));
    }

    #[test]
    fn test_semantic_threshold_inclusive() {
        let s = DedupStrategy::Semantic { threshold: 0.95 };
        assert!(s.is_duplicate(&evidence(Some(0.95), None)));
        assert!(!s.is_duplicate(&evidence(Some(0.9499), None)));
        assert!(!s.is_duplicate(&evidence(None, Some(0.0))));
    }

    #[test]
    fn test_hybrid_requires_both() {
        let h = DedupStrategy::Hybrid {
            semantic_threshold: 0.9,
            spatial_threshold: 0.05,
        };
        assert!(h.is_duplicate(&evidence(Some(0.95), Some(0.01))));
        assert!(!h.is_duplicate(&evidence(Some(0.95), Some(0.2))));
        assert!(!h.is_duplicate(&evidence(Some(0.5), Some(0.01))));
    }

    #[test]
    fn test_policy_accessors() {
        let p = DeduplicationPolicy::new(
            "tenant-a",
            "strict",
            DedupStrategy::Hybrid {
                semantic_threshold: 0.95,
                spatial_threshold: 0.1,
            },
            None,
        );
        assert!(p.hash_enabled());
        assert_eq!(p.semantic_threshold(), Some(0.95));
        assert_eq!(p.spatial_threshold(), Some(0.1));

        let s = DeduplicationPolicy::new("tenant-a", "loose", DedupStrategy::Spatial { threshold: 0.2 }, None);
        assert!(!s.hash_enabled());
        assert_eq!(s.semantic_threshold(), None);
    }

    #[test]
    fn edge_case_invalid_thresholds() {
        assert!(DedupStrategy::Semantic { threshold: f32::NAN }.validate().is_err());
        assert!(DedupStrategy::Semantic { threshold: 1.5 }.validate().is_err());
        assert!(DedupStrategy::Spatial { threshold: -0.1 }.validate().is_err());
        assert!(DedupStrategy::Hash.validate().is_ok());
    }
}
