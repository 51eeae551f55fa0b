//! Versioned, immutable landmark sets.

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{Axis, Pole, Resolution};
use crate::config::{EmbeddingConfig, LandmarkBootstrap, ProjectionConfig};
use crate::distance::{l2_norm, DistanceMetric};
use crate::error::{CoreError, CoreResult};
use crate::types::MAX_EMBEDDING_DIMENSION;

/// Pairs closer than this are degenerate.
const MIN_PAIR_SPAN: f32 = 1e-6;

/// A reference point in the embedding space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub landmark_id: u32,
    pub axis: Axis,
    pub pole: Pole,
    pub resolution: Resolution,
    pub vector: Vec<f32>,
}

/// Output shape shared by the basis-derived constructors.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionParams {
    /// Output coordinates lie in [-scale, scale]
    pub scale: f32,
    /// Precision of coarse coordinates
    pub coarse_quantum: f32,
    /// One fine antipodal pair per axis, direction and radius
    pub fine_radii: Vec<f32>,
    /// Orthogonal directions per fine axis, capped at `dimension / 3`
    pub fine_directions: usize,
}

impl ProjectionParams {
    /// Fine directions per axis actually used in `dimension` dimensions.
    pub fn effective_fine_directions(&self, dimension: usize) -> usize {
        self.fine_directions.min(dimension / 3).max(1)
    }
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self::from(&ProjectionConfig::default())
    }
}

impl From<&ProjectionConfig> for ProjectionParams {
    fn from(cfg: &ProjectionConfig) -> Self {
        Self {
            scale: cfg.scale,
            coarse_quantum: cfg.coarse_quantum,
            fine_radii: cfg.fine_radii.clone(),
            fine_directions: cfg.fine_directions,
        }
    }
}

/// Immutable landmark configuration of one embedding space.
///
/// A change of landmarks is a new set with a higher `version`, followed by
/// an explicit re-projection of every stored embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub version: u32,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub scale: f32,
    pub coarse_quantum: f32,
    pub landmarks: Vec<Landmark>,
    pub created_at: DateTime<Utc>,
}

impl LandmarkSet {
    /// Build and validate a set from an explicit landmark list.
    pub fn new(
        version: u32,
        dimension: usize,
        metric: DistanceMetric,
        scale: f32,
        coarse_quantum: f32,
        landmarks: Vec<Landmark>,
    ) -> CoreResult<Self> {
        let set = Self {
            version,
            dimension,
            metric,
            scale,
            coarse_quantum,
            landmarks,
            created_at: Utc::now(),
        };
        set.validate()?;
        Ok(set)
    }

    /// Landmarks on the standard basis vectors e1, e2, e3.
    pub fn canonical(version: u32, dimension: usize, metric: DistanceMetric) -> CoreResult<Self> {
        check_basis_dimension(dimension)?;
        Self::from_basis(
            version,
            metric,
            standard_basis(dimension),
            &ProjectionParams::default(),
        )
    }

    /// Landmarks on a random orthonormal basis drawn from ChaCha8 with `seed`.
    ///
    /// The same seed and dimension always give the same set.
    pub fn seeded(
        version: u32,
        dimension: usize,
        metric: DistanceMetric,
        seed: u64,
    ) -> CoreResult<Self> {
        Self::seeded_with(version, dimension, metric, seed, &ProjectionParams::default())
    }

    fn seeded_with(
        version: u32,
        dimension: usize,
        metric: DistanceMetric,
        seed: u64,
        params: &ProjectionParams,
    ) -> CoreResult<Self> {
        check_basis_dimension(dimension)?;
        let wanted = 3 * params.effective_fine_directions(dimension);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut directions: Vec<Vec<f32>> = Vec::with_capacity(wanted);
        while directions.len() < wanted {
            let candidate: Vec<f32> = (0..dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            // Rejected only when nearly inside the span of earlier vectors
            if let Some(v) = orthogonalize(&candidate, &directions) {
                directions.push(v);
            }
        }
        Self::from_directions(version, metric, directions, params)
    }

    /// Landmarks on an arbitrary basis, orthonormalized with Gram-Schmidt.
    ///
    /// Coarse: one antipodal pair per axis at radius 1 along the basis.
    /// Fine: per axis, `params.effective_fine_directions` orthonormal
    /// directions (the first is the coarse one, the rest extend the basis
    /// with standard basis vectors), each with one antipodal pair per entry
    /// of `params.fine_radii`. A fine coordinate is the mean over all its
    /// pairs, so it sees more of the space than the coarse one.
    pub fn from_basis(
        version: u32,
        metric: DistanceMetric,
        basis: [Vec<f32>; 3],
        params: &ProjectionParams,
    ) -> CoreResult<Self> {
        let dimension = basis[0].len();
        check_basis_dimension(dimension)?;
        if basis.iter().any(|b| b.len() != dimension) {
            return Err(CoreError::validation(
                "basis",
                "basis vectors must share one dimension",
            ));
        }

        let wanted = 3 * params.effective_fine_directions(dimension);
        let mut directions: Vec<Vec<f32>> = Vec::with_capacity(wanted);
        for (i, b) in basis.iter().enumerate() {
            let v = orthogonalize(b, &directions).ok_or_else(|| {
                CoreError::validation("basis", format!("basis vector {} is linearly dependent", i))
            })?;
            directions.push(v);
        }

        let mut e = vec![0.0f32; dimension];
        for i in 0..dimension {
            if directions.len() == wanted {
                break;
            }
            e.fill(0.0);
            e[i] = 1.0;
            if let Some(v) = orthogonalize(&e, &directions) {
                directions.push(v);
            }
        }

        Self::from_directions(version, metric, directions, params)
    }

    /// `directions` is orthonormal; entry `3 * j + axis` is direction `j`
    /// of that axis.
    fn from_directions(
        version: u32,
        metric: DistanceMetric,
        directions: Vec<Vec<f32>>,
        params: &ProjectionParams,
    ) -> CoreResult<Self> {
        let dimension = directions[0].len();
        let per_axis = directions.len() / 3;

        let mut landmarks = Vec::with_capacity(6 * (1 + per_axis * params.fine_radii.len()));
        let mut next_id = 0u32;
        let mut push_pair = |axis: Axis, resolution: Resolution, dir: &[f32], radius: f32| {
            for (pole, sign) in [(Pole::Positive, 1.0f32), (Pole::Negative, -1.0f32)] {
                landmarks.push(Landmark {
                    landmark_id: next_id,
                    axis,
                    pole,
                    resolution,
                    vector: dir.iter().map(|x| x * radius * sign).collect(),
                });
                next_id += 1;
            }
        };

        for axis in Axis::ALL {
            push_pair(axis, Resolution::Coarse, &directions[axis.index()], 1.0);
        }
        for j in 0..per_axis {
            for &radius in &params.fine_radii {
                for axis in Axis::ALL {
                    push_pair(axis, Resolution::Fine, &directions[3 * j + axis.index()], radius);
                }
            }
        }

        Self::new(
            version,
            dimension,
            metric,
            params.scale,
            params.coarse_quantum,
            landmarks,
        )
    }

    /// Bootstrap set described by configuration.
    pub fn from_config(
        version: u32,
        embedding: &EmbeddingConfig,
        projection: &ProjectionConfig,
    ) -> CoreResult<Self> {
        let params = ProjectionParams::from(projection);
        match projection.bootstrap {
            LandmarkBootstrap::Canonical => {
                check_basis_dimension(embedding.dimension)?;
                Self::from_basis(
                    version,
                    embedding.metric,
                    standard_basis(embedding.dimension),
                    &params,
                )
            }
            LandmarkBootstrap::Seeded => Self::seeded_with(
                version,
                embedding.dimension,
                embedding.metric,
                projection.seed,
                &params,
            ),
        }
    }

    /// Copy of this set under a new version number.
    pub fn with_version(&self, version: u32) -> Self {
        Self {
            version,
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Landmarks of one resolution and axis, split into (positive, negative),
    /// each ordered by landmark id.
    pub fn poles(&self, resolution: Resolution, axis: Axis) -> (Vec<&Landmark>, Vec<&Landmark>) {
        let mut pos = Vec::new();
        let mut neg = Vec::new();
        for lm in self
            .landmarks
            .iter()
            .filter(|l| l.resolution == resolution && l.axis == axis)
        {
            match lm.pole {
                Pole::Positive => pos.push(lm),
                Pole::Negative => neg.push(lm),
            }
        }
        pos.sort_by_key(|l| l.landmark_id);
        neg.sort_by_key(|l| l.landmark_id);
        (pos, neg)
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// `ValidationError` for bad dimension, scale or quantum, non-finite or
    /// wrong-length vectors, duplicate ids, unbalanced poles, a missing
    /// axis at either resolution, or a degenerate pair.
    pub fn validate(&self) -> CoreResult<()> {
        if self.dimension == 0 || self.dimension > MAX_EMBEDDING_DIMENSION {
            return Err(CoreError::validation(
                "dimension",
                format!("must be in 1..={}, got {}", MAX_EMBEDDING_DIMENSION, self.dimension),
            ));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(CoreError::validation("scale", "must be positive and finite"));
        }
        if !(self.coarse_quantum.is_finite() && self.coarse_quantum > 0.0) {
            return Err(CoreError::validation(
                "coarse_quantum",
                "must be positive and finite",
            ));
        }

        let mut ids = std::collections::HashSet::with_capacity(self.landmarks.len());
        for lm in &self.landmarks {
            if !ids.insert(lm.landmark_id) {
                return Err(CoreError::validation(
                    "landmarks",
                    format!("duplicate landmark_id {}", lm.landmark_id),
                ));
            }
            if lm.vector.len() != self.dimension {
                return Err(CoreError::DimensionMismatch {
                    expected: self.dimension,
                    actual: lm.vector.len(),
                });
            }
            if lm.vector.iter().any(|x| !x.is_finite()) {
                return Err(CoreError::validation(
                    "landmarks",
                    format!("landmark {} has a non-finite component", lm.landmark_id),
                ));
            }
        }

        for resolution in Resolution::ALL {
            for axis in Axis::ALL {
                let (pos, neg) = self.poles(resolution, axis);
                if pos.is_empty() || pos.len() != neg.len() {
                    return Err(CoreError::validation(
                        "landmarks",
                        format!(
                            "{:?}/{:?} needs balanced poles, got {} positive and {} negative",
                            resolution,
                            axis,
                            pos.len(),
                            neg.len()
                        ),
                    ));
                }
                for (p, n) in pos.iter().zip(neg.iter()) {
                    let span = self.metric.distance(&p.vector, &n.vector);
                    if !(span > MIN_PAIR_SPAN) {
                        return Err(CoreError::validation(
                            "landmarks",
                            format!(
                                "degenerate pair ({}, {}) on {:?}/{:?}",
                                p.landmark_id, n.landmark_id, resolution, axis
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_basis_dimension(dimension: usize) -> CoreResult<()> {
    if dimension < 3 || dimension > MAX_EMBEDDING_DIMENSION {
        return Err(CoreError::validation(
            "dimension",
            format!(
                "basis landmarks need 3..={} dimensions, got {}",
                MAX_EMBEDDING_DIMENSION, dimension
            ),
        ));
    }
    Ok(())
}

/// e1, e2, e3 in `dimension` dimensions. Caller checks `dimension >= 3`.
fn standard_basis(dimension: usize) -> [Vec<f32>; 3] {
    [0usize, 1, 2].map(|i| {
        let mut e = vec![0.0f32; dimension];
        e[i] = 1.0;
        e
    })
}

/// Gram-Schmidt step: remove the components of `v` along `basis` and
/// normalize. `None` when what remains is numerically zero.
fn orthogonalize(v: &[f32], basis: &[Vec<f32>]) -> Option<Vec<f32>> {
    let mut out = v.to_vec();
    for b in basis {
        let dot: f32 = out.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        for (o, bi) in out.iter_mut().zip(b.iter()) {
            *o -= dot * bi;
        }
    }
    let norm = l2_norm(&out);
    if !(norm > 1e-4 * l2_norm(v).max(f32::MIN_POSITIVE)) {
        return None;
    }
    out.iter_mut().for_each(|x| *x /= norm);
    Some(out)
}
