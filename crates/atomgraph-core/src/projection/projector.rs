//! Trilateration projector.

use std::sync::Arc;

use tracing::debug;

use super::{Axis, LandmarkSet, Resolution};
use crate::distance::DistanceMetric;
use crate::error::{CoreError, CoreResult};
use crate::types::{validate_vector, SpatialCoord};

#[derive(Debug, Clone, Copy)]
struct PolePair {
    pos: usize,
    neg: usize,
    /// d(pos, neg), precomputed
    span: f32,
}

/// Projects vectors of one embedding space into 3-D coordinates.
///
/// Pure and deterministic: the same vector and landmark set always yield
/// the same coordinate. Cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct LandmarkProjector {
    set: Arc<LandmarkSet>,
    /// `pairs[resolution][axis]`
    pairs: [[Vec<PolePair>; 3]; 2],
}

impl LandmarkProjector {
    /// Pair landmarks positive-with-negative per resolution and axis, in
    /// landmark id order.
    ///
    /// # Errors
    ///
    /// Whatever [`LandmarkSet::validate`] rejects.
    pub fn new(set: Arc<LandmarkSet>) -> CoreResult<Self> {
        set.validate()?;

        let index_of = |id: u32| -> CoreResult<usize> {
            set.landmarks
                .iter()
                .position(|l| l.landmark_id == id)
                .ok_or_else(|| CoreError::Internal(format!("landmark {} vanished", id)))
        };

        let mut pairs: [[Vec<PolePair>; 3]; 2] = Default::default();
        for resolution in Resolution::ALL {
            for axis in Axis::ALL {
                let (pos, neg) = set.poles(resolution, axis);
                let mut axis_pairs = Vec::with_capacity(pos.len());
                for (p, n) in pos.iter().zip(neg.iter()) {
                    axis_pairs.push(PolePair {
                        pos: index_of(p.landmark_id)?,
                        neg: index_of(n.landmark_id)?,
                        span: set.metric.distance(&p.vector, &n.vector),
                    });
                }
                pairs[resolution.index()][axis.index()] = axis_pairs;
            }
        }

        debug!(
            version = set.version,
            dimension = set.dimension,
            metric = %set.metric,
            coarse_pairs = pairs[0][0].len(),
            fine_pairs = pairs[1][0].len(),
            "Built landmark projector"
        );
        Ok(Self { set, pairs })
    }

    #[inline]
    pub fn landmark_set(&self) -> &Arc<LandmarkSet> {
        &self.set
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.set.version
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.set.dimension
    }

    #[inline]
    pub fn metric(&self) -> DistanceMetric {
        self.set.metric
    }

    /// Half-width of the output cube.
    #[inline]
    pub fn scale(&self) -> f32 {
        self.set.scale
    }

    /// Project `vector` at one resolution.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` when `vector.len()` differs from the set
    /// - `ValidationError` on NaN or Infinity
    pub fn project(&self, vector: &[f32], resolution: Resolution) -> CoreResult<SpatialCoord> {
        validate_vector(vector, self.set.dimension)?;
        Ok(self.project_unchecked(vector, resolution))
    }

    /// Project at both resolutions, validating once.
    pub fn project_both(&self, vector: &[f32]) -> CoreResult<(SpatialCoord, SpatialCoord)> {
        validate_vector(vector, self.set.dimension)?;
        Ok((
            self.project_unchecked(vector, Resolution::Coarse),
            self.project_unchecked(vector, Resolution::Fine),
        ))
    }

    fn project_unchecked(&self, vector: &[f32], resolution: Resolution) -> SpatialCoord {
        let metric = self.set.metric;
        let scale = self.set.scale;
        let mut out = [0.0f32; 3];

        for axis in Axis::ALL {
            let pairs = &self.pairs[resolution.index()][axis.index()];
            let mut acc = 0.0f32;
            for pair in pairs {
                let d_pos = metric.distance(vector, &self.set.landmarks[pair.pos].vector);
                let d_neg = metric.distance(vector, &self.set.landmarks[pair.neg].vector);
                acc += (d_neg - d_pos) / pair.span;
            }
            let mean = acc / pairs.len().max(1) as f32;
            out[axis.index()] = scale * mean.clamp(-1.0, 1.0);
        }

        if resolution == Resolution::Coarse {
            let q = self.set.coarse_quantum;
            for c in out.iter_mut() {
                *c = ((*c / q).round() * q).clamp(-scale, scale);
            }
        }

        SpatialCoord::from_array(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ProjectionParams;

    fn canonical(dim: usize, metric: DistanceMetric) -> LandmarkProjector {
        LandmarkProjector::new(Arc::new(LandmarkSet::canonical(1, dim, metric).unwrap())).unwrap()
    }

    #[test]
    fn test_canonical_basis_extreme_coordinate() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::Euclidean] {
            let projector = canonical(16, metric);
            let mut e1 = vec![0.0f32; 16];
            e1[0] = 1.0;

            let c = projector.project(&e1, Resolution::Coarse).unwrap();
            println!("=== TEST e1 {:?} coarse -> {:?}", metric, c);
            assert!((c.x - projector.scale()).abs() < 1e-5, "x must be +scale");
            assert!(c.y.abs() < 1e-5, "y must be 0");
            assert!(c.z.abs() < 1e-5, "z must be 0");

            // Fine x averages e1, e4 and e7: only the first agrees
            let f = projector.project(&e1, Resolution::Fine).unwrap();
            assert!((f.x - projector.scale() / 3.0).abs() < 1e-5, "fine x was {}", f.x);
            assert!(f.y.abs() < 1e-5 && f.z.abs() < 1e-5);
        }
    }

    #[test]
    fn test_fine_sees_directions_coarse_ignores() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::Euclidean] {
            let projector = canonical(16, metric);
            let mut e4 = vec![0.0f32; 16];
            e4[3] = 1.0;
            let mut e5 = vec![0.0f32; 16];
            e5[4] = 1.0;

            let (coarse4, fine4) = projector.project_both(&e4).unwrap();
            let (coarse5, fine5) = projector.project_both(&e5).unwrap();
            println!("=== TEST e4 {:?} -> {:?} / {:?}", metric, coarse4, fine4);

            // Both are orthogonal to the coarse basis and collapse to the origin
            assert_eq!(coarse4, SpatialCoord::ORIGIN);
            assert_eq!(coarse5, SpatialCoord::ORIGIN);

            // Fine keeps them apart: e4 lands on x, e5 on y
            assert!((fine4.x - projector.scale() / 3.0).abs() < 1e-5);
            assert!(fine4.y.abs() < 1e-5);
            assert!((fine5.y - projector.scale() / 3.0).abs() < 1e-5);
            assert!(fine4.distance(&fine5) > 0.4);
        }
    }

    #[test]
    fn test_projection_is_deterministic() {
        let projector = LandmarkProjector::new(Arc::new(
            LandmarkSet::seeded(3, 64, DistanceMetric::Cosine, 7).unwrap(),
        ))
        .unwrap();
        let v: Vec<f32> = (0..64).map(|i| ((i * 37) % 11) as f32 - 5.0).collect();

        let a = projector.project_both(&v).unwrap();
        let b = projector.project_both(&v).unwrap();
        assert_eq!(a, b);
        assert_eq!(projector.version(), 3);
    }

    #[test]
    fn test_output_within_scale() {
        let params = ProjectionParams {
            scale: 10.0,
            coarse_quantum: 0.5,
            fine_radii: vec![1.0, 0.25],
            fine_directions: 3,
        };
        let basis = [
            vec![1.0, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 1.0, 1.0],
        ];
        let set = LandmarkSet::from_basis(1, DistanceMetric::Euclidean, basis, &params).unwrap();
        let projector = LandmarkProjector::new(Arc::new(set)).unwrap();

        let far = vec![100.0, -40.0, 3.0, 7.0, -90.0];
        let coarse = projector.project(&far, Resolution::Coarse).unwrap();
        let fine = projector.project(&far, Resolution::Fine).unwrap();
        for c in coarse.as_array().iter().chain(fine.as_array().iter()) {
            assert!(c.abs() <= 10.0 + 1e-4);
        }
        // Coarse output sits on the quantization grid
        for c in coarse.as_array() {
            let steps = c / 0.5;
            assert!((steps - steps.round()).abs() < 1e-4);
        }
    }

    #[test]
    fn test_cosine_coordinates_are_normalized_components() {
        let projector = canonical(4, DistanceMetric::Cosine);
        let v = [3.0f32, 4.0, 0.0, 0.0];
        let fine = projector.project(&v, Resolution::Fine).unwrap();
        assert!((fine.x - 0.6).abs() < 1e-5);
        assert!((fine.y - 0.8).abs() < 1e-5);
        assert!(fine.z.abs() < 1e-5);
    }

    #[test]
    fn test_dimension_mismatch() {
        let projector = canonical(8, DistanceMetric::Cosine);
        let err = projector.project(&[0.0; 7], Resolution::Coarse).unwrap_err();
        assert!(matches!(
            err,
            CoreError::DimensionMismatch {
                expected: 8,
                actual: 7
            }
        ));
    }

    #[test]
    fn edge_case_zero_vector_projects_to_origin() {
        let projector = canonical(8, DistanceMetric::Cosine);
        let c = projector.project(&[0.0; 8], Resolution::Coarse).unwrap();
        assert_eq!(c, SpatialCoord::ORIGIN);
    }

    #[test]
    fn test_nearby_vectors_stay_nearby() {
        let projector = canonical(8, DistanceMetric::Euclidean);
        let a = [0.2f32, -0.1, 0.4, 0.0, 0.1, 0.0, 0.0, 0.3];
        let mut b = a;
        b[2] += 0.01;
        let ca = projector.project(&a, Resolution::Fine).unwrap();
        let cb = projector.project(&b, Resolution::Fine).unwrap();
        let far = projector
            .project(&[-0.9f32, 0.0, -0.4, 0.0, 0.0, 0.0, 0.0, 0.0], Resolution::Fine)
            .unwrap();
        assert!(ca.distance(&cb) < ca.distance(&far));
    }
}
