//! Embeddings and 3-D coordinates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::atom::AtomId;
use crate::error::{CoreError, CoreResult};

/// Surrogate key of an embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmbeddingId(pub u64);

impl EmbeddingId {
    #[inline]
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for EmbeddingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "embedding:{}", self.0)
    }
}

/// Point in the projected 3-D space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialCoord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SpatialCoord {
    pub const ORIGIN: SpatialCoord = SpatialCoord {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn as_array(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn from_array(a: [f32; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    /// Euclidean distance between two points.
    #[inline]
    pub fn distance(&self, other: &SpatialCoord) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Persisted embedding row. The vector is stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub embedding_id: EmbeddingId,
    pub atom_id: AtomId,
    pub embedding_type: String,
    pub model_id: String,
    /// True (unpadded) dimension of the vector
    pub dimension: usize,
    pub coord_coarse: SpatialCoord,
    pub coord_fine: SpatialCoord,
    /// Landmark set the coordinates were derived from
    pub landmark_version: u32,
    pub created_at: DateTime<Utc>,
}

/// An embedding with its vector loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub record: EmbeddingRecord,
    /// Native-dimension vector, padding removed
    pub vector: Vec<f32>,
}

/// Result of `EmbeddingStore::attach`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbeddingRef {
    pub embedding_id: EmbeddingId,
    pub atom_id: AtomId,
    pub coord_coarse: SpatialCoord,
    pub coord_fine: SpatialCoord,
    pub landmark_version: u32,
    /// True when an existing (atom, embedding_type) row was overwritten
    pub replaced: bool,
}

/// Check a vector against the space dimension and reject NaN/Infinity.
pub fn validate_vector(vector: &[f32], expected_dim: usize) -> CoreResult<()> {
    if vector.len() != expected_dim {
        return Err(CoreError::DimensionMismatch {
            expected: expected_dim,
            actual: vector.len(),
        });
    }
    if let Some(i) = vector.iter().position(|x| !x.is_finite()) {
        return Err(CoreError::validation(
            "vector",
            format!("non-finite value {} at index {}", vector[i], i),
        ));
    }
    Ok(())
}
