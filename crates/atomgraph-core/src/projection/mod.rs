//! Landmark trilateration: 3-D coordinates for high-dimensional vectors.
//!
//! A [`LandmarkSet`] holds antipodal landmark pairs, one or more per axis
//! and resolution. [`LandmarkProjector`] places a vector on each axis by
//! comparing its distance to the negative and positive pole:
//!
//! ```text
//! coord = scale * clamp(mean_pairs((d(v, neg) - d(v, pos)) / d(pos, neg)), -1, 1)
//! ```
//!
//! Each pair term is `2 / d(pos, neg)`-Lipschitz under a Euclidean metric,
//! so nearby vectors stay nearby in the projected space. The converse does
//! not hold; search compensates by oversampling and exact reranking.

mod landmarks;
mod projector;

pub use landmarks::{Landmark, LandmarkSet, ProjectionParams};
pub use projector::LandmarkProjector;

use serde::{Deserialize, Serialize};

/// Which landmark subset a coordinate was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// One pair per axis, quantized output. Indexed spatially.
    Coarse,
    /// Denser overdetermined pairs, unquantized. Used for narrowing.
    Fine,
}

impl Resolution {
    pub const ALL: [Resolution; 2] = [Resolution::Coarse, Resolution::Fine];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Coarse => 0,
            Self::Fine => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// Side of an antipodal pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pole {
    Positive,
    Negative,
}
