//! Shared setup for atomgraph-storage integration tests.
//!
//! Real RocksDB in temp directories and seeded data. NO MOCKS.

#![allow(dead_code)]

use std::time::Duration;

use atomgraph_core::config::LoggingConfig;
use atomgraph_core::logging::init_logging;
use atomgraph_core::projection::{Axis, Resolution};
use atomgraph_storage::{AtomStoreConfig, LandmarkSet, RocksDbAtomStore};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

pub const DIM: usize = 32;

/// Quiet by default; RUST_LOG overrides. Later calls are no-ops.
pub fn init_test_logging() {
    let config = LoggingConfig {
        level: "warn".to_string(),
        format: "compact".to_string(),
        include_location: false,
    };
    let _ = init_logging(&config);
}

pub fn test_config() -> AtomStoreConfig {
    AtomStoreConfig {
        reclaim_grace: Duration::ZERO,
        ..AtomStoreConfig::with_dimension(DIM)
    }
}

pub fn create_test_store(temp_dir: &TempDir) -> RocksDbAtomStore {
    init_test_logging();
    RocksDbAtomStore::open_with_config(temp_dir.path(), test_config())
        .expect("Failed to open RocksDB atom store")
}

pub fn reopen(temp_dir: &TempDir) -> RocksDbAtomStore {
    RocksDbAtomStore::open_with_config(temp_dir.path(), test_config())
        .expect("Failed to reopen RocksDB atom store")
}

// =============================================================================
// Seeded data generation
// =============================================================================

pub fn random_unit_vector(rng: &mut ChaCha8Rng, dim: usize) -> Vec<f32> {
    let mut v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    normalize(&mut v);
    v
}

pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Positive coarse pole of each axis: the orthonormal basis the set was built on.
pub fn landmark_basis(set: &LandmarkSet) -> [Vec<f32>; 3] {
    let pole = |axis: Axis| -> Vec<f32> {
        let (positive, _) = set.poles(Resolution::Coarse, axis);
        positive[0].vector.clone()
    };
    [pole(Axis::X), pole(Axis::Y), pole(Axis::Z)]
}

/// Unit vector lying close to the span of `basis`.
///
/// Low intrinsic dimension: three free coordinates plus `noise` per component.
pub fn near_subspace_vector(rng: &mut ChaCha8Rng, basis: &[Vec<f32>; 3], noise: f32) -> Vec<f32> {
    let dim = basis[0].len();
    let weights: [f32; 3] = [
        rng.gen_range(-1.0f32..1.0),
        rng.gen_range(-1.0f32..1.0),
        rng.gen_range(-1.0f32..1.0),
    ];
    let mut v: Vec<f32> = (0..dim)
        .map(|i| {
            weights[0] * basis[0][i]
                + weights[1] * basis[1][i]
                + weights[2] * basis[2][i]
                + rng.gen_range(-noise..noise)
        })
        .collect();
    normalize(&mut v);
    v
}

/// Unit vector within `noise` per component of `centroid`.
pub fn jitter(rng: &mut ChaCha8Rng, centroid: &[f32], noise: f32) -> Vec<f32> {
    let mut v: Vec<f32> = centroid
        .iter()
        .map(|c| c + rng.gen_range(-noise..noise))
        .collect();
    normalize(&mut v);
    v
}

pub fn text(i: usize) -> Vec<u8> {
    format!("atom content #{i}").into_bytes()
}
