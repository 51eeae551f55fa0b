//! Sub-configuration structures for atomgraph components.
//!
//! This module contains the individual configuration structs that make up
//! the main `Config` structure. Every field has a serde default so partial
//! TOML files and environment overrides work.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;

/// RocksDB storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Database directory
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// Enable LZ4 compression on column families
    #[serde(default = "default_true")]
    pub compression: bool,

    /// Shared block cache size in megabytes
    #[serde(default = "default_cache_size_mb")]
    pub cache_size_mb: usize,

    /// Maximum open files (-1 = unlimited)
    #[serde(default = "default_max_open_files")]
    pub max_open_files: i32,

    /// fsync the WAL on every write
    #[serde(default)]
    pub sync_writes: bool,

    /// Open an existing database without write access
    #[serde(default)]
    pub read_only: bool,
}

fn default_storage_path() -> String {
    "./data/atomgraph".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_size_mb() -> usize {
    256
}

fn default_max_open_files() -> i32 {
    1000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            compression: true,
            cache_size_mb: default_cache_size_mb(),
            max_open_files: default_max_open_files(),
            sync_writes: false,
            read_only: false,
        }
    }
}

/// Atom storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AtomsConfig {
    /// Size in bytes of every inline value slot (minimum 32)
    #[serde(default = "default_inline_budget")]
    pub inline_budget: usize,

    /// Seconds an atom must stay at reference count 0 before reclamation
    #[serde(default = "default_reclaim_grace_secs")]
    pub reclaim_grace_secs: u64,

    /// Orphans examined per reclamation scan batch
    #[serde(default = "default_reclaim_batch_size")]
    pub reclaim_batch_size: usize,
}

fn default_inline_budget() -> usize {
    crate::codec::DEFAULT_INLINE_BUDGET
}

fn default_reclaim_grace_secs() -> u64 {
    300
}

fn default_reclaim_batch_size() -> usize {
    256
}

impl Default for AtomsConfig {
    fn default() -> Self {
        Self {
            inline_budget: default_inline_budget(),
            reclaim_grace_secs: default_reclaim_grace_secs(),
            reclaim_batch_size: default_reclaim_batch_size(),
        }
    }
}

/// Embedding space configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Native dimension of every vector in the space
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Stored vector width; vectors are zero-padded up to this
    #[serde(default = "default_padded_dimension")]
    pub padded_dimension: usize,

    /// Distance metric of the space
    #[serde(default)]
    pub metric: DistanceMetric,
}

fn default_dimension() -> usize {
    384
}

fn default_padded_dimension() -> usize {
    crate::types::MAX_EMBEDDING_DIMENSION
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            padded_dimension: default_padded_dimension(),
            metric: DistanceMetric::default(),
        }
    }
}

/// How the bootstrap landmark set is generated when none is persisted.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LandmarkBootstrap {
    /// Standard basis vectors e1, e2, e3
    Canonical,
    /// Random orthonormal basis from a seeded ChaCha8 generator
    #[default]
    Seeded,
}

/// Landmark projection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectionConfig {
    #[serde(default)]
    pub bootstrap: LandmarkBootstrap,

    /// Seed for `LandmarkBootstrap::Seeded`
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Output coordinates lie in [-scale, scale]
    #[serde(default = "default_scale")]
    pub scale: f32,

    /// Precision of coarse output coordinates
    #[serde(default = "default_coarse_quantum")]
    pub coarse_quantum: f32,

    /// Radii of the fine antipodal landmark pairs
    #[serde(default = "default_fine_radii")]
    pub fine_radii: Vec<f32>,

    /// Orthogonal directions per fine axis; the first is the coarse one.
    /// Capped at a third of the embedding dimension.
    #[serde(default = "default_fine_directions")]
    pub fine_directions: usize,
}

fn default_seed() -> u64 {
    0x5eed_a70b
}

fn default_scale() -> f32 {
    1.0
}

fn default_coarse_quantum() -> f32 {
    1.0 / 64.0
}

fn default_fine_radii() -> Vec<f32> {
    vec![1.0, 0.5]
}

fn default_fine_directions() -> usize {
    3
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            bootstrap: LandmarkBootstrap::default(),
            seed: default_seed(),
            scale: default_scale(),
            coarse_quantum: default_coarse_quantum(),
            fine_radii: default_fine_radii(),
            fine_directions: default_fine_directions(),
        }
    }
}

/// Spatial grid index configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Edge length of one grid cell in coordinate units
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
}

fn default_cell_size() -> f32 {
    0.125
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
        }
    }
}

/// Hybrid search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Spatial candidates gathered per requested result
    #[serde(default = "default_oversample_factor")]
    pub oversample_factor: usize,

    /// Floor on the spatial candidate target
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,

    /// Share of the index every query reranks at least, in [0, 1]
    #[serde(default = "default_min_candidate_fraction")]
    pub min_candidate_fraction: f32,

    /// First radius tried by the coarse filter
    #[serde(default = "default_initial_radius")]
    pub initial_radius: f32,

    /// Multiplier applied on every widening
    #[serde(default = "default_radius_growth")]
    pub radius_growth: f32,

    #[serde(default = "default_max_widenings")]
    pub max_widenings: u32,

    /// Candidate count above which reranking runs on rayon
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_oversample_factor() -> usize {
    10
}

fn default_min_candidates() -> usize {
    64
}

fn default_min_candidate_fraction() -> f32 {
    0.05
}

fn default_initial_radius() -> f32 {
    0.1
}

fn default_radius_growth() -> f32 {
    2.0
}

fn default_max_widenings() -> u32 {
    6
}

fn default_parallel_threshold() -> usize {
    2048
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            oversample_factor: default_oversample_factor(),
            min_candidates: default_min_candidates(),
            min_candidate_fraction: default_min_candidate_fraction(),
            initial_radius: default_initial_radius(),
            radius_growth: default_radius_growth(),
            max_widenings: default_max_widenings(),
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    #[serde(default = "default_level")]
    pub level: String,

    /// "pretty", "compact" or "json"
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default)]
    pub include_location: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            include_location: false,
        }
    }
}
