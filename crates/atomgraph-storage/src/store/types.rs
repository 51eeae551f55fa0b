//! Types, errors, and configuration for RocksDbAtomStore.
//!
//! # FAIL FAST Policy
//!
//! All error types include detailed context for immediate debugging:
//! - Operation name
//! - Column family
//! - Key (if applicable)
//! - Underlying cause

use std::time::Duration;

use atomgraph_core::config::{Config, ProjectionConfig};
use atomgraph_core::distance::DistanceMetric;
use atomgraph_core::error::CoreError;
use atomgraph_core::types::{hex_encode, AtomId, AtomMetadata, ContentDigest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Detailed error type for RocksDB store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// RocksDB operation failed.
    #[error("RocksDB {operation} failed on CF '{cf}' with key '{key:?}': {source}")]
    RocksDbOperation {
        operation: &'static str,
        cf: &'static str,
        key: Option<String>,
        #[source]
        source: rocksdb::Error,
    },

    /// Database failed to open.
    #[error("Failed to open RocksDB at '{path}': {message}")]
    OpenFailed { path: String, message: String },

    /// Column family not found.
    #[error("Column family '{name}' not found in database")]
    ColumnFamilyNotFound { name: String },

    /// Checkpoint operation failed.
    #[error("Checkpoint operation failed: {message}")]
    CheckpointFailed { message: String },

    /// Internal error (should never happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Create a RocksDB operation error.
    pub fn rocksdb_op(
        operation: &'static str,
        cf: &'static str,
        key: Option<&[u8]>,
        source: rocksdb::Error,
    ) -> Self {
        Self::RocksDbOperation {
            operation,
            cf,
            key: key.map(hex_encode),
            source,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Internal(msg) => CoreError::Internal(msg),
            other => CoreError::StorageError(other.to_string()),
        }
    }
}

/// Result type for store-internal operations.
pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Persisted atom row
// ============================================================================

/// Row stored in the `atoms` column family.
///
/// The overflow payload (if any) lives in `atom_overflow` under the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomRecord {
    pub atom_id: AtomId,
    pub content_digest: ContentDigest,
    pub inline_value: Vec<u8>,
    pub modality: String,
    pub subtype: Option<String>,
    pub reference_count: u64,
    pub metadata: AtomMetadata,
    pub created_at: DateTime<Utc>,
    pub orphaned_since: Option<DateTime<Utc>>,
}

impl AtomRecord {
    /// Orphaned for at least `grace` as of `now`.
    pub fn is_reclaimable(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        if self.reference_count != 0 {
            return false;
        }
        let Some(since) = self.orphaned_since else {
            return false;
        };
        match chrono::Duration::from_std(grace) {
            Ok(grace) => since + grace <= now,
            Err(_) => false,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for RocksDbAtomStore.
#[derive(Debug, Clone)]
pub struct AtomStoreConfig {
    /// Block cache size in bytes (default: 256MB).
    pub block_cache_size: usize,
    /// Maximum number of open files (default: 1000).
    pub max_open_files: i32,
    /// LZ4 compression on data column families (default: true).
    pub compression: bool,
    /// fsync the WAL on each write batch (default: false).
    pub sync_writes: bool,
    /// Create database if it doesn't exist (default: true).
    pub create_if_missing: bool,
    /// Open without write access; every mutation fails (default: false).
    pub read_only: bool,
    /// Inline slot size in bytes (default: 64).
    pub inline_budget: usize,
    /// How long an atom stays at count 0 before reclamation may delete it.
    pub reclaim_grace: Duration,
    /// Orphans examined per reclamation page.
    pub reclaim_batch_size: usize,
    /// Native dimension of the embedding space.
    pub dimension: usize,
    /// Stored vector width.
    pub padded_dimension: usize,
    pub metric: DistanceMetric,
    /// Bootstrap landmark set, used when the database has none.
    pub projection: ProjectionConfig,
    /// Spatial grid cell edge length.
    pub cell_size: f32,
}

impl Default for AtomStoreConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl AtomStoreConfig {
    /// Derive store settings from the application configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            block_cache_size: config.storage.cache_size_mb * 1024 * 1024,
            max_open_files: config.storage.max_open_files,
            compression: config.storage.compression,
            sync_writes: config.storage.sync_writes,
            create_if_missing: true,
            read_only: config.storage.read_only,
            inline_budget: config.atoms.inline_budget,
            reclaim_grace: Duration::from_secs(config.atoms.reclaim_grace_secs),
            reclaim_batch_size: config.atoms.reclaim_batch_size,
            dimension: config.embedding.dimension,
            padded_dimension: config.embedding.padded_dimension,
            metric: config.embedding.metric,
            projection: config.projection.clone(),
            cell_size: config.index.cell_size,
        }
    }

    /// Convenience for tests and tools: small space, default everything else.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            padded_dimension: dimension,
            ..Self::default()
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Options of one reclamation run.
#[derive(Debug, Clone, Copy)]
pub struct ReclaimOptions {
    pub grace: Duration,
    pub batch_size: usize,
}

/// Outcome of one reclamation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Atom rows examined
    pub scanned: usize,
    /// Atoms deleted
    pub reclaimed: usize,
    /// Candidates re-referenced before their delete
    pub skipped_live: usize,
    /// Stopped early by the caller's stop flag
    pub interrupted: bool,
}

/// Store-wide counters from a full scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub atoms: usize,
    pub overflow_atoms: usize,
    pub orphans: usize,
    pub total_references: u64,
    pub embeddings: usize,
}

/// Outcome of installing a new landmark set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReprojectionReport {
    pub from_version: u32,
    pub to_version: u32,
    pub reprojected: usize,
    pub elapsed_ms: u64,
}
