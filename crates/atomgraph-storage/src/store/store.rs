//! Core RocksDbAtomStore struct and constructor.
//!
//! This module contains the store struct, open, id counters, landmark
//! bootstrap, index rebuild and operational methods. Data operations are in
//! separate modules:
//! - `atoms.rs` - put / get / release / metadata
//! - `reclaim.rs` - orphan reclamation
//! - `embeddings.rs` - attach and embedding lookups
//! - `landmarks.rs` - landmark installation and re-projection

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use rocksdb::{Cache, ColumnFamily, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use tracing::{debug, error, info, warn};

use atomgraph_core::codec::FingerprintCodec;
use atomgraph_core::config::{EmbeddingConfig, SearchConfig};
use atomgraph_core::error::{CoreError, CoreResult};
use atomgraph_core::projection::{LandmarkProjector, LandmarkSet};
use atomgraph_core::types::{
    AtomId, ContentDigest, EmbeddingId, EmbeddingRecord, OverflowPayload, MAX_EMBEDDING_DIMENSION,
};

use crate::column_families::{cf_names, get_column_family_descriptors};
use crate::index::{IndexEntry, SpatialIndex};
use crate::policy::DeduplicationPolicyEngine;
use crate::schema::{
    atom_key, digest_key, embedding_key, landmark_key, parse_atom_key, parse_u32_be, parse_u64_be,
    ACTIVE_LANDMARK_VERSION_KEY, NEXT_ATOM_ID_KEY, NEXT_EMBEDDING_ID_KEY,
};
use crate::search::HybridSearchEngine;
use crate::serialization::{
    deserialize_atom_record, deserialize_embedding_record, deserialize_landmark_set,
    deserialize_overflow, deserialize_vector, serialize_embedding_record, serialize_landmark_set,
};

use super::types::{AtomRecord, AtomStoreConfig, StoreError, StoreResult, StoreStats};

/// Number of striped mutexes guarding per-digest writes.
pub const LOCK_STRIPES: usize = 64;

/// Embedding rows rewritten per batch during re-projection.
pub(crate) const REPROJECT_BATCH: usize = 512;

// ============================================================================
// Main Store Struct
// ============================================================================

/// RocksDB-backed storage for atoms and their embeddings.
///
/// Implements `AtomStore` and `EmbeddingStore`, and serves vectors to
/// `HybridSearchEngine` through `VectorSource`.
///
/// # Thread Safety
///
/// - RocksDB handles internal locking for reads/writes
/// - Writers for one content digest serialize on a striped mutex
/// - The spatial index is protected by a `parking_lot::RwLock`
/// - Landmark installation excludes `attach` and reclamation via `maintenance`
///
/// # Example
///
/// ```ignore
/// use atomgraph_storage::RocksDbAtomStore;
/// use atomgraph_core::{AtomStore, AtomMetadata};
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let store = RocksDbAtomStore::open(tmp.path()).unwrap();
///
/// let first = store.put(b"hello", "text", None, AtomMetadata::default()).unwrap();
/// let second = store.put(b"hello", "text", None, AtomMetadata::default()).unwrap();
/// assert_eq!(first.atom_id, second.atom_id);
/// assert_eq!(second.reference_count, 2);
/// ```
pub struct RocksDbAtomStore {
    /// The RocksDB database instance.
    pub(crate) db: Arc<DB>,
    /// Shared block cache across column families.
    #[allow(dead_code)]
    pub(crate) cache: Cache,
    /// Database path.
    pub(crate) path: PathBuf,
    pub(crate) config: AtomStoreConfig,
    pub(crate) codec: FingerprintCodec,
    /// Per-digest write serialization.
    pub(crate) stripes: Vec<Mutex<()>>,
    pub(crate) next_atom_id: AtomicU64,
    pub(crate) next_embedding_id: AtomicU64,
    /// Spatial index over coarse coordinates, owning the active projector.
    pub(crate) index: Arc<SpatialIndex>,
    /// Read: attach, reclaim. Write: landmark installation.
    pub(crate) maintenance: RwLock<()>,
    /// The only policy engine over `db`; its lock orders activations.
    pub(crate) policies: Arc<DeduplicationPolicyEngine>,
}

impl std::fmt::Debug for RocksDbAtomStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbAtomStore")
            .field("path", &self.path)
            .field("next_atom_id", &self.next_atom_id.load(Ordering::SeqCst))
            .field("next_embedding_id", &self.next_embedding_id.load(Ordering::SeqCst))
            .field("index", &self.index)
            .finish()
    }
}

// ============================================================================
// Constructor and Open Methods
// ============================================================================

impl RocksDbAtomStore {
    /// Open a store at the specified path with default configuration.
    ///
    /// Creates the database and all column families if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        Self::open_with_config(path, AtomStoreConfig::default())
    }

    /// Open a store with custom configuration.
    ///
    /// On open:
    /// 1. Id counters resume past every persisted id
    /// 2. The active landmark set is loaded, or the bootstrap set is persisted
    /// 3. The spatial index is rebuilt from the `embeddings` column family;
    ///    rows projected with an older landmark set are re-projected
    ///
    /// With `read_only`, the database must already exist with a landmark set
    /// and every write (including re-projection) fails.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: AtomStoreConfig) -> CoreResult<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let path_str = path_buf.to_string_lossy().to_string();

        info!(
            "Opening RocksDbAtomStore at '{}' with cache_size={}MB",
            path_str,
            config.block_cache_size / (1024 * 1024)
        );

        Self::validate_config(&config)?;
        let codec = FingerprintCodec::new(config.inline_budget)?;

        // Create shared block cache
        let cache = Cache::new_lru_cache(config.block_cache_size);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(config.create_if_missing);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(config.max_open_files);

        let cf_descriptors = get_column_family_descriptors(&cache, config.compression);
        debug!(
            "Opening database with {} column families",
            cf_descriptors.len()
        );

        let opened = if config.read_only {
            DB::open_cf_descriptors_read_only(&db_opts, &path_str, cf_descriptors, false)
        } else {
            DB::open_cf_descriptors(&db_opts, &path_str, cf_descriptors)
        };
        let db = opened.map_err(|e| {
            error!("FAIL FAST: Failed to open RocksDB at '{}': {}", path_str, e);
            StoreError::OpenFailed {
                path: path_str.clone(),
                message: e.to_string(),
            }
        })?;

        let next_atom_id = resume_counter(&db, cf_names::ATOMS, NEXT_ATOM_ID_KEY)?;
        let next_embedding_id = resume_counter(&db, cf_names::EMBEDDINGS, NEXT_EMBEDDING_ID_KEY)?;

        let landmarks = load_or_bootstrap_landmarks(&db, &config)?;
        let projector = Arc::new(LandmarkProjector::new(landmarks)?);
        let index = Arc::new(SpatialIndex::new(Arc::clone(&projector), config.cell_size)?);

        let db = Arc::new(db);
        let policies = Arc::new(DeduplicationPolicyEngine::new(Arc::clone(&db)));
        let store = Self {
            db,
            cache,
            path: path_buf,
            config,
            codec,
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            next_atom_id: AtomicU64::new(next_atom_id),
            next_embedding_id: AtomicU64::new(next_embedding_id),
            index,
            maintenance: RwLock::new(()),
            policies,
        };

        // The index is in-memory; without this every restart starts empty
        let (entries, repaired) = store.project_all(&projector)?;
        store.index.replace(projector, entries);
        if repaired > 0 {
            warn!(
                "Re-projected {} embeddings left on an older landmark set",
                repaired
            );
        }

        info!(
            path = %path_str,
            read_only = store.config.read_only,
            next_atom_id,
            next_embedding_id,
            indexed = store.index.len(),
            landmark_version = store.index.projector().version(),
            "Successfully opened RocksDbAtomStore"
        );
        Ok(store)
    }

    fn validate_config(config: &AtomStoreConfig) -> CoreResult<()> {
        if config.dimension == 0 || config.dimension > MAX_EMBEDDING_DIMENSION {
            return Err(CoreError::ConfigError(format!(
                "dimension must be in 1..={}, got {}",
                MAX_EMBEDDING_DIMENSION, config.dimension
            )));
        }
        if config.padded_dimension < config.dimension {
            return Err(CoreError::ConfigError(format!(
                "padded_dimension {} is smaller than dimension {}",
                config.padded_dimension, config.dimension
            )));
        }
        if config.reclaim_batch_size == 0 {
            return Err(CoreError::ConfigError(
                "reclaim_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Next id for a counter: past both the persisted value and the highest key.
fn resume_counter(db: &DB, data_cf: &'static str, counter_key: &[u8]) -> CoreResult<u64> {
    let system = cf_handle(db, cf_names::SYSTEM)?;
    let persisted = match db
        .get_cf(system, counter_key)
        .map_err(|e| StoreError::rocksdb_op("get", cf_names::SYSTEM, Some(counter_key), e))?
    {
        Some(bytes) => parse_u64_be(&bytes)?,
        None => 1,
    };

    let data = cf_handle(db, data_cf)?;
    let last_key = match db.iterator_cf(data, IteratorMode::End).next() {
        Some(item) => {
            let (key, _) = item.map_err(|e| StoreError::rocksdb_op("iterate", data_cf, None, e))?;
            parse_u64_be(&key)? + 1
        }
        None => 1,
    };

    Ok(persisted.max(last_key))
}

/// Active landmark set, persisting the configured bootstrap set when the
/// database has none.
fn load_or_bootstrap_landmarks(db: &DB, config: &AtomStoreConfig) -> CoreResult<Arc<LandmarkSet>> {
    let system = cf_handle(db, cf_names::SYSTEM)?;
    let landmarks = cf_handle(db, cf_names::LANDMARKS)?;

    let active = db
        .get_cf(system, ACTIVE_LANDMARK_VERSION_KEY)
        .map_err(|e| {
            StoreError::rocksdb_op("get", cf_names::SYSTEM, Some(ACTIVE_LANDMARK_VERSION_KEY), e)
        })?;

    let set = match active {
        Some(bytes) => {
            let version = parse_u32_be(&bytes)?;
            let key = landmark_key(version);
            let data = db
                .get_cf(landmarks, key)
                .map_err(|e| StoreError::rocksdb_op("get", cf_names::LANDMARKS, Some(&key[..]), e))?
                .ok_or_else(|| {
                    error!(
                        "FAIL FAST: active landmark version {} has no stored set",
                        version
                    );
                    CoreError::IntegrityViolation(format!(
                        "active landmark set {} missing from '{}'",
                        version,
                        cf_names::LANDMARKS
                    ))
                })?;
            let set = deserialize_landmark_set(&data)?;
            debug!(version, "Loaded active landmark set");
            set
        }
        None if config.read_only => {
            error!("FAIL FAST: read-only store has no active landmark set");
            return Err(CoreError::ConfigError(
                "read-only store has no landmark set; open it writable once first".to_string(),
            ));
        }
        None => {
            let embedding = EmbeddingConfig {
                dimension: config.dimension,
                padded_dimension: config.padded_dimension,
                metric: config.metric,
            };
            let set = LandmarkSet::from_config(1, &embedding, &config.projection)?;
            let mut batch = WriteBatch::default();
            batch.put_cf(landmarks, landmark_key(set.version), serialize_landmark_set(&set)?);
            batch.put_cf(system, ACTIVE_LANDMARK_VERSION_KEY, set.version.to_be_bytes());
            db.write(batch).map_err(|e| {
                error!("FAIL FAST: Failed to persist bootstrap landmark set: {}", e);
                StoreError::rocksdb_op("write_batch", cf_names::LANDMARKS, None, e)
            })?;
            info!(
                version = set.version,
                bootstrap = ?config.projection.bootstrap,
                "Persisted bootstrap landmark set"
            );
            set
        }
    };

    if set.dimension != config.dimension || set.metric != config.metric {
        error!(
            "FAIL FAST: stored landmark set is {}-dim {}, configuration is {}-dim {}",
            set.dimension, set.metric, config.dimension, config.metric
        );
        return Err(CoreError::ConfigError(format!(
            "landmark set v{} is {}-dimensional ({}), store configured for {} ({})",
            set.version, set.dimension, set.metric, config.dimension, config.metric
        )));
    }

    Ok(Arc::new(set))
}

fn cf_handle<'a>(db: &'a DB, name: &str) -> StoreResult<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::ColumnFamilyNotFound {
            name: name.to_string(),
        })
}

// ============================================================================
// Column Family Accessors and Low-Level Helpers
// ============================================================================

impl RocksDbAtomStore {
    /// Get a column family handle by name.
    pub(crate) fn get_cf(&self, name: &str) -> StoreResult<&ColumnFamily> {
        cf_handle(&self.db, name)
    }

    pub(crate) fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    /// Commit a batch. `cf` names the primary family for error context.
    pub(crate) fn commit(&self, batch: WriteBatch, cf: &'static str) -> StoreResult<()> {
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| StoreError::rocksdb_op("write_batch", cf, None, e))
    }

    /// Lock the stripe owning `digest`.
    pub(crate) fn lock_digest(&self, digest: &ContentDigest) -> MutexGuard<'_, ()> {
        self.stripes[digest.stripe(self.stripes.len())].lock()
    }

    pub(crate) fn allocate_atom_id(&self) -> AtomId {
        AtomId(self.next_atom_id.fetch_add(1, Ordering::SeqCst))
    }

    pub(crate) fn allocate_embedding_id(&self) -> EmbeddingId {
        EmbeddingId(self.next_embedding_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Record both id counters in `batch`.
    pub(crate) fn put_counters(&self, batch: &mut WriteBatch) -> StoreResult<()> {
        let system = self.get_cf(cf_names::SYSTEM)?;
        batch.put_cf(
            system,
            NEXT_ATOM_ID_KEY,
            self.next_atom_id.load(Ordering::SeqCst).to_be_bytes(),
        );
        batch.put_cf(
            system,
            NEXT_EMBEDDING_ID_KEY,
            self.next_embedding_id.load(Ordering::SeqCst).to_be_bytes(),
        );
        Ok(())
    }

    pub(crate) fn read_atom_record(&self, atom_id: AtomId) -> CoreResult<Option<AtomRecord>> {
        let cf = self.get_cf(cf_names::ATOMS)?;
        let key = atom_key(atom_id);
        let data = self
            .db
            .get_cf(cf, key)
            .map_err(|e| StoreError::rocksdb_op("get", cf_names::ATOMS, Some(&key[..]), e))?;
        data.map(|bytes| deserialize_atom_record(&bytes)).transpose()
    }

    pub(crate) fn read_overflow(&self, atom_id: AtomId) -> CoreResult<Option<OverflowPayload>> {
        let cf = self.get_cf(cf_names::ATOM_OVERFLOW)?;
        let key = atom_key(atom_id);
        let data = self
            .db
            .get_cf(cf, key)
            .map_err(|e| StoreError::rocksdb_op("get", cf_names::ATOM_OVERFLOW, Some(&key[..]), e))?;
        data.map(|bytes| deserialize_overflow(&bytes)).transpose()
    }

    pub(crate) fn lookup_digest(&self, digest: &ContentDigest) -> CoreResult<Option<AtomId>> {
        let cf = self.get_cf(cf_names::ATOM_DIGESTS)?;
        let key = digest_key(digest);
        let data = self
            .db
            .get_cf(cf, key)
            .map_err(|e| StoreError::rocksdb_op("get", cf_names::ATOM_DIGESTS, Some(&key[..]), e))?;
        data.map(|bytes| parse_atom_key(&bytes)).transpose()
    }

    pub(crate) fn read_embedding_record(
        &self,
        embedding_id: EmbeddingId,
    ) -> CoreResult<Option<EmbeddingRecord>> {
        let cf = self.get_cf(cf_names::EMBEDDINGS)?;
        let key = embedding_key(embedding_id);
        let data = self
            .db
            .get_cf(cf, key)
            .map_err(|e| StoreError::rocksdb_op("get", cf_names::EMBEDDINGS, Some(&key[..]), e))?;
        data.map(|bytes| deserialize_embedding_record(&bytes)).transpose()
    }

    pub(crate) fn read_vector(
        &self,
        embedding_id: EmbeddingId,
        dimension: usize,
    ) -> CoreResult<Option<Vec<f32>>> {
        let cf = self.get_cf(cf_names::EMBEDDING_VECTORS)?;
        let key = embedding_key(embedding_id);
        let data = self.db.get_cf(cf, key).map_err(|e| {
            StoreError::rocksdb_op("get", cf_names::EMBEDDING_VECTORS, Some(&key[..]), e)
        })?;
        data.map(|bytes| deserialize_vector(&bytes, dimension)).transpose()
    }
}

// ============================================================================
// Index Rebuilding
// ============================================================================

impl RocksDbAtomStore {
    /// Walk every embedding, re-projecting rows whose `landmark_version`
    /// differs from `projector`'s, and return the index entries for all of
    /// them plus the number re-projected.
    ///
    /// Rows are rewritten one batch per `REPROJECT_BATCH`. Embeddings whose
    /// atom is gone are logged and left out of the index.
    pub(crate) fn project_all(
        &self,
        projector: &LandmarkProjector,
    ) -> CoreResult<(Vec<IndexEntry>, usize)> {
        let start = std::time::Instant::now();
        let cf = self.get_cf(cf_names::EMBEDDINGS)?;

        let mut modalities: HashMap<AtomId, Option<String>> = HashMap::new();
        let mut entries = Vec::new();
        let mut stale: Vec<EmbeddingRecord> = Vec::new();
        let mut reprojected = 0usize;
        let mut dangling = 0usize;

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| {
                error!("FAIL FAST: RocksDB iteration failed during index rebuild: {}", e);
                StoreError::rocksdb_op("iterate", cf_names::EMBEDDINGS, None, e)
            })?;
            let record = deserialize_embedding_record(&value)?;

            if record.landmark_version != projector.version() {
                stale.push(record);
                if stale.len() >= REPROJECT_BATCH {
                    reprojected += self.reproject_page(projector, &mut stale)?;
                    for r in stale.drain(..) {
                        self.push_entry(r, &mut modalities, &mut entries, &mut dangling)?;
                    }
                }
                continue;
            }
            self.push_entry(record, &mut modalities, &mut entries, &mut dangling)?;
        }

        if !stale.is_empty() {
            reprojected += self.reproject_page(projector, &mut stale)?;
            for r in stale.drain(..) {
                self.push_entry(r, &mut modalities, &mut entries, &mut dangling)?;
            }
        }

        if dangling > 0 {
            warn!(
                "{} embeddings reference missing atoms and were not indexed",
                dangling
            );
        }
        if !entries.is_empty() {
            info!(
                "Projected {} embeddings ({} rewritten) for landmark set v{} in {:?}",
                entries.len(),
                reprojected,
                projector.version(),
                start.elapsed()
            );
        } else {
            debug!("No embeddings to index (empty store)");
        }
        Ok((entries, reprojected))
    }

    /// Recompute coordinates of `page` in place and persist them in one batch.
    fn reproject_page(
        &self,
        projector: &LandmarkProjector,
        page: &mut [EmbeddingRecord],
    ) -> CoreResult<usize> {
        let cf = self.get_cf(cf_names::EMBEDDINGS)?;
        let mut batch = WriteBatch::default();

        for record in page.iter_mut() {
            let vector = self
                .read_vector(record.embedding_id, record.dimension)?
                .ok_or_else(|| {
                    error!(
                        "FAIL FAST: vector missing for {} during re-projection",
                        record.embedding_id
                    );
                    CoreError::IntegrityViolation(format!(
                        "vector for {} missing from '{}'",
                        record.embedding_id,
                        cf_names::EMBEDDING_VECTORS
                    ))
                })?;
            let (coarse, fine) = projector.project_both(&vector)?;
            record.coord_coarse = coarse;
            record.coord_fine = fine;
            record.landmark_version = projector.version();
            batch.put_cf(
                cf,
                embedding_key(record.embedding_id),
                serialize_embedding_record(record)?,
            );
        }

        self.commit(batch, cf_names::EMBEDDINGS).map_err(|e| {
            error!("FAIL FAST: Failed to persist re-projected coordinates: {}", e);
            e
        })?;
        debug!(count = page.len(), version = projector.version(), "Re-projected page");
        Ok(page.len())
    }

    fn push_entry(
        &self,
        record: EmbeddingRecord,
        modalities: &mut HashMap<AtomId, Option<String>>,
        entries: &mut Vec<IndexEntry>,
        dangling: &mut usize,
    ) -> CoreResult<()> {
        let modality = match modalities.get(&record.atom_id) {
            Some(m) => m.clone(),
            None => {
                let m = self.read_atom_record(record.atom_id)?.map(|a| a.modality);
                modalities.insert(record.atom_id, m.clone());
                m
            }
        };
        let Some(modality) = modality else {
            *dangling += 1;
            return Ok(());
        };
        entries.push(IndexEntry {
            embedding_id: record.embedding_id,
            atom_id: record.atom_id,
            coarse: record.coord_coarse,
            fine: record.coord_fine,
            embedding_type: record.embedding_type,
            model_id: record.model_id,
            modality,
        });
        Ok(())
    }
}

// ============================================================================
// Public API Methods
// ============================================================================

impl RocksDbAtomStore {
    /// Get the database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &AtomStoreConfig {
        &self.config
    }

    pub fn codec(&self) -> &FingerprintCodec {
        &self.codec
    }

    /// The spatial index kept in sync with `attach` and reclamation.
    pub fn index(&self) -> &Arc<SpatialIndex> {
        &self.index
    }

    /// Get a reference to the underlying RocksDB instance FOR TESTING/DIAGNOSTICS ONLY.
    #[doc(hidden)]
    pub fn db(&self) -> &DB {
        &self.db
    }

    /// Get an Arc reference to the underlying RocksDB instance.
    pub fn db_arc(&self) -> Arc<DB> {
        Arc::clone(&self.db)
    }

    /// Policy engine of this store. Every call returns the same engine.
    pub fn policy_engine(&self) -> Arc<DeduplicationPolicyEngine> {
        Arc::clone(&self.policies)
    }

    /// Search engine over this store's index and vectors.
    pub fn search_engine(self: &Arc<Self>, config: SearchConfig) -> HybridSearchEngine {
        HybridSearchEngine::new(
            Arc::clone(&self.index),
            Arc::clone(self) as Arc<dyn crate::search::VectorSource>,
            self.config.metric,
            config,
        )
    }

    /// Health check: verify all column families are accessible.
    pub fn health_check(&self) -> CoreResult<()> {
        for &cf_name in cf_names::ALL {
            self.get_cf(cf_name)?;
        }
        Ok(())
    }

    /// Flush memtables of every column family to disk.
    pub fn flush(&self) -> CoreResult<()> {
        debug!("Flushing all column families");
        for &cf_name in cf_names::ALL {
            let cf = self.get_cf(cf_name)?;
            self.db
                .flush_cf(cf)
                .map_err(|e| StoreError::RocksDbOperation {
                    operation: "flush",
                    cf: cf_name,
                    key: None,
                    source: e,
                })?;
        }
        info!("Flushed all column families");
        Ok(())
    }

    /// Create a RocksDB checkpoint at `target`.
    ///
    /// `target` must not exist yet; its parent directory is created if needed.
    pub fn checkpoint<P: AsRef<Path>>(&self, target: P) -> CoreResult<PathBuf> {
        let target = target.as_ref().to_path_buf();
        debug!("Creating checkpoint at {:?}", target);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CoreError::StorageError(format!("Failed to create checkpoint directory: {}", e))
            })?;
        }

        let checkpoint = rocksdb::checkpoint::Checkpoint::new(&self.db).map_err(|e| {
            StoreError::CheckpointFailed {
                message: e.to_string(),
            }
        })?;
        checkpoint
            .create_checkpoint(&target)
            .map_err(|e| StoreError::CheckpointFailed {
                message: e.to_string(),
            })?;

        info!("Created checkpoint at {:?}", target);
        Ok(target)
    }

    /// Store-wide counters. O(n) over `atoms` and `embeddings`.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        let mut stats = StoreStats::default();

        let atoms = self.get_cf(cf_names::ATOMS)?;
        for item in self.db.iterator_cf(atoms, IteratorMode::Start) {
            let (_, value) =
                item.map_err(|e| StoreError::rocksdb_op("iterate", cf_names::ATOMS, None, e))?;
            let record = deserialize_atom_record(&value)?;
            stats.atoms += 1;
            stats.total_references += record.reference_count;
            if record.metadata.overflow {
                stats.overflow_atoms += 1;
            }
            if record.reference_count == 0 {
                stats.orphans += 1;
            }
        }

        let embeddings = self.get_cf(cf_names::EMBEDDINGS)?;
        for item in self.db.iterator_cf(embeddings, IteratorMode::Start) {
            item.map_err(|e| StoreError::rocksdb_op("iterate", cf_names::EMBEDDINGS, None, e))?;
            stats.embeddings += 1;
        }

        Ok(stats)
    }
}
