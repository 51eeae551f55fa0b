//! Landmark set installation and re-projection.
//!
//! Landmark sets are immutable. Changing the projection means installing a
//! set with a higher version: every stored embedding gets new coordinates,
//! the spatial index is rebuilt, and only then does the active pointer move.
//! A crash part way leaves rows tagged with mixed versions; the next open
//! finishes the job against whichever set the pointer names.

use std::sync::Arc;
use std::time::Instant;

use rocksdb::WriteBatch;
use tracing::{error, info};

use atomgraph_core::error::{CoreError, CoreResult};
use atomgraph_core::projection::{LandmarkProjector, LandmarkSet};

use crate::column_families::cf_names;
use crate::schema::{landmark_key, ACTIVE_LANDMARK_VERSION_KEY};
use crate::serialization::{deserialize_landmark_set, serialize_landmark_set};

use super::store::RocksDbAtomStore;
use super::types::{ReprojectionReport, StoreError};

impl RocksDbAtomStore {
    /// The landmark set used by `attach` and search.
    pub fn active_landmarks(&self) -> Arc<LandmarkSet> {
        Arc::clone(self.index.projector().landmark_set())
    }

    /// A stored landmark set by version.
    pub fn landmark_set(&self, version: u32) -> CoreResult<LandmarkSet> {
        let cf = self.get_cf(cf_names::LANDMARKS)?;
        let key = landmark_key(version);
        let data = self
            .db
            .get_cf(cf, key)
            .map_err(|e| StoreError::rocksdb_op("get", cf_names::LANDMARKS, Some(&key[..]), e))?
            .ok_or_else(|| CoreError::not_found("landmark_set", version))?;
        deserialize_landmark_set(&data)
    }

    /// Install `set` as the active landmark set and re-project every embedding.
    ///
    /// Blocks `attach` and reclamation for the duration. Searches keep
    /// answering from the previous index until the final swap.
    ///
    /// # Errors
    ///
    /// - `ValidationError` when `set.version` is not above the active version
    /// - `DimensionMismatch` when the set's dimension differs from the store's
    /// - `ConfigError` when the set uses a different metric
    pub fn install_landmarks(&self, set: LandmarkSet) -> CoreResult<ReprojectionReport> {
        let start = Instant::now();
        let _maintenance = self.maintenance.write();

        let from_version = self.index.projector().version();
        if set.version <= from_version {
            return Err(CoreError::validation(
                "version",
                format!(
                    "landmark set version {} must exceed active version {}",
                    set.version, from_version
                ),
            ));
        }
        if set.dimension != self.config.dimension {
            return Err(CoreError::DimensionMismatch {
                expected: self.config.dimension,
                actual: set.dimension,
            });
        }
        if set.metric != self.config.metric {
            return Err(CoreError::ConfigError(format!(
                "landmark set metric {} differs from store metric {}",
                set.metric, self.config.metric
            )));
        }

        let to_version = set.version;
        let projector = Arc::new(LandmarkProjector::new(Arc::new(set))?);

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.get_cf(cf_names::LANDMARKS)?,
            landmark_key(to_version),
            serialize_landmark_set(projector.landmark_set())?,
        );
        self.commit(batch, cf_names::LANDMARKS).map_err(|e| {
            error!("FAIL FAST: Failed to persist landmark set v{}: {}", to_version, e);
            e
        })?;

        let (entries, reprojected) = self.project_all(&projector)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.get_cf(cf_names::SYSTEM)?,
            ACTIVE_LANDMARK_VERSION_KEY,
            to_version.to_be_bytes(),
        );
        self.commit(batch, cf_names::SYSTEM).map_err(|e| {
            error!(
                "FAIL FAST: Failed to activate landmark set v{}: {}",
                to_version, e
            );
            e
        })?;

        self.index.replace(projector, entries);

        let report = ReprojectionReport {
            from_version,
            to_version,
            reprojected,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            from_version,
            to_version,
            reprojected,
            elapsed_ms = report.elapsed_ms,
            "Installed landmark set"
        );
        Ok(report)
    }
}
