//! In-memory spatial index over coarse coordinates.
//!
//! A uniform 3-D grid: each embedding lives in the cell containing its
//! coarse coordinate. Fine coordinates ride along on the entry and are used
//! only to narrow candidate sets, never to locate cells.
//!
//! The index also owns the active [`LandmarkProjector`]. Swapping landmark
//! sets replaces projector and entries under one write guard, so a reader
//! never sees coordinates from one set paired with a projector of another.
//!
//! The index is rebuilt from RocksDB on open. It may briefly lag committed
//! writes; search tolerates that by skipping candidates whose vectors are
//! gone.

use std::collections::HashMap;
use std::sync::Arc;

use atomgraph_core::error::{CoreError, CoreResult};
use atomgraph_core::projection::LandmarkProjector;
use atomgraph_core::types::{AtomId, EmbeddingId, SpatialCoord};
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

#[cfg(test)]
mod tests;

type CellKey = (i32, i32, i32);

/// One indexed embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub embedding_id: EmbeddingId,
    pub atom_id: AtomId,
    pub coarse: SpatialCoord,
    pub fine: SpatialCoord,
    pub embedding_type: String,
    pub model_id: String,
    /// Modality of the owning atom
    pub modality: String,
}

/// Non-spatial predicates applied to index entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub modality: Option<String>,
    pub model_id: Option<String>,
    pub embedding_type: Option<String>,
}

impl SearchFilters {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_modality(mut self, modality: impl Into<String>) -> Self {
        self.modality = Some(modality.into());
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_embedding_type(mut self, embedding_type: impl Into<String>) -> Self {
        self.embedding_type = Some(embedding_type.into());
        self
    }

    #[inline]
    pub fn matches(&self, entry: &IndexEntry) -> bool {
        self.modality.as_ref().map_or(true, |m| *m == entry.modality)
            && self.model_id.as_ref().map_or(true, |m| *m == entry.model_id)
            && self
                .embedding_type
                .as_ref()
                .map_or(true, |t| *t == entry.embedding_type)
    }
}

/// Lightweight copy of the fields search needs from an entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialCandidate {
    pub embedding_id: EmbeddingId,
    pub atom_id: AtomId,
    pub coarse: SpatialCoord,
    pub fine: SpatialCoord,
}

impl From<&IndexEntry> for SpatialCandidate {
    fn from(e: &IndexEntry) -> Self {
        Self {
            embedding_id: e.embedding_id,
            atom_id: e.atom_id,
            coarse: e.coarse,
            fine: e.fine,
        }
    }
}

struct GridState {
    projector: Arc<LandmarkProjector>,
    entries: HashMap<EmbeddingId, IndexEntry>,
    cells: HashMap<CellKey, Vec<EmbeddingId>>,
}

/// Uniform grid over the projected cube `[-scale, scale]^3`.
pub struct SpatialIndex {
    cell_size: f32,
    state: RwLock<GridState>,
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("SpatialIndex")
            .field("cell_size", &self.cell_size)
            .field("landmark_version", &state.projector.version())
            .field("entries", &state.entries.len())
            .field("cells", &state.cells.len())
            .finish()
    }
}

impl SpatialIndex {
    /// Create an empty index.
    ///
    /// # Errors
    ///
    /// `ConfigError` when `cell_size` is not a positive finite number.
    pub fn new(projector: Arc<LandmarkProjector>, cell_size: f32) -> CoreResult<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(CoreError::ConfigError(format!(
                "index cell_size must be positive, got {}",
                cell_size
            )));
        }
        Ok(Self {
            cell_size,
            state: RwLock::new(GridState {
                projector,
                entries: HashMap::new(),
                cells: HashMap::new(),
            }),
        })
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// The projector matching the indexed coordinates.
    pub fn projector(&self) -> Arc<LandmarkProjector> {
        Arc::clone(&self.state.read().projector)
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, embedding_id: EmbeddingId) -> Option<IndexEntry> {
        self.state.read().entries.get(&embedding_id).cloned()
    }

    /// Insert or move an entry.
    pub fn upsert(&self, entry: IndexEntry) {
        let cell = cell_of(&entry.coarse, self.cell_size);
        let mut state = self.state.write();
        if let Some(old) = state.entries.remove(&entry.embedding_id) {
            let old_cell = cell_of(&old.coarse, self.cell_size);
            detach(&mut state.cells, old_cell, old.embedding_id);
        }
        state.cells.entry(cell).or_default().push(entry.embedding_id);
        state.entries.insert(entry.embedding_id, entry);
    }

    pub fn remove(&self, embedding_id: EmbeddingId) -> Option<IndexEntry> {
        let mut state = self.state.write();
        let old = state.entries.remove(&embedding_id)?;
        detach(&mut state.cells, cell_of(&old.coarse, self.cell_size), embedding_id);
        Some(old)
    }

    /// Remove several entries under one write guard. Returns how many existed.
    pub fn remove_many(&self, embedding_ids: &[EmbeddingId]) -> usize {
        let mut state = self.state.write();
        let mut removed = 0;
        for id in embedding_ids {
            if let Some(old) = state.entries.remove(id) {
                detach(&mut state.cells, cell_of(&old.coarse, self.cell_size), *id);
                removed += 1;
            }
        }
        removed
    }

    /// Swap in a new projector and a complete set of entries.
    pub fn replace(&self, projector: Arc<LandmarkProjector>, entries: Vec<IndexEntry>) {
        let mut fresh_entries = HashMap::with_capacity(entries.len());
        let mut cells: HashMap<CellKey, Vec<EmbeddingId>> = HashMap::new();
        for entry in entries {
            cells
                .entry(cell_of(&entry.coarse, self.cell_size))
                .or_default()
                .push(entry.embedding_id);
            fresh_entries.insert(entry.embedding_id, entry);
        }

        let mut state = self.state.write();
        info!(
            from_version = state.projector.version(),
            to_version = projector.version(),
            entries = fresh_entries.len(),
            cells = cells.len(),
            "Spatial index rebuilt"
        );
        state.projector = projector;
        state.entries = fresh_entries;
        state.cells = cells;
    }

    /// Consistent read view. Hold it across all spatial steps of one query.
    pub fn view(&self) -> IndexView<'_> {
        IndexView {
            cell_size: self.cell_size,
            state: self.state.read(),
        }
    }
}

/// Read guard over the index. Projector and entries are mutually consistent
/// for the lifetime of the view.
pub struct IndexView<'a> {
    cell_size: f32,
    state: RwLockReadGuard<'a, GridState>,
}

impl IndexView<'_> {
    pub fn projector(&self) -> &Arc<LandmarkProjector> {
        &self.state.projector
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    pub fn entry(&self, embedding_id: EmbeddingId) -> Option<&IndexEntry> {
        self.state.entries.get(&embedding_id)
    }

    /// Radius that reaches every point of the coordinate cube from anywhere in it.
    pub fn covering_radius(&self) -> f32 {
        2.0 * self.state.projector.scale() * 3.0f32.sqrt()
    }

    /// Filtered entries whose coarse coordinate lies within `radius` of `center`.
    pub fn within_radius(
        &self,
        center: &SpatialCoord,
        radius: f32,
        filters: &SearchFilters,
    ) -> Vec<SpatialCandidate> {
        let scale = self.state.projector.scale();
        let limit_lo = cell_index(-scale, self.cell_size);
        let limit_hi = cell_index(scale, self.cell_size);
        let c = center.as_array();

        let mut lo = [0i32; 3];
        let mut hi = [0i32; 3];
        let mut cube_cells: u64 = 1;
        for axis in 0..3 {
            lo[axis] = cell_index(c[axis] - radius, self.cell_size).max(limit_lo);
            hi[axis] = cell_index(c[axis] + radius, self.cell_size).min(limit_hi);
            if hi[axis] < lo[axis] {
                return Vec::new();
            }
            cube_cells = cube_cells.saturating_mul((hi[axis] - lo[axis] + 1) as u64);
        }

        let mut out = Vec::new();
        let mut visit = |ids: &Vec<EmbeddingId>| {
            for id in ids {
                if let Some(entry) = self.state.entries.get(id) {
                    if entry.coarse.distance(center) <= radius && filters.matches(entry) {
                        out.push(SpatialCandidate::from(entry));
                    }
                }
            }
        };

        if cube_cells as usize > self.state.cells.len() {
            // Sparse grid: cheaper to walk occupied cells than the query cube
            for (key, ids) in &self.state.cells {
                if (lo[0]..=hi[0]).contains(&key.0)
                    && (lo[1]..=hi[1]).contains(&key.1)
                    && (lo[2]..=hi[2]).contains(&key.2)
                {
                    visit(ids);
                }
            }
        } else {
            for x in lo[0]..=hi[0] {
                for y in lo[1]..=hi[1] {
                    for z in lo[2]..=hi[2] {
                        if let Some(ids) = self.state.cells.get(&(x, y, z)) {
                            visit(ids);
                        }
                    }
                }
            }
        }
        debug!(
            radius,
            cube_cells,
            candidates = out.len(),
            "Spatial radius query"
        );
        out
    }

    /// Every entry passing `filters`. Used by the linear-scan fallback.
    pub fn filtered(&self, filters: &SearchFilters) -> Vec<SpatialCandidate> {
        self.state
            .entries
            .values()
            .filter(|e| filters.matches(e))
            .map(SpatialCandidate::from)
            .collect()
    }
}

#[inline]
fn cell_index(v: f32, cell_size: f32) -> i32 {
    (v / cell_size).floor() as i32
}

#[inline]
fn cell_of(c: &SpatialCoord, cell_size: f32) -> CellKey {
    (
        cell_index(c.x, cell_size),
        cell_index(c.y, cell_size),
        cell_index(c.z, cell_size),
    )
}

fn detach(cells: &mut HashMap<CellKey, Vec<EmbeddingId>>, cell: CellKey, id: EmbeddingId) {
    if let Some(ids) = cells.get_mut(&cell) {
        ids.retain(|x| *x != id);
        if ids.is_empty() {
            cells.remove(&cell);
        }
    }
}
