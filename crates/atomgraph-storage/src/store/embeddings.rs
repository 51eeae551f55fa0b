//! Embedding operations: attach, lookups, vector loading for search.

use chrono::Utc;
use rocksdb::WriteBatch;
use tracing::{debug, error, warn};

use atomgraph_core::error::{CoreError, CoreResult};
use atomgraph_core::types::{
    validate_vector, AtomId, Embedding, EmbeddingId, EmbeddingRecord, EmbeddingRef,
};

use crate::column_families::cf_names;
use crate::index::IndexEntry;
use crate::schema::{atom_embedding_key, embedding_key, parse_embedding_key};
use crate::search::VectorSource;
use crate::serialization::{deserialize_vector, serialize_embedding_record, serialize_vector};

use super::store::RocksDbAtomStore;
use super::types::StoreError;

impl RocksDbAtomStore {
    pub(crate) fn attach_embedding(
        &self,
        atom_id: AtomId,
        vector: &[f32],
        embedding_type: &str,
        model_id: &str,
    ) -> CoreResult<EmbeddingRef> {
        // Projector and index must not change underneath us
        let _maintenance = self.maintenance.read();

        validate_vector(vector, self.config.dimension)?;
        if embedding_type.is_empty() {
            return Err(CoreError::validation("embedding_type", "must not be empty"));
        }

        let projector = self.index.projector();
        let (coarse, fine) = projector.project_both(vector)?;

        let digest = self
            .read_atom_record(atom_id)?
            .ok_or_else(|| CoreError::not_found("atom", atom_id))?
            .content_digest;
        let _guard = self.lock_digest(&digest);
        let atom = self
            .read_atom_record(atom_id)?
            .ok_or_else(|| CoreError::not_found("atom", atom_id))?;

        let links = self.get_cf(cf_names::ATOM_EMBEDDINGS)?;
        let link_key = atom_embedding_key(atom_id, embedding_type);
        let existing = self
            .db
            .get_cf(links, &link_key)
            .map_err(|e| {
                StoreError::rocksdb_op("get", cf_names::ATOM_EMBEDDINGS, Some(link_key.as_slice()), e)
            })?
            .map(|bytes| parse_embedding_key(&bytes))
            .transpose()?;

        let (embedding_id, replaced, created_at) = match existing {
            Some(id) => {
                let created = self
                    .read_embedding_record(id)?
                    .map(|r| r.created_at)
                    .unwrap_or_else(Utc::now);
                (id, true, created)
            }
            None => (self.allocate_embedding_id(), false, Utc::now()),
        };

        let record = EmbeddingRecord {
            embedding_id,
            atom_id,
            embedding_type: embedding_type.to_string(),
            model_id: model_id.to_string(),
            dimension: vector.len(),
            coord_coarse: coarse,
            coord_fine: fine,
            landmark_version: projector.version(),
            created_at,
        };

        let mut batch = WriteBatch::default();
        let key = embedding_key(embedding_id);
        batch.put_cf(
            self.get_cf(cf_names::EMBEDDINGS)?,
            key,
            serialize_embedding_record(&record)?,
        );
        batch.put_cf(
            self.get_cf(cf_names::EMBEDDING_VECTORS)?,
            key,
            serialize_vector(vector, self.config.padded_dimension),
        );
        batch.put_cf(links, &link_key, key);
        self.put_counters(&mut batch)?;

        self.commit(batch, cf_names::EMBEDDINGS).map_err(|e| {
            error!(
                "FAIL FAST: Failed to attach {} to {}: {}",
                embedding_type, atom_id, e
            );
            e
        })?;

        self.index.upsert(IndexEntry {
            embedding_id,
            atom_id,
            coarse,
            fine,
            embedding_type: record.embedding_type,
            model_id: record.model_id,
            modality: atom.modality,
        });

        debug!(
            %atom_id,
            %embedding_id,
            embedding_type,
            replaced,
            ?coarse,
            "Embedding attached"
        );
        Ok(EmbeddingRef {
            embedding_id,
            atom_id,
            coord_coarse: coarse,
            coord_fine: fine,
            landmark_version: record.landmark_version,
            replaced,
        })
    }

    pub(crate) fn load_embedding(&self, embedding_id: EmbeddingId) -> CoreResult<Embedding> {
        let record = self
            .read_embedding_record(embedding_id)?
            .ok_or_else(|| CoreError::not_found("embedding", embedding_id))?;
        let vector = self
            .read_vector(embedding_id, record.dimension)?
            .ok_or_else(|| {
                error!("FAIL FAST: vector missing for {}", embedding_id);
                CoreError::IntegrityViolation(format!(
                    "vector for {} missing from '{}'",
                    embedding_id,
                    cf_names::EMBEDDING_VECTORS
                ))
            })?;
        Ok(Embedding { record, vector })
    }

    pub(crate) fn atom_embedding_records(&self, atom_id: AtomId) -> CoreResult<Vec<EmbeddingRecord>> {
        let (_, ids) = self.embedding_links(atom_id)?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.read_embedding_record(id)? {
                Some(record) => records.push(record),
                None => warn!(%atom_id, embedding_id = %id, "Dangling atom_embeddings entry"),
            }
        }
        records.sort_by_key(|r| r.embedding_id);
        Ok(records)
    }
}

impl VectorSource for RocksDbAtomStore {
    fn load_vectors(&self, ids: &[EmbeddingId]) -> CoreResult<Vec<Option<Vec<f32>>>> {
        let cf = self.get_cf(cf_names::EMBEDDING_VECTORS)?;
        let keys: Vec<[u8; 8]> = ids.iter().map(|id| embedding_key(*id)).collect();
        let results = self.db.multi_get_cf(keys.iter().map(|k| (cf, k)));

        let mut vectors = Vec::with_capacity(ids.len());
        for (result, key) in results.into_iter().zip(keys.iter()) {
            let data = result.map_err(|e| {
                StoreError::rocksdb_op("multi_get", cf_names::EMBEDDING_VECTORS, Some(&key[..]), e)
            })?;
            vectors.push(
                data.map(|bytes| deserialize_vector(&bytes, self.config.dimension))
                    .transpose()?,
            );
        }
        Ok(vectors)
    }
}
