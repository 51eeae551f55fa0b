//! Atom operations: put, get, release, metadata merge.
//!
//! Every mutation of an existing atom runs under the stripe lock of its
//! content digest and re-reads the row after locking, so concurrent puts,
//! releases and reclamation of one atom never interleave.

use chrono::Utc;
use rocksdb::WriteBatch;
use tracing::{debug, error, info};

use atomgraph_core::codec::InlineRecord;
use atomgraph_core::error::{CoreError, CoreResult};
use atomgraph_core::types::{Atom, AtomId, AtomMetadata, AtomRef, OverflowPayload};

use crate::column_families::cf_names;
use crate::schema::{atom_key, digest_key};
use crate::serialization::{deserialize_atom_record, serialize_atom_record, serialize_overflow};

use super::store::RocksDbAtomStore;
use super::types::{AtomRecord, StoreError};

impl RocksDbAtomStore {
    /// Insert content or add a reference to the atom already holding it.
    pub(crate) fn put_atom(
        &self,
        content: &[u8],
        modality: &str,
        subtype: Option<&str>,
        metadata: AtomMetadata,
    ) -> CoreResult<AtomRef> {
        let digest = self.codec.digest(content);
        let _guard = self.lock_digest(&digest);

        if let Some(atom_id) = self.lookup_digest(&digest)? {
            let mut record = self.read_atom_record(atom_id)?.ok_or_else(|| {
                error!(
                    "FAIL FAST: digest {} points at missing atom {}",
                    digest, atom_id
                );
                CoreError::IntegrityViolation(format!(
                    "digest index entry {} references missing {}",
                    digest, atom_id
                ))
            })?;
            self.ensure_same_content(&record, content)?;

            record.reference_count = record.reference_count.checked_add(1).ok_or_else(|| {
                CoreError::Internal(format!("reference count overflow on {}", atom_id))
            })?;
            let revived = record.orphaned_since.take().is_some();
            record.metadata.merge(&metadata);

            let cf = self.get_cf(cf_names::ATOMS)?;
            let mut batch = WriteBatch::default();
            batch.put_cf(cf, atom_key(atom_id), serialize_atom_record(&record)?);
            self.commit(batch, cf_names::ATOMS).map_err(|e| {
                error!("FAIL FAST: Failed to add reference to {}: {}", atom_id, e);
                e
            })?;

            debug!(
                %atom_id,
                reference_count = record.reference_count,
                revived,
                "Atom hit"
            );
            return Ok(AtomRef {
                atom_id,
                is_new: false,
                reference_count: record.reference_count,
            });
        }

        let inline = self.codec.encode_with_digest(content, digest);
        let atom_id = self.allocate_atom_id();
        let record = AtomRecord {
            atom_id,
            content_digest: digest,
            inline_value: inline.bytes.clone(),
            modality: modality.to_string(),
            subtype: subtype.map(str::to_string),
            reference_count: 1,
            metadata: self.codec.metadata_for(&inline).merged_with(&metadata),
            created_at: Utc::now(),
            orphaned_since: None,
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.get_cf(cf_names::ATOMS)?,
            atom_key(atom_id),
            serialize_atom_record(&record)?,
        );
        batch.put_cf(
            self.get_cf(cf_names::ATOM_DIGESTS)?,
            digest_key(&digest),
            atom_key(atom_id),
        );
        if inline.overflow {
            batch.put_cf(
                self.get_cf(cf_names::ATOM_OVERFLOW)?,
                atom_key(atom_id),
                serialize_overflow(&OverflowPayload::from_content(content))?,
            );
        }
        self.put_counters(&mut batch)?;

        if let Err(e) = self.commit(batch, cf_names::ATOMS) {
            error!(
                "FAIL FAST: Failed to insert {} ({} bytes, overflow={}): {}",
                atom_id,
                content.len(),
                inline.overflow,
                e
            );
            if inline.overflow {
                return Err(CoreError::OverflowStorageFailure {
                    digest: digest.to_hex(),
                    message: e.to_string(),
                });
            }
            return Err(e.into());
        }

        info!(
            %atom_id,
            modality,
            size = content.len(),
            overflow = inline.overflow,
            "Atom inserted"
        );
        Ok(AtomRef {
            atom_id,
            is_new: true,
            reference_count: 1,
        })
    }

    /// A digest hit must carry the same bytes; anything else is a collision.
    fn ensure_same_content(&self, record: &AtomRecord, content: &[u8]) -> CoreResult<()> {
        let same = if record.metadata.original_size != content.len() as u64 {
            false
        } else if record.metadata.overflow {
            let payload = self.read_overflow(record.atom_id)?.ok_or_else(|| {
                error!("FAIL FAST: overflow payload missing for {}", record.atom_id);
                CoreError::IntegrityViolation(format!(
                    "overflow payload missing for {}",
                    record.atom_id
                ))
            })?;
            payload.as_bytes() == content
        } else {
            record.inline_value.get(..content.len()) == Some(content)
        };

        if same {
            return Ok(());
        }
        error!(
            "FAIL FAST: digest {} matches {} but content differs",
            record.content_digest, record.atom_id
        );
        Err(CoreError::DigestCollisionSuspected {
            digest: record.content_digest.to_hex(),
            atom_id: record.atom_id.0,
        })
    }

    /// Rebuild an `Atom` from its row, loading and verifying any overflow.
    pub(crate) fn materialize(&self, record: AtomRecord) -> CoreResult<Atom> {
        let overflow = if record.metadata.overflow {
            self.read_overflow(record.atom_id)?
        } else {
            None
        };

        let inline = InlineRecord {
            bytes: record.inline_value,
            overflow: record.metadata.overflow,
            content_len: record.metadata.original_size,
            digest: record.content_digest,
        };
        self.codec
            .verify(&inline, overflow.as_ref().map(OverflowPayload::as_bytes))
            .map_err(|e| {
                error!("FAIL FAST: {} failed integrity check: {}", record.atom_id, e);
                e
            })?;

        Ok(Atom {
            atom_id: record.atom_id,
            content_digest: record.content_digest,
            inline_value: inline.bytes,
            overflow,
            modality: record.modality,
            subtype: record.subtype,
            reference_count: record.reference_count,
            metadata: record.metadata,
            created_at: record.created_at,
            orphaned_since: record.orphaned_since,
        })
    }

    pub(crate) fn get_atom(&self, atom_id: AtomId) -> CoreResult<Atom> {
        let record = self
            .read_atom_record(atom_id)?
            .ok_or_else(|| CoreError::not_found("atom", atom_id))?;
        self.materialize(record)
    }

    pub(crate) fn get_atoms(&self, atom_ids: &[AtomId]) -> CoreResult<Vec<Option<Atom>>> {
        let cf = self.get_cf(cf_names::ATOMS)?;
        let keys: Vec<[u8; 8]> = atom_ids.iter().map(|id| atom_key(*id)).collect();
        let results = self.db.multi_get_cf(keys.iter().map(|k| (cf, k)));

        let mut atoms = Vec::with_capacity(atom_ids.len());
        for (result, key) in results.into_iter().zip(keys.iter()) {
            let data = result
                .map_err(|e| StoreError::rocksdb_op("multi_get", cf_names::ATOMS, Some(&key[..]), e))?;
            match data {
                Some(bytes) => atoms.push(Some(self.materialize(deserialize_atom_record(&bytes)?)?)),
                None => atoms.push(None),
            }
        }
        debug!(
            requested = atom_ids.len(),
            found = atoms.iter().filter(|a| a.is_some()).count(),
            "Batch atom read"
        );
        Ok(atoms)
    }

    /// Read-modify-write of one atom row under its digest stripe.
    ///
    /// The row is read once to find the digest, then re-read under the lock.
    fn update_atom<T>(
        &self,
        atom_id: AtomId,
        update: impl FnOnce(&mut AtomRecord) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let digest = self
            .read_atom_record(atom_id)?
            .ok_or_else(|| CoreError::not_found("atom", atom_id))?
            .content_digest;
        let _guard = self.lock_digest(&digest);

        let mut record = self
            .read_atom_record(atom_id)?
            .ok_or_else(|| CoreError::not_found("atom", atom_id))?;
        let out = update(&mut record)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.get_cf(cf_names::ATOMS)?,
            atom_key(atom_id),
            serialize_atom_record(&record)?,
        );
        self.commit(batch, cf_names::ATOMS).map_err(|e| {
            error!("FAIL FAST: Failed to update {}: {}", atom_id, e);
            e
        })?;
        Ok(out)
    }

    pub(crate) fn release_atom(&self, atom_id: AtomId) -> CoreResult<u64> {
        let count = self.update_atom(atom_id, |record| {
            if record.reference_count == 0 {
                error!("FAIL FAST: release of {} with zero references", atom_id);
                return Err(CoreError::ReferenceUnderflow { atom_id: atom_id.0 });
            }
            record.reference_count -= 1;
            if record.reference_count == 0 {
                record.orphaned_since = Some(Utc::now());
            }
            Ok(record.reference_count)
        })?;

        if count == 0 {
            info!(%atom_id, "Atom orphaned");
        } else {
            debug!(%atom_id, reference_count = count, "Atom released");
        }
        Ok(count)
    }

    pub(crate) fn merge_atom_metadata(
        &self,
        atom_id: AtomId,
        metadata: AtomMetadata,
    ) -> CoreResult<AtomMetadata> {
        let merged = self.update_atom(atom_id, |record| {
            record.metadata.merge(&metadata);
            Ok(record.metadata.clone())
        })?;
        debug!(%atom_id, extra_keys = merged.extra.len(), "Merged atom metadata");
        Ok(merged)
    }
}
