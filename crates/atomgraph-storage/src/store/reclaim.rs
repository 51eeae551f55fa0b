//! Orphan reclamation.
//!
//! Atoms at reference count 0 stay readable until their grace window has
//! passed. The job pages through `atoms`, then re-checks each candidate
//! under its digest stripe and deletes the atom with everything hanging
//! off it in a single batch. A candidate that gained a reference between
//! scan and delete is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use rocksdb::{Direction, IteratorMode, WriteBatch};
use tracing::{debug, error, info};

use atomgraph_core::error::CoreResult;
use atomgraph_core::types::{AtomId, EmbeddingId};

use crate::column_families::cf_names;
use crate::schema::{
    atom_embeddings_prefix, atom_key, digest_key, embedding_key, parse_atom_key,
    parse_embedding_key,
};
use crate::serialization::deserialize_atom_record;

use super::store::RocksDbAtomStore;
use super::types::{ReclaimOptions, ReclaimReport, StoreError};

enum Recheck {
    Reclaimed(Vec<EmbeddingId>),
    Live,
    Gone,
}

impl RocksDbAtomStore {
    /// Reclaim with the configured grace window and page size.
    pub fn reclaim(&self) -> CoreResult<ReclaimReport> {
        self.reclaim_orphans_with(
            ReclaimOptions {
                grace: self.config.reclaim_grace,
                batch_size: self.config.reclaim_batch_size,
            },
            None,
        )
    }

    /// Delete orphans older than `options.grace`.
    ///
    /// `stop` is polled before each atom; setting it ends the run at the
    /// next atom boundary with `interrupted = true`. Running again resumes
    /// the work, since every deletion is self-contained.
    pub fn reclaim_orphans_with(
        &self,
        options: ReclaimOptions,
        stop: Option<&AtomicBool>,
    ) -> CoreResult<ReclaimReport> {
        let start = Instant::now();
        let batch_size = options.batch_size.max(1);
        let mut report = ReclaimReport::default();
        let mut cursor: Option<[u8; 8]> = None;

        'pages: loop {
            let (candidates, next, exhausted) =
                self.scan_page(cursor, batch_size, &options, &mut report)?;

            for atom_id in candidates {
                if stop.is_some_and(|s| s.load(Ordering::SeqCst)) {
                    report.interrupted = true;
                    break 'pages;
                }
                match self.reclaim_one(atom_id, &options)? {
                    Recheck::Reclaimed(embeddings) => {
                        report.reclaimed += 1;
                        let removed = self.index.remove_many(&embeddings);
                        debug!(
                            %atom_id,
                            embeddings = embeddings.len(),
                            unindexed = removed,
                            "Atom reclaimed"
                        );
                    }
                    Recheck::Live => {
                        report.skipped_live += 1;
                        debug!(%atom_id, "Orphan re-referenced before reclaim, skipped");
                    }
                    Recheck::Gone => {}
                }
            }

            if exhausted {
                break;
            }
            cursor = next;
        }

        info!(
            scanned = report.scanned,
            reclaimed = report.reclaimed,
            skipped_live = report.skipped_live,
            interrupted = report.interrupted,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Orphan reclamation finished"
        );
        Ok(report)
    }

    /// Collect up to `batch_size` reclaimable ids from `cursor` on.
    ///
    /// Returns the candidates, the key to resume from, and whether the
    /// column family was exhausted.
    fn scan_page(
        &self,
        cursor: Option<[u8; 8]>,
        batch_size: usize,
        options: &ReclaimOptions,
        report: &mut ReclaimReport,
    ) -> CoreResult<(Vec<AtomId>, Option<[u8; 8]>, bool)> {
        let cf = self.get_cf(cf_names::ATOMS)?;
        let mode = match &cursor {
            Some(key) => IteratorMode::From(&key[..], Direction::Forward),
            None => IteratorMode::Start,
        };
        let now = Utc::now();
        let mut candidates = Vec::new();

        for item in self.db.iterator_cf(cf, mode) {
            let (key, value) =
                item.map_err(|e| StoreError::rocksdb_op("iterate", cf_names::ATOMS, None, e))?;
            let atom_id = parse_atom_key(&key)?;
            if candidates.len() >= batch_size {
                return Ok((candidates, Some(atom_key(atom_id)), false));
            }
            report.scanned += 1;
            let record = deserialize_atom_record(&value)?;
            if record.is_reclaimable(now, options.grace) {
                candidates.push(atom_id);
            }
        }
        Ok((candidates, None, true))
    }

    /// Re-check one candidate under its stripe and delete it if still orphaned.
    fn reclaim_one(&self, atom_id: AtomId, options: &ReclaimOptions) -> CoreResult<Recheck> {
        let _maintenance = self.maintenance.read();

        let Some(first) = self.read_atom_record(atom_id)? else {
            return Ok(Recheck::Gone);
        };
        let _guard = self.lock_digest(&first.content_digest);

        let Some(record) = self.read_atom_record(atom_id)? else {
            return Ok(Recheck::Gone);
        };
        if !record.is_reclaimable(Utc::now(), options.grace) {
            return Ok(Recheck::Live);
        }

        let (link_keys, embeddings) = self.embedding_links(atom_id)?;

        let mut batch = WriteBatch::default();
        let key = atom_key(atom_id);
        batch.delete_cf(self.get_cf(cf_names::ATOMS)?, key);
        batch.delete_cf(
            self.get_cf(cf_names::ATOM_DIGESTS)?,
            digest_key(&record.content_digest),
        );
        batch.delete_cf(self.get_cf(cf_names::ATOM_OVERFLOW)?, key);
        let records = self.get_cf(cf_names::EMBEDDINGS)?;
        let vectors = self.get_cf(cf_names::EMBEDDING_VECTORS)?;
        let links = self.get_cf(cf_names::ATOM_EMBEDDINGS)?;
        for id in &embeddings {
            batch.delete_cf(records, embedding_key(*id));
            batch.delete_cf(vectors, embedding_key(*id));
        }
        for link in &link_keys {
            batch.delete_cf(links, link);
        }
        self.put_counters(&mut batch)?;

        self.commit(batch, cf_names::ATOMS).map_err(|e| {
            error!("FAIL FAST: Failed to reclaim {}: {}", atom_id, e);
            e
        })?;
        Ok(Recheck::Reclaimed(embeddings))
    }

    /// `atom_embeddings` keys and embedding ids of one atom.
    pub(crate) fn embedding_links(
        &self,
        atom_id: AtomId,
    ) -> CoreResult<(Vec<Box<[u8]>>, Vec<EmbeddingId>)> {
        let cf = self.get_cf(cf_names::ATOM_EMBEDDINGS)?;
        let prefix = atom_embeddings_prefix(atom_id);
        let mut keys = Vec::new();
        let mut ids = Vec::new();

        for item in self.db.prefix_iterator_cf(cf, prefix) {
            let (key, value) = item.map_err(|e| {
                StoreError::rocksdb_op(
                    "prefix_iterate",
                    cf_names::ATOM_EMBEDDINGS,
                    Some(&prefix[..]),
                    e,
                )
            })?;
            if !key.starts_with(&prefix) {
                break;
            }
            ids.push(parse_embedding_key(&value)?);
            keys.push(key);
        }
        Ok((keys, ids))
    }
}
