//! Versioned deduplication policies.
//!
//! Policy rows in `dedup_policies` are immutable. Each scope has one active
//! pointer in `dedup_active`; activating a policy writes the new row and
//! moves the pointer in a single batch, recording the replaced policy in
//! `supersedes`. `is_active` is never trusted from disk: it is derived from
//! the pointer on every read.

use std::sync::Arc;

use parking_lot::Mutex;
use rocksdb::{ColumnFamily, IteratorMode, WriteBatch, DB};
use tracing::{debug, error, info};
use uuid::Uuid;

use atomgraph_core::dedup::{DedupStrategy, DeduplicationPolicy};
use atomgraph_core::error::{CoreError, CoreResult};

use crate::column_families::cf_names;
use crate::schema::{parse_policy_key, policy_key, scope_key};
use crate::serialization::{deserialize_policy, serialize_policy};
use crate::store::StoreError;

/// Reads and replaces deduplication policies.
///
/// Owned by [`RocksDbAtomStore`](crate::store::RocksDbAtomStore) and handed
/// out through `policy_engine()`, so one lock orders every activation on a
/// database.
pub struct DeduplicationPolicyEngine {
    db: Arc<DB>,
    /// Serializes pointer moves so `supersedes` is always the replaced policy.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for DeduplicationPolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeduplicationPolicyEngine").finish_non_exhaustive()
    }
}

impl DeduplicationPolicyEngine {
    /// Create an engine over a database opened with all atomgraph column families.
    pub(crate) fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    fn cf(&self, name: &str) -> CoreResult<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            StoreError::ColumnFamilyNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Create a policy and make it the active one for `scope`.
    ///
    /// # Errors
    ///
    /// `ValidationError` for an empty scope or out-of-range thresholds.
    pub fn activate(
        &self,
        scope: &str,
        policy_name: &str,
        strategy: DedupStrategy,
    ) -> CoreResult<DeduplicationPolicy> {
        if scope.is_empty() {
            return Err(CoreError::validation("scope", "must not be empty"));
        }
        strategy.validate()?;

        let _guard = self.write_lock.lock();
        let supersedes = self.active_id(scope)?;
        let mut policy = DeduplicationPolicy::new(scope, policy_name, strategy, supersedes);

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(cf_names::DEDUP_POLICIES)?,
            policy_key(&policy.policy_id),
            serialize_policy(&policy)?,
        );
        batch.put_cf(
            self.cf(cf_names::DEDUP_ACTIVE)?,
            scope_key(scope),
            policy_key(&policy.policy_id),
        );
        self.db.write(batch).map_err(|e| {
            error!(
                "FAIL FAST: Failed to activate policy '{}' for scope '{}': {}",
                policy_name, scope, e
            );
            StoreError::rocksdb_op("write_batch", cf_names::DEDUP_POLICIES, None, e)
        })?;

        policy.is_active = true;
        info!(
            scope,
            policy_id = %policy.policy_id,
            strategy = policy.strategy.name(),
            supersedes = ?policy.supersedes,
            "Activated deduplication policy"
        );
        Ok(policy)
    }

    /// The policy currently active for `scope`.
    ///
    /// # Errors
    ///
    /// `NotFound` when no policy was ever activated for the scope.
    pub fn get_active(&self, scope: &str) -> CoreResult<DeduplicationPolicy> {
        let id = self
            .active_id(scope)?
            .ok_or_else(|| CoreError::not_found("dedup_policy", format!("scope '{}'", scope)))?;
        let mut policy = self.read(&id)?.ok_or_else(|| {
            error!(
                "FAIL FAST: scope '{}' points at missing policy {}",
                scope, id
            );
            CoreError::IntegrityViolation(format!(
                "active policy {} for scope '{}' is missing",
                id, scope
            ))
        })?;
        policy.is_active = true;
        Ok(policy)
    }

    pub fn get(&self, policy_id: &Uuid) -> CoreResult<DeduplicationPolicy> {
        let mut policy = self
            .read(policy_id)?
            .ok_or_else(|| CoreError::not_found("dedup_policy", policy_id))?;
        policy.is_active = self.active_id(&policy.scope)? == Some(*policy_id);
        Ok(policy)
    }

    /// Every policy ever created for `scope`, oldest first.
    pub fn history(&self, scope: &str) -> CoreResult<Vec<DeduplicationPolicy>> {
        let active = self.active_id(scope)?;
        let cf = self.cf(cf_names::DEDUP_POLICIES)?;
        let mut policies = Vec::new();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| {
                StoreError::rocksdb_op("iterate", cf_names::DEDUP_POLICIES, None, e)
            })?;
            let mut policy = deserialize_policy(&value)?;
            if policy.scope != scope {
                continue;
            }
            policy.is_active = active == Some(parse_policy_key(&key)?);
            policies.push(policy);
        }

        policies.sort_by_key(|p| p.created_at);
        debug!(scope, count = policies.len(), "Loaded policy history");
        Ok(policies)
    }

    fn active_id(&self, scope: &str) -> CoreResult<Option<Uuid>> {
        let cf = self.cf(cf_names::DEDUP_ACTIVE)?;
        let data = self.db.get_cf(cf, scope_key(scope)).map_err(|e| {
            StoreError::rocksdb_op("get", cf_names::DEDUP_ACTIVE, Some(scope_key(scope)), e)
        })?;
        data.map(|bytes| parse_policy_key(&bytes)).transpose()
    }

    fn read(&self, policy_id: &Uuid) -> CoreResult<Option<DeduplicationPolicy>> {
        let cf = self.cf(cf_names::DEDUP_POLICIES)?;
        let key = policy_key(policy_id);
        let data = self.db.get_cf(cf, key).map_err(|e| {
            StoreError::rocksdb_op("get", cf_names::DEDUP_POLICIES, Some(&key[..]), e)
        })?;
        data.map(|bytes| deserialize_policy(&bytes)).transpose()
    }
}
