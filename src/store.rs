//! Cache entry records and the repository interfaces backing them.
//!
//! The planner and caches depend only on the [`ExtractStore`] and
//! [`MsrStore`] traits; production wires in the shared backing store while
//! tests use the in-memory implementations below.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::status;
use crate::errors::ExtractError;
use crate::types::{BoundaryName, DatasetName, ExtractType, ParamHash, RasterId};

/// Lifecycle state of an extract or MSR entry.
///
/// Codes `{0,1,2,3}` are the known domain. Every other value is kept in the
/// unreserved [`Status::Other`] bucket: a terminal error state that is never
/// auto-retried and never purged by the redundancy check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum Status {
    /// Queued, not yet picked up by a worker.
    Pending,
    /// Finished; the output artifact should exist on disk.
    Complete,
    /// Picked up by a worker.
    Running,
    /// Failed at least once and requeued.
    Retrying,
    /// Any unlisted code; terminal, requires operator attention.
    Other(i64),
}

impl Status {
    /// True while a worker still owns the entry.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Status::Pending | Status::Running | Status::Retrying)
    }

    /// Stored integer code for this status.
    pub fn code(self) -> i64 {
        i64::from(self)
    }
}

impl From<i64> for Status {
    fn from(code: i64) -> Self {
        match code {
            status::PENDING => Status::Pending,
            status::COMPLETE => Status::Complete,
            status::RUNNING => Status::Running,
            status::RETRYING => Status::Retrying,
            other => Status::Other(other),
        }
    }
}

impl From<Status> for i64 {
    fn from(value: Status) -> Self {
        match value {
            Status::Pending => status::PENDING,
            Status::Complete => status::COMPLETE,
            Status::Running => status::RUNNING,
            Status::Retrying => status::RETRYING,
            Status::Other(code) => code,
        }
    }
}

/// Which pipeline produced an extract entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Single-stage extraction directly against a named raster file.
    Direct,
    /// Derived summary extract over a shared MSR raster.
    Msr,
}

/// Identity of a single-raster extract computation.
///
/// At most one live entry exists per key; duplicate claims resolve at insert
/// time via compare-and-insert.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractKey {
    /// Boundary layer the extract runs against.
    pub boundary: BoundaryName,
    /// Raster identifier (file name, or `<dataset>_<hash>` for MSR extracts).
    pub raster: RasterId,
    /// Statistic being extracted.
    pub extract_type: ExtractType,
    /// Whether a companion reliability extract is produced alongside.
    pub reliability: bool,
}

/// Live record of one extract computation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractEntry {
    /// Identity of the computation.
    #[serde(flatten)]
    pub key: ExtractKey,
    /// Pipeline that produced this entry.
    pub classification: Classification,
    /// Lifecycle state, mutated by the external worker.
    pub status: Status,
    /// Worker scheduling priority; zero at insert.
    pub priority: i64,
    /// When the entry was queued.
    pub submit_time: DateTime<Utc>,
    /// Last worker status transition.
    pub update_time: DateTime<Utc>,
}

impl ExtractEntry {
    /// New `pending` entry: priority zero, both timestamps set to now.
    pub fn pending(key: ExtractKey, classification: Classification) -> Self {
        let now = Utc::now();
        Self {
            key,
            classification,
            status: Status::Pending,
            priority: 0,
            submit_time: now,
            update_time: now,
        }
    }
}

/// Identity of a shared MSR computation; never includes boundary or request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MsrKey {
    /// Dataset the raster is built from.
    pub dataset: DatasetName,
    /// Hash of the normalized parameter object.
    pub hash: ParamHash,
}

/// Live record of one shared MSR computation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MsrEntry {
    /// Identity of the computation.
    #[serde(flatten)]
    pub key: MsrKey,
    /// Full normalized option object the hash was computed from.
    pub options: Value,
    /// Job identifiers attached by the external MSR workers.
    pub jobs: Vec<String>,
    /// Lifecycle state, mutated by the external worker.
    pub status: Status,
    /// Worker scheduling priority; zero at insert.
    pub priority: i64,
    /// When the entry was queued.
    pub submit_time: DateTime<Utc>,
    /// Last worker status transition.
    pub update_time: DateTime<Utc>,
}

impl MsrEntry {
    /// New `pending` entry: no jobs, priority zero, both timestamps now.
    pub fn pending(key: MsrKey, options: Value) -> Self {
        let now = Utc::now();
        Self {
            key,
            options,
            jobs: Vec::new(),
            status: Status::Pending,
            priority: 0,
            submit_time: now,
            update_time: now,
        }
    }
}

/// Repository interface for extract entries.
///
/// Implementations are shared across concurrent request processors, so
/// `insert` must behave as an atomic compare-and-insert: when two processors
/// race on the same key, exactly one wins and the other sees a benign
/// collision rather than an error.
pub trait ExtractStore: Send + Sync {
    /// Fetch the live entry for `key`, if any.
    fn find(&self, key: &ExtractKey) -> Result<Option<ExtractEntry>, ExtractError>;
    /// Insert `entry` unless its key is already claimed; returns whether the
    /// insert happened.
    fn insert(&self, entry: ExtractEntry) -> Result<bool, ExtractError>;
    /// Delete the entry for `key`, if present.
    fn delete(&self, key: &ExtractKey) -> Result<(), ExtractError>;
}

/// Repository interface for MSR entries; same contract as [`ExtractStore`],
/// keyed by (dataset, hash).
pub trait MsrStore: Send + Sync {
    /// Fetch the live entry for `key`, if any.
    fn find(&self, key: &MsrKey) -> Result<Option<MsrEntry>, ExtractError>;
    /// Insert `entry` unless its key is already claimed; returns whether the
    /// insert happened.
    fn insert(&self, entry: MsrEntry) -> Result<bool, ExtractError>;
    /// Delete the entry for `key`, if present.
    fn delete(&self, key: &MsrKey) -> Result<(), ExtractError>;
}

impl<T: ExtractStore + ?Sized> ExtractStore for Arc<T> {
    fn find(&self, key: &ExtractKey) -> Result<Option<ExtractEntry>, ExtractError> {
        (**self).find(key)
    }

    fn insert(&self, entry: ExtractEntry) -> Result<bool, ExtractError> {
        (**self).insert(entry)
    }

    fn delete(&self, key: &ExtractKey) -> Result<(), ExtractError> {
        (**self).delete(key)
    }
}

impl<T: MsrStore + ?Sized> MsrStore for Arc<T> {
    fn find(&self, key: &MsrKey) -> Result<Option<MsrEntry>, ExtractError> {
        (**self).find(key)
    }

    fn insert(&self, entry: MsrEntry) -> Result<bool, ExtractError> {
        (**self).insert(entry)
    }

    fn delete(&self, key: &MsrKey) -> Result<(), ExtractError> {
        (**self).delete(key)
    }
}

fn store_error(store: &str) -> ExtractError {
    ExtractError::Store {
        store: store.to_string(),
        reason: "lock poisoned".to_string(),
    }
}

/// In-memory extract store for tests and single-process runs.
#[derive(Debug, Default)]
pub struct InMemoryExtractStore {
    entries: RwLock<IndexMap<ExtractKey, ExtractEntry>>,
}

impl InMemoryExtractStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    /// True when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite an entry unconditionally.
    ///
    /// This is the worker-side transition hook: status flips bypass the
    /// compare-and-insert guard that protects planner inserts.
    pub fn put(&self, entry: ExtractEntry) -> Result<(), ExtractError> {
        let mut entries = self.entries.write().map_err(|_| store_error("extracts"))?;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }
}

impl ExtractStore for InMemoryExtractStore {
    fn find(&self, key: &ExtractKey) -> Result<Option<ExtractEntry>, ExtractError> {
        let entries = self.entries.read().map_err(|_| store_error("extracts"))?;
        Ok(entries.get(key).cloned())
    }

    fn insert(&self, entry: ExtractEntry) -> Result<bool, ExtractError> {
        let mut entries = self.entries.write().map_err(|_| store_error("extracts"))?;
        if entries.contains_key(&entry.key) {
            return Ok(false);
        }
        entries.insert(entry.key.clone(), entry);
        Ok(true)
    }

    fn delete(&self, key: &ExtractKey) -> Result<(), ExtractError> {
        let mut entries = self.entries.write().map_err(|_| store_error("extracts"))?;
        entries.shift_remove(key);
        Ok(())
    }
}

/// In-memory MSR store for tests and single-process runs.
#[derive(Debug, Default)]
pub struct InMemoryMsrStore {
    entries: RwLock<IndexMap<MsrKey, MsrEntry>>,
}

impl InMemoryMsrStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    /// True when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite an entry unconditionally (worker-side transition hook).
    pub fn put(&self, entry: MsrEntry) -> Result<(), ExtractError> {
        let mut entries = self.entries.write().map_err(|_| store_error("msr"))?;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }
}

impl MsrStore for InMemoryMsrStore {
    fn find(&self, key: &MsrKey) -> Result<Option<MsrEntry>, ExtractError> {
        let entries = self.entries.read().map_err(|_| store_error("msr"))?;
        Ok(entries.get(key).cloned())
    }

    fn insert(&self, entry: MsrEntry) -> Result<bool, ExtractError> {
        let mut entries = self.entries.write().map_err(|_| store_error("msr"))?;
        if entries.contains_key(&entry.key) {
            return Ok(false);
        }
        entries.insert(entry.key.clone(), entry);
        Ok(true)
    }

    fn delete(&self, key: &MsrKey) -> Result<(), ExtractError> {
        let mut entries = self.entries.write().map_err(|_| store_error("msr"))?;
        entries.shift_remove(key);
        Ok(())
    }
}
