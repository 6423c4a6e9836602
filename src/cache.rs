//! Self-healing cache fronts over the extract and MSR stores.
//!
//! A `complete` entry is only trusted when its output artifact actually
//! exists; a confirmed-missing file is authoritative and triggers deletion of
//! the entry (crash recovery, artifacts removed out-of-band). Entries with a
//! status outside the known domain are terminal and never purged.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::ExtractError;
use crate::path;
use crate::store::{
    Classification, ExtractEntry, ExtractKey, ExtractStore, MsrEntry, MsrKey, MsrStore, Status,
};

/// Availability of a cached computation, as seen by the planner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Availability {
    /// No live entry, or a stale `complete` entry that was just purged.
    Absent,
    /// An entry exists and a worker still owns it.
    InFlight,
    /// Completed, and the backing artifact is present on disk.
    Ready,
    /// Entry carries a status outside the known domain; terminal condition
    /// requiring operator attention, never auto-retried.
    Failed,
}

impl Availability {
    /// True when the computation finished and its artifact is verified.
    pub fn is_ready(self) -> bool {
        matches!(self, Availability::Ready)
    }
}

/// Hit/miss/repair counters for one cache front.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    repairs: AtomicU64,
}

impl CacheStats {
    /// Lookups that returned [`Availability::Ready`].
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that found no live entry.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Stale `complete` entries purged because their artifact was missing.
    pub fn repairs(&self) -> u64 {
        self.repairs.load(Ordering::Relaxed)
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_repair(&self) {
        self.repairs.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cache of single-raster extract computations, keyed by
/// (boundary, raster, extract type, reliability flag).
pub struct ExtractCache<S: ExtractStore> {
    store: S,
    stats: CacheStats,
}

impl<S: ExtractStore> ExtractCache<S> {
    /// Wrap a backing store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            stats: CacheStats::default(),
        }
    }

    /// Hit/miss/repair counters for this cache.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Report availability of the extract identified by `key`.
    ///
    /// In-flight entries are trusted without touching the filesystem. A
    /// `complete` entry is verified against `csv_path` (and its reliability
    /// sibling when the key is flagged); on verification failure the entry is
    /// purged and the lookup reports [`Availability::Absent`].
    pub fn lookup(&self, key: &ExtractKey, csv_path: &Path) -> Result<Availability, ExtractError> {
        let Some(entry) = self.store.find(key)? else {
            self.stats.record_miss();
            return Ok(Availability::Absent);
        };
        match entry.status {
            Status::Pending | Status::Running | Status::Retrying => Ok(Availability::InFlight),
            Status::Complete => {
                if verified_on_disk(csv_path, key.reliability) {
                    self.stats.record_hit();
                    Ok(Availability::Ready)
                } else {
                    warn!(
                        boundary = %key.boundary,
                        raster = %key.raster,
                        extract_type = %key.extract_type,
                        path = %csv_path.display(),
                        "complete extract entry has no backing file, purging"
                    );
                    self.store.delete(key)?;
                    self.stats.record_repair();
                    Ok(Availability::Absent)
                }
            }
            Status::Other(code) => {
                warn!(
                    boundary = %key.boundary,
                    raster = %key.raster,
                    extract_type = %key.extract_type,
                    code,
                    "extract entry in unknown terminal state"
                );
                Ok(Availability::Failed)
            }
        }
    }

    /// Queue a new `pending` extract.
    ///
    /// Returns `false` when another processor already claimed the key; that
    /// is the benign outcome of the shared-store check-then-act race, not an
    /// error.
    pub fn insert(
        &self,
        key: ExtractKey,
        classification: Classification,
    ) -> Result<bool, ExtractError> {
        let raster = key.raster.clone();
        let inserted = self
            .store
            .insert(ExtractEntry::pending(key, classification))?;
        if inserted {
            debug!(raster = %raster, ?classification, "queued extract");
        } else {
            debug!(raster = %raster, "extract already claimed");
        }
        Ok(inserted)
    }
}

/// Tracker for shared MSR raster computations, keyed by (dataset, parameter
/// hash). The artifact path depends only on that key, never on boundary or
/// request id, which is what makes MSR results shareable across requests.
pub struct MsrTracker<S: MsrStore> {
    store: S,
    raster_root: PathBuf,
    stats: CacheStats,
}

impl<S: MsrStore> MsrTracker<S> {
    /// Wrap a backing store; `raster_root` anchors artifact verification.
    pub fn new(store: S, raster_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            raster_root: raster_root.into(),
            stats: CacheStats::default(),
        }
    }

    /// Hit/miss/repair counters for this tracker.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Report availability of the MSR identified by `key`, with the same
    /// verify-and-purge behavior as [`ExtractCache::lookup`] against the
    /// shared raster artifact.
    pub fn lookup(&self, key: &MsrKey) -> Result<Availability, ExtractError> {
        let Some(entry) = self.store.find(key)? else {
            self.stats.record_miss();
            return Ok(Availability::Absent);
        };
        match entry.status {
            Status::Pending | Status::Running | Status::Retrying => Ok(Availability::InFlight),
            Status::Complete => {
                let raster_path = path::msr_raster_path(&self.raster_root, &key.dataset, &key.hash);
                if raster_path.is_file() {
                    self.stats.record_hit();
                    Ok(Availability::Ready)
                } else {
                    warn!(
                        dataset = %key.dataset,
                        hash = %key.hash,
                        path = %raster_path.display(),
                        "complete msr entry has no backing raster, purging"
                    );
                    self.store.delete(key)?;
                    self.stats.record_repair();
                    Ok(Availability::Absent)
                }
            }
            Status::Other(code) => {
                warn!(
                    dataset = %key.dataset,
                    hash = %key.hash,
                    code,
                    "msr entry in unknown terminal state"
                );
                Ok(Availability::Failed)
            }
        }
    }

    /// Track a new `pending` MSR computation; `options` is the full
    /// normalized parameter object its hash was computed from.
    ///
    /// Returns `false` when another processor already claimed the key.
    pub fn insert(&self, key: MsrKey, options: Value) -> Result<bool, ExtractError> {
        let dataset = key.dataset.clone();
        let hash = key.hash.clone();
        let inserted = self.store.insert(MsrEntry::pending(key, options))?;
        if inserted {
            debug!(dataset = %dataset, hash = %hash, "queued msr computation");
        } else {
            debug!(dataset = %dataset, hash = %hash, "msr already claimed");
        }
        Ok(inserted)
    }
}

fn verified_on_disk(csv_path: &Path, reliability: bool) -> bool {
    if !csv_path.is_file() {
        return false;
    }
    !reliability || path::reliability_sibling(csv_path).is_file()
}
