//! Request walk-through: deduplicate against the caches and build the merge
//! plan.
//!
//! `check_request` is the single entry point the outer queue calls per
//! request. It queues missing work as a side effect and returns the counts
//! the caller uses to decide whether the request is immediately mergeable.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::cache::{Availability, ExtractCache, MsrTracker};
use crate::config::CacheConfig;
use crate::constants::msr::DERIVED_EXTRACT_TYPE;
use crate::errors::ExtractError;
use crate::hash;
use crate::path;
use crate::request::Request;
use crate::store::{Classification, ExtractKey, ExtractStore, MsrKey, MsrStore};
use crate::types::FieldOrdinal;

/// Which pipeline a merge item's fragment comes from; decides the column
/// naming rule at merge time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Derived extract of a shared MSR raster; column names are synthesized
    /// from the field ordinal.
    Aggregate,
    /// Direct extraction output; column names come from the file stem.
    Direct,
}

/// One expected output artifact of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeItem {
    /// Pipeline that produces the fragment.
    pub kind: SourceKind,
    /// Where the fragment will exist once its worker completes.
    pub csv_path: PathBuf,
    /// Shared ordinal pairing an MSR extract column with its reliability
    /// column; `None` for direct items.
    pub ordinal: Option<FieldOrdinal>,
}

/// Ordered list of every output artifact one request needs.
///
/// Built incrementally while walking the request, owned by the planner for
/// that request only, and consumed once by the merge engine. Aggregate items
/// sharing an ordinal are always adjacent (extract then reliability).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergePlan {
    items: Vec<MergeItem>,
}

impl MergePlan {
    /// Empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an expected artifact.
    pub fn push(&mut self, item: MergeItem) {
        self.items.push(item);
    }

    /// Planned items in merge order.
    pub fn items(&self) -> &[MergeItem] {
        &self.items
    }

    /// Number of planned items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the plan expects no artifacts.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Outcome of checking one request against the caches.
#[derive(Clone, Debug)]
pub struct RequestPlan {
    /// Extracts that are not yet complete (queued now or still in flight).
    pub extracts_needed: usize,
    /// MSR computations that are not yet complete.
    pub msrs_needed: usize,
    /// Every output artifact the request ultimately needs.
    pub merge_plan: MergePlan,
}

impl RequestPlan {
    /// True when no outstanding work remains and the request can merge now.
    pub fn is_ready(&self) -> bool {
        self.extracts_needed == 0 && self.msrs_needed == 0
    }
}

/// Walks a request's selections, consults both caches, and queues whatever
/// is missing.
pub struct DedupPlanner<ES: ExtractStore, MS: MsrStore> {
    config: CacheConfig,
    extracts: ExtractCache<ES>,
    msr: MsrTracker<MS>,
}

impl<ES: ExtractStore, MS: MsrStore> DedupPlanner<ES, MS> {
    /// Build a planner over the two shared stores.
    pub fn new(config: CacheConfig, extract_store: ES, msr_store: MS) -> Self {
        let msr = MsrTracker::new(msr_store, config.raster_root.clone());
        Self {
            config,
            extracts: ExtractCache::new(extract_store),
            msr,
        }
    }

    /// The extract cache front this planner consults.
    pub fn extract_cache(&self) -> &ExtractCache<ES> {
        &self.extracts
    }

    /// The MSR tracker this planner consults.
    pub fn msr_tracker(&self) -> &MsrTracker<MS> {
        &self.msr
    }

    /// Check `request` against both caches, queue missing work, and build the
    /// request's merge plan.
    ///
    /// The request is validated before any cache mutation. Afterwards each
    /// insert commits independently: if a later selection fails, the call
    /// returns an error without a plan and any already-committed inserts
    /// remain as harmless duplicate candidates for the retry. A partial plan
    /// is never returned.
    pub fn check_request(
        &self,
        request_id: &str,
        request: &Request,
    ) -> Result<RequestPlan, ExtractError> {
        request.validate()?;

        let boundary = &request.boundary.name;
        let mut plan = MergePlan::new();
        let mut extracts_needed = 0usize;
        let mut msrs_needed = 0usize;
        let mut ordinal: FieldOrdinal = 1;

        for (name, selection) in &request.aggregate_data {
            let params = hash::normalized_params(selection, &self.config)?;
            let digest = hash::param_hash(&params)?;
            let msr_key = MsrKey {
                dataset: selection.dataset.clone(),
                hash: digest.clone(),
            };
            let csv_path = path::msr_extract_csv_path(
                &self.config.extract_root,
                boundary,
                &selection.dataset,
                &digest,
            );
            debug!(
                request_id,
                selection = %name,
                dataset = %selection.dataset,
                hash = %digest,
                "checking aggregate selection"
            );

            match self.msr.lookup(&msr_key)? {
                Availability::Ready => {
                    let extract_key = ExtractKey {
                        boundary: boundary.clone(),
                        raster: path::msr_raster_id(&selection.dataset, &digest),
                        extract_type: DERIVED_EXTRACT_TYPE.to_string(),
                        reliability: true,
                    };
                    match self.extracts.lookup(&extract_key, &csv_path)? {
                        Availability::Ready => {}
                        Availability::Absent => {
                            extracts_needed += 1;
                            self.extracts.insert(extract_key, Classification::Msr)?;
                        }
                        Availability::InFlight => extracts_needed += 1,
                        Availability::Failed => {
                            extracts_needed += 1;
                            warn!(
                                request_id,
                                selection = %name,
                                "derived msr extract in terminal error state"
                            );
                        }
                    }
                }
                seen => {
                    // The derived extract cannot run until the raster exists,
                    // so only the MSR is queued here.
                    msrs_needed += 1;
                    extracts_needed += 1;
                    match seen {
                        Availability::Absent => {
                            self.msr.insert(msr_key, params)?;
                        }
                        Availability::Failed => {
                            warn!(
                                request_id,
                                selection = %name,
                                dataset = %selection.dataset,
                                hash = %digest,
                                "msr in terminal error state"
                            );
                        }
                        Availability::InFlight | Availability::Ready => {}
                    }
                }
            }

            plan.push(MergeItem {
                kind: SourceKind::Aggregate,
                csv_path: csv_path.clone(),
                ordinal: Some(ordinal),
            });
            plan.push(MergeItem {
                kind: SourceKind::Aggregate,
                csv_path: path::reliability_sibling(&csv_path),
                ordinal: Some(ordinal),
            });
            ordinal += 1;
        }

        for (group_name, group) in &request.direct_data {
            for file in &group.files {
                for extract_type in &group.options.extract_types {
                    let basename = path::direct_basename(&file.name, extract_type);
                    let csv_path = path::extract_csv_path(
                        &self.config.extract_root,
                        boundary,
                        group_name,
                        extract_type,
                        &basename,
                    );
                    let key = ExtractKey {
                        boundary: boundary.clone(),
                        raster: file.name.clone(),
                        extract_type: extract_type.clone(),
                        reliability: file.reliability,
                    };
                    match self.extracts.lookup(&key, &csv_path)? {
                        Availability::Ready => {}
                        Availability::Absent => {
                            extracts_needed += 1;
                            self.extracts.insert(key, Classification::Direct)?;
                        }
                        Availability::InFlight => extracts_needed += 1,
                        Availability::Failed => {
                            extracts_needed += 1;
                            warn!(
                                request_id,
                                group = %group_name,
                                raster = %file.name,
                                extract_type = %extract_type,
                                "extract in terminal error state"
                            );
                        }
                    }

                    plan.push(MergeItem {
                        kind: SourceKind::Direct,
                        csv_path: csv_path.clone(),
                        ordinal: None,
                    });
                    if file.reliability {
                        plan.push(MergeItem {
                            kind: SourceKind::Direct,
                            csv_path: path::reliability_sibling(&csv_path),
                            ordinal: None,
                        });
                    }
                }
            }
        }

        debug!(
            request_id,
            extracts_needed,
            msrs_needed,
            items = plan.len(),
            "request checked"
        );
        Ok(RequestPlan {
            extracts_needed,
            msrs_needed,
            merge_plan: plan,
        })
    }
}
