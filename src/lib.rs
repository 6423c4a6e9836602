#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Self-healing cache fronts over the extract and MSR stores.
pub mod cache;
/// Shared configuration for caches, planning, and merging.
pub mod config;
/// Grouped constants: hashing, status codes, path segments, merge naming.
pub mod constants;
/// Parameter normalization and content hashing.
pub mod hash;
/// Merge engine producing the per-request results table.
pub mod merge;
/// Artifact path conventions.
pub mod path;
/// Dedup planner walking a request's dataset selections.
pub mod planner;
/// Typed request schema and ingress validation.
pub mod request;
/// Cache entry records, repository traits, and in-memory stores.
pub mod store;
/// Shared type aliases.
pub mod types;

mod errors;

pub use cache::{Availability, CacheStats, ExtractCache, MsrTracker};
pub use config::CacheConfig;
pub use errors::ExtractError;
pub use merge::{MergeEngine, MergedTable};
pub use planner::{DedupPlanner, MergeItem, MergePlan, RequestPlan, SourceKind};
pub use request::{AggregateSelection, Boundary, DirectFile, DirectGroup, DirectOptions, Request};
pub use store::{
    Classification, ExtractEntry, ExtractKey, ExtractStore, InMemoryExtractStore, InMemoryMsrStore,
    MsrEntry, MsrKey, MsrStore, Status,
};
pub use types::{
    BoundaryName, ColumnName, DatasetName, ExtractType, FieldOrdinal, GroupName, ParamHash,
    RasterId, RequestId, SelectionName,
};
