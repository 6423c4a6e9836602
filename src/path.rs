//! Artifact path construction shared by the planner, caches, and merge engine.
//!
//! Extract fragments live under
//! `<extract-root>/<boundary>/cache/<dataset-or-group>/<extract-type>/<basename>.csv`,
//! with the reliability companion replacing the trailing `.csv` by `r.csv`.
//! MSR rasters live under `<raster-root>/internal/msr/<dataset>/<hash>/raster.asc`;
//! that path depends only on dataset and hash, which is what makes MSR
//! results shareable across requests.

use std::path::{Path, PathBuf};

use crate::constants::msr::DERIVED_EXTRACT_TYPE;
use crate::constants::paths::{
    CACHE_SEGMENT, CSV_EXTENSION, INTERNAL_SEGMENT, MSR_RASTER_FILENAME, MSR_SEGMENT,
    RELIABILITY_SUFFIX, RESULTS_FILENAME,
};
use crate::types::RasterId;

/// Cached extract CSV path for one boundary/dataset/extract-type/basename.
pub fn extract_csv_path(
    extract_root: &Path,
    boundary: &str,
    dataset: &str,
    extract_type: &str,
    basename: &str,
) -> PathBuf {
    extract_root
        .join(boundary)
        .join(CACHE_SEGMENT)
        .join(dataset)
        .join(extract_type)
        .join(format!("{basename}{CSV_EXTENSION}"))
}

/// Reliability companion for an extract CSV: trailing `.csv` becomes `r.csv`.
///
/// Paths produced by [`extract_csv_path`] always end in `.csv`; any other
/// input gets `r.csv` appended as-is.
pub fn reliability_sibling(csv_path: &Path) -> PathBuf {
    let raw = csv_path.to_string_lossy();
    match raw.strip_suffix(CSV_EXTENSION) {
        Some(stem) => PathBuf::from(format!("{stem}{RELIABILITY_SUFFIX}{CSV_EXTENSION}")),
        None => PathBuf::from(format!("{raw}{RELIABILITY_SUFFIX}{CSV_EXTENSION}")),
    }
}

/// Shared MSR raster artifact path for a (dataset, hash) pair.
pub fn msr_raster_path(raster_root: &Path, dataset: &str, hash: &str) -> PathBuf {
    raster_root
        .join(INTERNAL_SEGMENT)
        .join(MSR_SEGMENT)
        .join(dataset)
        .join(hash)
        .join(MSR_RASTER_FILENAME)
}

/// Derived single-summary extract CSV for a completed MSR raster.
pub fn msr_extract_csv_path(
    extract_root: &Path,
    boundary: &str,
    dataset: &str,
    hash: &str,
) -> PathBuf {
    extract_csv_path(extract_root, boundary, dataset, DERIVED_EXTRACT_TYPE, hash)
}

/// Raster identifier under which an MSR's derived extract is queued.
pub fn msr_raster_id(dataset: &str, hash: &str) -> RasterId {
    format!("{dataset}_{hash}")
}

/// Output basename for a direct-pipeline extract; encodes file and extract
/// type so merged column names never collide.
pub fn direct_basename(file_name: &str, extract_type: &str) -> String {
    format!("{file_name}_{extract_type}")
}

/// Merged results path for one request.
pub fn results_csv_path(results_root: &Path, request_id: &str) -> PathBuf {
    results_root.join(request_id).join(RESULTS_FILENAME)
}
