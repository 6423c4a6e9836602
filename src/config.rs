use std::path::PathBuf;

use crate::constants::{hashing, paths};

/// Shared configuration for cache lookups, planning, and merging.
///
/// The three roots point at a shared network-attached store in production;
/// tests override them with temporary directories.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Root under which per-boundary extract CSVs are cached.
    pub extract_root: PathBuf,
    /// Root of the raster store holding shared MSR rasters.
    pub raster_root: PathBuf,
    /// Root under which per-request merged results are written.
    pub results_root: PathBuf,
    /// Resolution constant merged into hashed MSR parameter objects.
    pub msr_resolution: f64,
    /// Version constant merged into hashed MSR parameter objects.
    ///
    /// Exists so a change of canonical serialization rules can be made to
    /// invalidate all existing cache keys explicitly.
    pub msr_version: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            extract_root: PathBuf::from(paths::DEFAULT_EXTRACT_ROOT),
            raster_root: PathBuf::from(paths::DEFAULT_RASTER_ROOT),
            results_root: PathBuf::from(paths::DEFAULT_RESULTS_ROOT),
            msr_resolution: hashing::MSR_RESOLUTION,
            msr_version: hashing::MSR_VERSION,
        }
    }
}
