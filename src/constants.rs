/// Constants merged into hashed MSR parameter objects.
pub mod hashing {
    /// Fixed raster resolution merged into every hashed parameter object.
    pub const MSR_RESOLUTION: f64 = 0.05;
    /// Version constant merged into every hashed parameter object.
    ///
    /// Bump whenever the canonical serialization rules change; every existing
    /// cache key is invalidated by such a change.
    pub const MSR_VERSION: f64 = 0.1;
    /// JSON field name carrying the merged resolution constant.
    pub const FIELD_RESOLUTION: &str = "resolution";
    /// JSON field name carrying the merged version constant.
    pub const FIELD_VERSION: &str = "version";
}

/// Stored status codes for extract and MSR entries.
///
/// The domain is `{0,1,2,3}` plus an unreserved "other" bucket; unlisted
/// values are terminal error states, never retried and never purged.
pub mod status {
    /// Queued, not yet picked up by a worker.
    pub const PENDING: i64 = 0;
    /// Finished; the output artifact should exist on disk.
    pub const COMPLETE: i64 = 1;
    /// Picked up by a worker.
    pub const RUNNING: i64 = 2;
    /// Failed at least once and requeued.
    pub const RETRYING: i64 = 3;
}

/// Path segments and filename conventions for cached artifacts.
pub mod paths {
    /// Directory under each boundary holding cached extract CSVs.
    pub const CACHE_SEGMENT: &str = "cache";
    /// First segment of internally produced rasters under the raster root.
    pub const INTERNAL_SEGMENT: &str = "internal";
    /// Aggregate-kind segment for shared MSR rasters.
    pub const MSR_SEGMENT: &str = "msr";
    /// Filename of a completed MSR raster inside its hash directory.
    pub const MSR_RASTER_FILENAME: &str = "raster.asc";
    /// Extension of extract output fragments.
    pub const CSV_EXTENSION: &str = ".csv";
    /// Suffix inserted before `.csv` on reliability companion fragments.
    pub const RELIABILITY_SUFFIX: &str = "r";
    /// Filename of the merged per-request output table.
    pub const RESULTS_FILENAME: &str = "results.csv";

    /// Default root of the shared per-boundary extract cache.
    pub const DEFAULT_EXTRACT_ROOT: &str = "/sciclone/aiddata10/REU/extracts";
    /// Default root of the raster store holding shared MSR rasters.
    pub const DEFAULT_RASTER_ROOT: &str = "/sciclone/aiddata10/REU/data/rasters";
    /// Default root under which per-request results are written.
    pub const DEFAULT_RESULTS_ROOT: &str = "/sciclone/aiddata10/REU/det/results";
}

/// Constants for the MSR (aggregate) pipeline's derived extract.
pub mod msr {
    /// Extract type of the single-summary extract run over a completed MSR raster.
    pub const DERIVED_EXTRACT_TYPE: &str = "sum";
}

/// Column naming used by the merge engine.
pub mod merge {
    /// Fixed value-column name carried by every extract fragment.
    pub const VALUE_COLUMN: &str = "ad_extract";
    /// Prefix of synthesized MSR column names.
    pub const MSR_FIELD_PREFIX: &str = "ad_msr";
    /// Zero-padded width of the ordinal in synthesized MSR column names.
    pub const MSR_FIELD_WIDTH: usize = 3;
}
