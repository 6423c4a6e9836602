/// Identifier of a submitted extraction request (assigned by the outer queue).
/// Example: `5f2b8c9e4a1d`
pub type RequestId = String;
/// Boundary layer name; first path segment of cached extract CSVs.
/// Example: `npl_adm3`
pub type BoundaryName = String;
/// Identifier of the raster an extract runs against.
/// Examples: `pop_2015`, `geocoded_aid_4d1f...` (dataset + parameter hash for MSR extracts)
pub type RasterId = String;
/// Dataset name for aggregate-pipeline selections.
/// Example: `geocoded_aid`
pub type DatasetName = String;
/// Extract statistic identifier requested for a raster.
/// Examples: `mean`, `max`, `sum`
pub type ExtractType = String;
/// SHA-1 hex digest of a normalized parameter object (40 lowercase hex chars).
pub type ParamHash = String;
/// Name of one aggregate-pipeline selection inside a request.
pub type SelectionName = String;
/// Name of one direct-pipeline dataset group inside a request.
pub type GroupName = String;
/// Shared ordinal pairing an MSR extract column with its reliability column.
/// Starts at 1 and increments once per aggregate selection.
pub type FieldOrdinal = u32;
/// Column name in the merged results table.
/// Examples: `pop_2015_mean`, `ad_msr001`, `ad_msr001r`
pub type ColumnName = String;
