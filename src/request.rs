use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ExtractError;
use crate::types::{BoundaryName, DatasetName, ExtractType, GroupName, SelectionName};

/// Boundary layer a request extracts against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Boundary {
    /// Boundary layer name; becomes a path segment of cached extract CSVs.
    pub name: BoundaryName,
    /// Path of the boundary geometry file (consumed by the external workers).
    pub path: String,
}

/// One aggregate-pipeline (MSR) dataset selection.
///
/// The whole selection object, `dataset` included, is hashed after the fixed
/// resolution and version constants are merged in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregateSelection {
    /// Dataset the shared MSR raster is built from.
    pub dataset: DatasetName,
    /// Dataset-specific options, carried verbatim into the hashed object.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

/// A raster file within a direct-pipeline group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectFile {
    /// File name; used as the raster identifier and output basename stem.
    pub name: String,
    /// Path relative to the group's base.
    pub path: String,
    /// Whether a companion reliability raster is extracted alongside.
    pub reliability: bool,
}

/// Extraction options for a direct-pipeline group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectOptions {
    /// Statistics to extract for every file in the group.
    pub extract_types: Vec<ExtractType>,
}

/// One direct-pipeline dataset group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectGroup {
    /// Base path the group's raster files live under.
    pub base: String,
    /// Temporal classification of the group (`"None"` for static rasters);
    /// interpreted by the external workers, not by planning.
    pub temporal_type: String,
    /// Raster files to extract, in request order.
    pub files: Vec<DirectFile>,
    /// Extraction options shared by every file in the group.
    pub options: DirectOptions,
}

/// A submitted extraction request.
///
/// Both selection groups use `BTreeMap` so planning iterates in sorted name
/// order; hashing and field-ordinal assignment are deterministic across runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    /// Boundary layer every extract in this request runs against.
    pub boundary: Boundary,
    /// Aggregate-pipeline selections, keyed by selection name.
    #[serde(default)]
    pub aggregate_data: BTreeMap<SelectionName, AggregateSelection>,
    /// Direct-pipeline groups, keyed by group name.
    #[serde(default)]
    pub direct_data: BTreeMap<GroupName, DirectGroup>,
}

impl Request {
    /// Validate invariants the schema cannot express.
    ///
    /// Runs before any cache mutation; a malformed request fails fast and
    /// leaves both caches untouched.
    pub fn validate(&self) -> Result<(), ExtractError> {
        require_segment("boundary name", &self.boundary.name)?;
        for (name, selection) in &self.aggregate_data {
            if name.is_empty() {
                return Err(ExtractError::MalformedRequest(
                    "aggregate selection with empty name".into(),
                ));
            }
            require_segment(&format!("dataset of selection '{name}'"), &selection.dataset)?;
        }
        for (name, group) in &self.direct_data {
            require_segment(&format!("direct group name '{name}'"), name)?;
            if group.options.extract_types.is_empty() {
                return Err(ExtractError::MalformedRequest(format!(
                    "direct group '{name}' requests no extract types"
                )));
            }
            for extract_type in &group.options.extract_types {
                require_segment(
                    &format!("extract type in group '{name}'"),
                    extract_type,
                )?;
            }
            for file in &group.files {
                require_segment(&format!("file name in group '{name}'"), &file.name)?;
            }
        }
        Ok(())
    }
}

/// A value that becomes a path segment must be non-empty and slash-free.
fn require_segment(what: &str, value: &str) -> Result<(), ExtractError> {
    if value.is_empty() {
        return Err(ExtractError::MalformedRequest(format!("{what} is empty")));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(ExtractError::MalformedRequest(format!(
            "{what} contains a path separator: '{value}'"
        )));
    }
    Ok(())
}
