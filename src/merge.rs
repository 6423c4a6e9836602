//! Merge engine: assemble one per-request results table from CSV fragments.
//!
//! Fragments for one request share row count and row order (they derive from
//! the same boundary geometry), so the merge is positional: the first
//! fragment seeds the table verbatim and every later fragment contributes
//! only its value column. Row counts are verified; a mismatch is fatal, never
//! a silent truncation.

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use indexmap::IndexMap;
use tracing::info;

use crate::config::CacheConfig;
use crate::constants::merge::{MSR_FIELD_PREFIX, MSR_FIELD_WIDTH, VALUE_COLUMN};
use crate::constants::paths::RELIABILITY_SUFFIX;
use crate::errors::ExtractError;
use crate::path;
use crate::planner::{MergeItem, MergePlan, SourceKind};
use crate::types::ColumnName;

/// Merged per-request output table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedTable {
    /// Seed fragment columns (value column renamed) plus one column per
    /// later fragment.
    pub headers: Vec<ColumnName>,
    /// Data rows, positionally aligned across fragments.
    pub rows: Vec<Vec<String>>,
}

impl MergedTable {
    /// Values of the named column, if present.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.headers.iter().position(|header| header == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }
}

/// Assembles a request's outputs once all planned artifacts exist.
pub struct MergeEngine {
    config: CacheConfig,
}

impl MergeEngine {
    /// Build a merge engine over the configured roots.
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// Merge every fragment in `plan` and write the result to
    /// `<results-root>/<request-id>/results.csv` (parents created).
    ///
    /// A fragment missing on disk aborts the request with
    /// [`ExtractError::MissingArtifact`]; nothing is substituted. The
    /// destination is request-scoped and single-writer, so the write itself
    /// needs no locking.
    pub fn merge(&self, request_id: &str, plan: MergePlan) -> Result<MergedTable, ExtractError> {
        if plan.is_empty() {
            return Err(ExtractError::InvalidPlan("empty merge plan".into()));
        }

        // Remembers the synthesized column base per merge-log key so an MSR
        // extract column and its reliability column always pair up.
        let mut merge_log: IndexMap<String, ColumnName> = IndexMap::new();
        let mut table: Option<MergedTable> = None;

        for item in plan.items() {
            if !item.csv_path.is_file() {
                return Err(ExtractError::MissingArtifact {
                    path: item.csv_path.clone(),
                });
            }
            let column = column_name(item, &mut merge_log)?;
            let fragment = read_fragment(&item.csv_path)?;
            match table.as_mut() {
                None => table = Some(seed_table(fragment, column)),
                Some(seeded) => append_column(seeded, fragment, column, &item.csv_path)?,
            }
        }

        let table = table.ok_or_else(|| ExtractError::InvalidPlan("empty merge plan".into()))?;

        let output = path::results_csv_path(&self.config.results_root, request_id);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = WriterBuilder::new().from_path(&output)?;
        writer.write_record(&table.headers)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        info!(
            request_id,
            columns = table.headers.len(),
            rows = table.rows.len(),
            path = %output.display(),
            "merged results written"
        );
        Ok(table)
    }
}

/// One fragment read into memory, with the value column located.
struct Fragment {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    value_idx: usize,
}

fn read_fragment(csv_path: &Path) -> Result<Fragment, ExtractError> {
    let mut reader = ReaderBuilder::new().from_path(csv_path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let value_idx = headers
        .iter()
        .position(|header| header == VALUE_COLUMN)
        .ok_or_else(|| ExtractError::MissingValueColumn {
            path: csv_path.to_path_buf(),
            column: VALUE_COLUMN.to_string(),
        })?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Fragment {
        headers,
        rows,
        value_idx,
    })
}

/// Derive the output column name for one merge item.
///
/// Direct fragments are named by their file stem, which already encodes
/// dataset, extract type, and reliability. Aggregate fragments get a
/// synthesized `ad_msr<ordinal>` base minted on first sight of their
/// merge-log key (the stem minus a trailing `r`; primary stems are hex
/// digests, so the strip is unambiguous), with the original trailing suffix
/// appended back — the pair differs by exactly that one character, whatever
/// the real dataset name was.
fn column_name(
    item: &MergeItem,
    merge_log: &mut IndexMap<String, ColumnName>,
) -> Result<ColumnName, ExtractError> {
    let stem = item
        .csv_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| {
            ExtractError::InvalidPlan(format!(
                "fragment path '{}' has no utf-8 stem",
                item.csv_path.display()
            ))
        })?;
    match item.kind {
        SourceKind::Direct => Ok(stem.to_string()),
        SourceKind::Aggregate => {
            let ordinal = item.ordinal.ok_or_else(|| {
                ExtractError::InvalidPlan(format!(
                    "aggregate item '{}' has no field ordinal",
                    item.csv_path.display()
                ))
            })?;
            let (log_key, suffix) = match stem.strip_suffix(RELIABILITY_SUFFIX) {
                Some(base) => (base, RELIABILITY_SUFFIX),
                None => (stem, ""),
            };
            let base = merge_log
                .entry(log_key.to_string())
                .or_insert_with(|| {
                    format!("{MSR_FIELD_PREFIX}{ordinal:0width$}", width = MSR_FIELD_WIDTH)
                });
            Ok(format!("{base}{suffix}"))
        }
    }
}

fn seed_table(fragment: Fragment, column: ColumnName) -> MergedTable {
    let mut headers = fragment.headers;
    headers[fragment.value_idx] = column;
    MergedTable {
        headers,
        rows: fragment.rows,
    }
}

fn append_column(
    table: &mut MergedTable,
    fragment: Fragment,
    column: ColumnName,
    csv_path: &Path,
) -> Result<(), ExtractError> {
    if fragment.rows.len() != table.rows.len() {
        return Err(ExtractError::RowCountMismatch {
            path: csv_path.to_path_buf(),
            expected: table.rows.len(),
            actual: fragment.rows.len(),
        });
    }
    table.headers.push(column);
    for (row, fragment_row) in table.rows.iter_mut().zip(fragment.rows) {
        let value = fragment_row.into_iter().nth(fragment.value_idx).ok_or_else(|| {
            ExtractError::MissingValueColumn {
                path: csv_path.to_path_buf(),
                column: VALUE_COLUMN.to_string(),
            }
        })?;
        row.push(value);
    }
    Ok(())
}
