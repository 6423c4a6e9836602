use std::fs;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use extracts::hash::{normalized_params, param_hash};
use extracts::store::{ExtractStore, MsrStore};
use extracts::{
    CacheConfig, Classification, DedupPlanner, ExtractEntry, ExtractKey, InMemoryExtractStore,
    InMemoryMsrStore, MsrEntry, MsrKey, Request, SourceKind, Status,
};

fn test_config(dir: &TempDir) -> CacheConfig {
    CacheConfig {
        extract_root: dir.path().join("extracts"),
        raster_root: dir.path().join("rasters"),
        results_root: dir.path().join("results"),
        ..CacheConfig::default()
    }
}

type TestPlanner = DedupPlanner<Arc<InMemoryExtractStore>, Arc<InMemoryMsrStore>>;

fn build_planner(
    config: &CacheConfig,
) -> (TestPlanner, Arc<InMemoryExtractStore>, Arc<InMemoryMsrStore>) {
    let extract_store = Arc::new(InMemoryExtractStore::new());
    let msr_store = Arc::new(InMemoryMsrStore::new());
    let planner = DedupPlanner::new(config.clone(), extract_store.clone(), msr_store.clone());
    (planner, extract_store, msr_store)
}

fn direct_request() -> Request {
    serde_json::from_value(json!({
        "boundary": {"name": "npl_adm3", "path": "/boundaries/npl_adm3.geojson"},
        "direct_data": {
            "worldpop": {
                "base": "/data/rasters/external/worldpop",
                "temporal_type": "None",
                "files": [{"name": "pop_2015", "path": "pop_2015.tif", "reliability": false}],
                "options": {"extract_types": ["mean"]}
            }
        }
    }))
    .expect("request parses")
}

fn aggregate_request() -> Request {
    serde_json::from_value(json!({
        "boundary": {"name": "npl_adm3", "path": "/boundaries/npl_adm3.geojson"},
        "aggregate_data": {
            "sel_a": {"dataset": "geocoded_aid", "sector": "110"}
        }
    }))
    .expect("request parses")
}

/// Digest the planner will compute for `aggregate_request`'s single selection.
fn selection_digest(config: &CacheConfig, request: &Request) -> String {
    let selection = request.aggregate_data.values().next().expect("one selection");
    let params = normalized_params(selection, config).expect("normalizes");
    param_hash(&params).expect("hashes")
}

#[test]
fn direct_request_queues_one_pending_extract() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (planner, extract_store, msr_store) = build_planner(&config);

    let plan = planner.check_request("r1", &direct_request()).unwrap();

    assert_eq!(plan.extracts_needed, 1);
    assert_eq!(plan.msrs_needed, 0);
    assert!(!plan.is_ready());
    assert!(msr_store.is_empty());

    assert_eq!(extract_store.len(), 1);
    let key = ExtractKey {
        boundary: "npl_adm3".into(),
        raster: "pop_2015".into(),
        extract_type: "mean".into(),
        reliability: false,
    };
    let entry = extract_store.find(&key).unwrap().expect("entry queued");
    assert_eq!(entry.status, Status::Pending);
    assert_eq!(entry.classification, Classification::Direct);
    assert_eq!(entry.priority, 0);
    assert_eq!(entry.submit_time, entry.update_time);

    // File not flagged as a reliability raster, so exactly one merge item.
    assert_eq!(plan.merge_plan.len(), 1);
    let item = &plan.merge_plan.items()[0];
    assert_eq!(item.kind, SourceKind::Direct);
    assert_eq!(item.ordinal, None);
    assert!(item
        .csv_path
        .ends_with("npl_adm3/cache/worldpop/mean/pop_2015_mean.csv"));
}

#[test]
fn zero_selection_request_is_immediately_ready() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (planner, extract_store, msr_store) = build_planner(&config);

    let request: Request = serde_json::from_value(json!({
        "boundary": {"name": "npl_adm3", "path": "/boundaries/npl_adm3.geojson"}
    }))
    .unwrap();
    let plan = planner.check_request("r1", &request).unwrap();

    assert_eq!((plan.extracts_needed, plan.msrs_needed), (0, 0));
    assert!(plan.is_ready());
    assert!(plan.merge_plan.is_empty());
    assert!(extract_store.is_empty());
    assert!(msr_store.is_empty());
}

#[test]
fn reliability_file_adds_the_sibling_merge_item() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (planner, extract_store, _) = build_planner(&config);

    let request: Request = serde_json::from_value(json!({
        "boundary": {"name": "npl_adm3", "path": "/boundaries/npl_adm3.geojson"},
        "direct_data": {
            "accessibility": {
                "base": "/data/rasters/external/accessibility",
                "temporal_type": "None",
                "files": [{"name": "travel_time", "path": "tt.tif", "reliability": true}],
                "options": {"extract_types": ["mean"]}
            }
        }
    }))
    .unwrap();
    let plan = planner.check_request("r1", &request).unwrap();

    assert_eq!(plan.extracts_needed, 1);
    assert_eq!(extract_store.len(), 1);
    assert_eq!(plan.merge_plan.len(), 2);
    let items = plan.merge_plan.items();
    assert!(items[0].csv_path.ends_with("travel_time_mean.csv"));
    assert!(items[1].csv_path.ends_with("travel_time_meanr.csv"));
}

#[test]
fn check_request_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (planner, extract_store, msr_store) = build_planner(&config);
    let request = direct_request();

    let first = planner.check_request("r1", &request).unwrap();
    let second = planner.check_request("r1", &request).unwrap();

    // No worker progress in between: same counts, same plan, no double insert.
    assert_eq!(first.extracts_needed, second.extracts_needed);
    assert_eq!(first.msrs_needed, second.msrs_needed);
    assert_eq!(first.merge_plan, second.merge_plan);
    assert_eq!(extract_store.len(), 1);
    assert!(msr_store.is_empty());
}

#[test]
fn aggregate_selection_without_msr_queues_the_tracker_entry() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (planner, extract_store, msr_store) = build_planner(&config);
    let request = aggregate_request();

    let plan = planner.check_request("r1", &request).unwrap();

    assert_eq!(plan.extracts_needed, 1);
    assert_eq!(plan.msrs_needed, 1);

    // Only the MSR is queued; its derived extract cannot run yet.
    assert!(extract_store.is_empty());
    assert_eq!(msr_store.len(), 1);
    let digest = selection_digest(&config, &request);
    let entry = msr_store
        .find(&MsrKey {
            dataset: "geocoded_aid".into(),
            hash: digest.clone(),
        })
        .unwrap()
        .expect("msr queued");
    assert_eq!(entry.status, Status::Pending);
    assert!(entry.jobs.is_empty());
    assert_eq!(entry.options["sector"], "110");
    assert_eq!(entry.options["resolution"], 0.05);
    assert_eq!(entry.options["version"], 0.1);

    // Extract and reliability fragments share the selection's ordinal.
    assert_eq!(plan.merge_plan.len(), 2);
    let items = plan.merge_plan.items();
    assert_eq!(items[0].kind, SourceKind::Aggregate);
    assert_eq!(items[0].ordinal, Some(1));
    assert_eq!(items[1].ordinal, Some(1));
    assert!(items[0].csv_path.ends_with(format!(
        "npl_adm3/cache/geocoded_aid/sum/{digest}.csv"
    )));
    assert!(items[1].csv_path.ends_with(format!(
        "npl_adm3/cache/geocoded_aid/sum/{digest}r.csv"
    )));
}

#[test]
fn complete_msr_queues_the_derived_extract() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (planner, extract_store, msr_store) = build_planner(&config);
    let request = aggregate_request();
    let digest = selection_digest(&config, &request);

    let msr_key = MsrKey {
        dataset: "geocoded_aid".into(),
        hash: digest.clone(),
    };
    let mut entry = MsrEntry::pending(msr_key, json!({"dataset": "geocoded_aid"}));
    entry.status = Status::Complete;
    msr_store.put(entry).unwrap();
    let raster = extracts::path::msr_raster_path(&config.raster_root, "geocoded_aid", &digest);
    fs::create_dir_all(raster.parent().unwrap()).unwrap();
    fs::write(&raster, "ncols 4\n").unwrap();

    let plan = planner.check_request("r1", &request).unwrap();

    assert_eq!(plan.extracts_needed, 1);
    assert_eq!(plan.msrs_needed, 0);
    assert_eq!(msr_store.len(), 1);

    assert_eq!(extract_store.len(), 1);
    let key = ExtractKey {
        boundary: "npl_adm3".into(),
        raster: format!("geocoded_aid_{digest}"),
        extract_type: "sum".into(),
        reliability: true,
    };
    let queued = extract_store.find(&key).unwrap().expect("derived extract");
    assert_eq!(queued.status, Status::Pending);
    assert_eq!(queued.classification, Classification::Msr);
}

#[test]
fn completed_direct_entry_with_file_is_ready() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (planner, extract_store, _) = build_planner(&config);

    let key = ExtractKey {
        boundary: "npl_adm3".into(),
        raster: "pop_2015".into(),
        extract_type: "mean".into(),
        reliability: false,
    };
    let mut entry = ExtractEntry::pending(key, Classification::Direct);
    entry.status = Status::Complete;
    extract_store.put(entry).unwrap();

    let csv_path = extracts::path::extract_csv_path(
        &config.extract_root,
        "npl_adm3",
        "worldpop",
        "mean",
        "pop_2015_mean",
    );
    fs::create_dir_all(csv_path.parent().unwrap()).unwrap();
    fs::write(&csv_path, "id,ad_extract\n1,2\n").unwrap();

    let plan = planner.check_request("r1", &direct_request()).unwrap();

    assert!(plan.is_ready());
    assert_eq!(plan.merge_plan.len(), 1);
    assert_eq!(extract_store.len(), 1);
}

#[test]
fn malformed_request_leaves_both_stores_untouched() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (planner, extract_store, msr_store) = build_planner(&config);

    let request: Request = serde_json::from_value(json!({
        "boundary": {"name": "", "path": "/boundaries/x.geojson"},
        "direct_data": {
            "worldpop": {
                "base": "/data",
                "temporal_type": "None",
                "files": [{"name": "pop_2015", "path": "pop_2015.tif", "reliability": false}],
                "options": {"extract_types": ["mean"]}
            }
        }
    }))
    .unwrap();

    let err = planner.check_request("r1", &request).unwrap_err();
    assert!(matches!(err, extracts::ExtractError::MalformedRequest(_)));
    assert!(extract_store.is_empty());
    assert!(msr_store.is_empty());
}

#[test]
fn requests_with_identical_parameters_share_one_msr() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (planner, _, msr_store) = build_planner(&config);

    let request_a = aggregate_request();
    let mut request_b = aggregate_request();
    request_b.boundary.name = "ken_adm2".into();

    planner.check_request("r1", &request_a).unwrap();
    planner.check_request("r2", &request_b).unwrap();

    // Different boundaries, same parameters: one shared MSR entry.
    assert_eq!(msr_store.len(), 1);
}

#[test]
fn distinct_parameters_get_distinct_msr_entries() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (planner, _, msr_store) = build_planner(&config);

    let request_a = aggregate_request();
    let request_b: Request = serde_json::from_value(json!({
        "boundary": {"name": "npl_adm3", "path": "/boundaries/npl_adm3.geojson"},
        "aggregate_data": {
            "sel_a": {"dataset": "geocoded_aid", "sector": "120"}
        }
    }))
    .unwrap();

    planner.check_request("r1", &request_a).unwrap();
    planner.check_request("r2", &request_b).unwrap();

    assert_eq!(msr_store.len(), 2);
}

#[test]
fn multiple_extract_types_queue_independent_entries() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (planner, extract_store, _) = build_planner(&config);

    let request: Request = serde_json::from_value(json!({
        "boundary": {"name": "npl_adm3", "path": "/boundaries/npl_adm3.geojson"},
        "direct_data": {
            "worldpop": {
                "base": "/data",
                "temporal_type": "None",
                "files": [{"name": "pop_2015", "path": "pop_2015.tif", "reliability": false}],
                "options": {"extract_types": ["max", "mean"]}
            }
        }
    }))
    .unwrap();
    let plan = planner.check_request("r1", &request).unwrap();

    assert_eq!(plan.extracts_needed, 2);
    assert_eq!(extract_store.len(), 2);
    assert_eq!(plan.merge_plan.len(), 2);
    let items = plan.merge_plan.items();
    assert!(items[0].csv_path.ends_with("max/pop_2015_max.csv"));
    assert!(items[1].csv_path.ends_with("mean/pop_2015_mean.csv"));
}
