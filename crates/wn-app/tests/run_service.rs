use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use wn_app::{
    AppError, RunHandle, RunOptions, RunRef, RunRequest, RunStage, link_values_at, list_runs,
    node_values_at, run, run_with_progress,
};
use wn_results::{QualitySummary, RunStore};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("{}_{}", prefix, nanos));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

const NETWORK: &str = r#"
name: service
options:
  flow_units: CFS
  times:
    duration: 7200
    hydraulic_step: 3600
    quality_step: 300
    report_step: 3600
  quality:
    mode: chemical
junctions:
  - id: J1
    demands: [{ base: 0.5 }]
reservoirs:
  - id: R1
    head: 120
    initial_quality: 2.0
tanks:
  - id: T1
    elevation: 80
    init_level: 10
    max_level: 30
    diameter: 15
pipes:
  - { id: P1, from: R1, to: J1, length: 1000, diameter: 12, roughness: 100 }
  - { id: P2, from: J1, to: T1, length: 500, diameter: 8, roughness: 100 }
"#;

fn write_network(dir: &Path) -> PathBuf {
    let path = dir.join("network.yaml");
    std::fs::write(&path, NETWORK).unwrap();
    path
}

fn request<'a>(network_path: &'a Path, out_dir: &'a Path, options: RunOptions) -> RunRequest<'a> {
    RunRequest {
        network_path,
        out_dir: Some(out_dir),
        options,
    }
}

fn no_cache() -> RunOptions {
    RunOptions {
        use_cache: false,
        ..RunOptions::default()
    }
}

#[test]
fn run_commits_hydraulics_and_quality() {
    let dir = unique_temp_dir("wn_app_run");
    let path = write_network(&dir);
    let out = dir.join("runs");

    let response = run(&request(&path, &out, no_cache()), &RunHandle::new()).unwrap();
    assert!(!response.loaded_from_cache);
    assert_eq!(response.manifest.network_name, "service");
    assert!(response.manifest.hydraulic_steps >= 3);
    match response.manifest.quality {
        QualitySummary::Chemical {
            periods,
            mass_balance_ratio,
        } => {
            assert_eq!(periods, 3);
            assert!((mass_balance_ratio - 1.0).abs() < 1e-6);
        }
        ref other => panic!("unexpected quality summary {other:?}"),
    }

    let store = RunStore::new(out.clone()).unwrap();
    assert!(store.has_run(&response.run_id));
    assert!(store.has_quality(&response.run_id));

    let run_ref = RunRef::open(store, &response.run_id).unwrap();
    let j1 = node_values_at(&run_ref, "J1", 3600).unwrap();
    assert!(j1.head > 80.0 && j1.head < 120.0);
    assert!((j1.demand - 0.5).abs() < 1e-9);
    let c = j1.quality.unwrap();
    assert!(c > 0.0 && c <= 2.0 + 1e-6);

    let p1 = link_values_at(&run_ref, "P1", 3600).unwrap();
    assert!(p1.flow > 0.5);
    assert!(p1.head_delta > 0.0);

    // Between reports there is hydraulics but no quality period.
    let mid = node_values_at(&run_ref, "J1", 1800).unwrap();
    assert!(mid.quality.is_none());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn identical_request_is_served_from_cache() {
    let dir = unique_temp_dir("wn_app_cache");
    let path = write_network(&dir);
    let out = dir.join("runs");
    let options = RunOptions::default();

    let first = run(&request(&path, &out, options.clone()), &RunHandle::new()).unwrap();
    let second = run(&request(&path, &out, options), &RunHandle::new()).unwrap();
    assert!(!first.loaded_from_cache);
    assert!(second.loaded_from_cache);
    assert_eq!(first.run_id, second.run_id);

    let runs = list_runs(&path, Some(&out)).unwrap();
    assert_eq!(runs.len(), 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn bad_queries_fail_before_reading_streams() {
    let dir = unique_temp_dir("wn_app_query");
    let path = write_network(&dir);
    let out = dir.join("runs");
    let response = run(&request(&path, &out, no_cache()), &RunHandle::new()).unwrap();
    let run_ref = RunRef::open_dir(&out.join(&response.run_id)).unwrap();

    let unknown = node_values_at(&run_ref, "NOPE", 0).unwrap_err();
    assert!(matches!(unknown, AppError::InvalidConfig(_)));
    assert_eq!(unknown.code(), 200);

    let late = link_values_at(&run_ref, "P1", 7201).unwrap_err();
    assert!(matches!(late, AppError::InvalidConfig(_)));
    let early = node_values_at(&run_ref, "J1", -1).unwrap_err();
    assert!(matches!(early, AppError::InvalidConfig(_)));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cancelled_run_leaves_nothing_behind() {
    let dir = unique_temp_dir("wn_app_cancel");
    let path = write_network(&dir);
    let out = dir.join("runs");

    let handle = RunHandle::new();
    handle.cancel();
    let err = run(&request(&path, &out, no_cache()), &handle).unwrap_err();
    assert_eq!(err.code(), 1);

    let leftovers: Vec<_> = std::fs::read_dir(&out)
        .unwrap()
        .filter_map(Result::ok)
        .collect();
    assert!(leftovers.is_empty(), "left behind: {leftovers:?}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn quality_can_be_skipped() {
    let dir = unique_temp_dir("wn_app_noqual");
    let path = write_network(&dir);
    let out = dir.join("runs");
    let options = RunOptions {
        with_quality: false,
        ..no_cache()
    };
    let response = run(&request(&path, &out, options), &RunHandle::new()).unwrap();
    assert_eq!(response.manifest.quality, QualitySummary::None);

    let store = RunStore::new(out).unwrap();
    assert!(!store.has_quality(&response.run_id));
    let run_ref = RunRef::open(store, &response.run_id).unwrap();
    assert!(node_values_at(&run_ref, "J1", 3600).unwrap().quality.is_none());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn progress_is_reported_and_pollable() {
    let dir = unique_temp_dir("wn_app_progress");
    let path = write_network(&dir);
    let out = dir.join("runs");
    let handle = RunHandle::new();
    let poller = handle.clone();

    let worker = {
        let path = path.clone();
        let out = out.clone();
        std::thread::spawn(move || {
            let mut stages = Vec::new();
            let mut record = |e: wn_app::RunProgressEvent| stages.push(e.stage);
            run_with_progress(&request(&path, &out, no_cache()), &handle, Some(&mut record))
                .map(|_| stages)
        })
    };
    let stages = worker.join().unwrap().unwrap();
    assert_eq!(poller.current_time(), 7200);

    let pos = |s: RunStage| stages.iter().position(|&x| x == s).unwrap();
    assert!(pos(RunStage::LoadingNetwork) < pos(RunStage::RunningHydraulics));
    assert!(pos(RunStage::RunningHydraulics) < pos(RunStage::RunningQuality));
    assert_eq!(stages.last(), Some(&RunStage::Completed));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_network_file_is_an_io_error() {
    let dir = unique_temp_dir("wn_app_missing");
    let out = dir.join("runs");
    let path = dir.join("absent.yaml");
    let err = run(&request(&path, &out, no_cache()), &RunHandle::new()).unwrap_err();
    assert_eq!(err.code(), 302);
    let _ = std::fs::remove_dir_all(&dir);
}
