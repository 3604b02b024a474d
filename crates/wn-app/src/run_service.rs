//! Run execution and caching service.

use std::path::Path;
use std::time::Instant;

use tracing::info;
use wn_controls::{RuleEvaluator, RuleSet};
use wn_model::{Network, NetworkDef, QualityMode};
use wn_results::{QualitySummary, RunManifest, RunStore, StagedRun, compute_run_id};
use wn_sim::{CancelToken, HydraulicEngine, HydraulicSummary, QualityEngine, SimClock};

use crate::error::AppResult;
use crate::network_service;
use crate::progress::{RunProgressEvent, RunStage};

/// Options for running simulations.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub use_cache: bool,
    /// Run the quality pass when the network asks for one.
    pub with_quality: bool,
    pub solver_version: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            with_quality: true,
            solver_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Request to execute a run.
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    pub network_path: &'a Path,
    /// Run store root; defaults to `.waternet/runs` beside the network file.
    pub out_dir: Option<&'a Path>,
    pub options: RunOptions,
}

/// Shared view of a run in progress.
///
/// Clone it before starting the run; another thread can then poll the
/// simulated time or request cancellation.
#[derive(Debug, Clone, Default)]
pub struct RunHandle {
    clock: SimClock,
    cancel: CancelToken,
}

impl RunHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated time (s) reached by the engine currently running.
    pub fn current_time(&self) -> i64 {
        self.clock.get()
    }

    /// Stop the run at the next step boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Wall-clock and solver totals for a run.
#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub compile_time_s: f64,
    pub hydraulics_time_s: f64,
    pub quality_time_s: f64,
    pub save_time_s: f64,
    pub total_time_s: f64,
    pub hydraulic_steps: usize,
    pub unbalanced_steps: usize,
    pub max_iterations: usize,
}

/// Response from a run execution.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub loaded_from_cache: bool,
    pub timing: RunTimingSummary,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    stage: RunStage,
    started: Instant,
    handle: &RunHandle,
    message: Option<String>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent {
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            sim_time: handle.current_time(),
            message,
        });
    }
}

/// Execute a run, or load it from the store when an identical one exists.
pub fn run(request: &RunRequest, handle: &RunHandle) -> AppResult<RunResponse> {
    run_with_progress(request, handle, None)
}

/// Execute a run and report each stage to `progress_cb`.
///
/// Nothing is committed to the store unless every stage succeeds.
pub fn run_with_progress(
    request: &RunRequest,
    handle: &RunHandle,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    let mut timing = RunTimingSummary::default();

    emit_progress(
        &mut progress_cb,
        RunStage::LoadingNetwork,
        started,
        handle,
        Some(format!("Loading {}", request.network_path.display())),
    );
    let def = network_service::load_network(request.network_path)?;

    emit_progress(
        &mut progress_cb,
        RunStage::Compiling,
        started,
        handle,
        None,
    );
    let compile_started = Instant::now();
    let network = network_service::compile_network(&def)?;
    timing.compile_time_s = compile_started.elapsed().as_secs_f64();

    let with_quality =
        request.options.with_quality && network.quality.mode != QualityMode::None;
    let run_id = compute_run_id(&def, with_quality, &request.options.solver_version);
    let store = open_store(request)?;

    emit_progress(
        &mut progress_cb,
        RunStage::CheckingCache,
        started,
        handle,
        None,
    );
    if request.options.use_cache && store.has_run(&run_id) {
        emit_progress(
            &mut progress_cb,
            RunStage::LoadingCachedResult,
            started,
            handle,
            Some("Loading cached run".to_string()),
        );
        let manifest = store.load_manifest(&run_id)?;
        timing.hydraulic_steps = manifest.hydraulic_steps;
        timing.total_time_s = started.elapsed().as_secs_f64();
        emit_progress(
            &mut progress_cb,
            RunStage::Completed,
            started,
            handle,
            None,
        );
        return Ok(RunResponse {
            run_id,
            manifest,
            loaded_from_cache: true,
            timing,
        });
    }

    let staged = store.begin(&run_id)?;

    emit_progress(
        &mut progress_cb,
        RunStage::RunningHydraulics,
        started,
        handle,
        None,
    );
    let hydraulics_started = Instant::now();
    let summary = run_hydraulics(&network, &staged, handle)?;
    timing.hydraulics_time_s = hydraulics_started.elapsed().as_secs_f64();
    timing.hydraulic_steps = summary.steps;
    timing.unbalanced_steps = summary.unbalanced_steps;
    timing.max_iterations = summary.max_iterations;

    let quality = if with_quality {
        emit_progress(
            &mut progress_cb,
            RunStage::RunningQuality,
            started,
            handle,
            None,
        );
        let quality_started = Instant::now();
        let q = run_quality(&network, &staged, handle)?;
        timing.quality_time_s = quality_started.elapsed().as_secs_f64();
        q
    } else {
        QualitySummary::None
    };

    emit_progress(
        &mut progress_cb,
        RunStage::SavingResults,
        started,
        handle,
        None,
    );
    let save_started = Instant::now();
    let manifest = build_manifest(&def, &network, &run_id, &request.options, &summary, quality);
    staged.commit(&manifest)?;
    timing.save_time_s = save_started.elapsed().as_secs_f64();
    timing.total_time_s = started.elapsed().as_secs_f64();

    info!(
        run_id = %run_id,
        steps = summary.steps,
        unbalanced = summary.unbalanced_steps,
        total_s = timing.total_time_s,
        "run completed"
    );
    emit_progress(
        &mut progress_cb,
        RunStage::Completed,
        started,
        handle,
        Some("Run completed".to_string()),
    );

    Ok(RunResponse {
        run_id,
        manifest,
        loaded_from_cache: false,
        timing,
    })
}

fn open_store(request: &RunRequest) -> AppResult<RunStore> {
    let store = match request.out_dir {
        Some(dir) => RunStore::new(dir.to_path_buf())?,
        None => RunStore::for_network(request.network_path)?,
    };
    Ok(store)
}

fn run_hydraulics(
    network: &Network,
    staged: &StagedRun,
    handle: &RunHandle,
) -> AppResult<HydraulicSummary> {
    let rules: Option<Box<dyn RuleEvaluator>> = if network.rules.is_empty() {
        None
    } else {
        Some(Box::new(RuleSet::from_network(network)?))
    };
    let mut engine = HydraulicEngine::new(network, rules)?.with_clock(handle.clock.clone());
    let mut writer = staged.create_hydraulics(engine.stream_header())?;
    let summary = engine.run(&mut writer, &handle.cancel)?;
    writer.finish()?;
    Ok(summary)
}

/// Quality pass driven by the staged hydraulic stream.
fn run_quality(
    network: &Network,
    staged: &StagedRun,
    handle: &RunHandle,
) -> AppResult<QualitySummary> {
    let mut reader = staged.read_hydraulics()?;
    let mut writer = staged.create_quality(network.node_count(), network.link_count())?;
    let mut engine = QualityEngine::new(network)?.with_clock(handle.clock.clone());
    let periods = engine.run_from_stream(&mut reader, &mut writer, &handle.cancel)?;
    writer.finish()?;

    Ok(match network.quality.mode {
        QualityMode::Chemical => QualitySummary::Chemical {
            periods,
            mass_balance_ratio: engine.mass_balance().ratio(),
        },
        QualityMode::Age => QualitySummary::Age { periods },
        QualityMode::Trace { node } => QualitySummary::Trace {
            node: network.node_name(node).to_string(),
            periods,
        },
        QualityMode::None => QualitySummary::None,
    })
}

fn build_manifest(
    def: &NetworkDef,
    network: &Network,
    run_id: &str,
    options: &RunOptions,
    summary: &HydraulicSummary,
    quality: QualitySummary,
) -> RunManifest {
    let times = &network.times;
    RunManifest {
        run_id: run_id.to_string(),
        network_name: def.name.clone(),
        timestamp: RunManifest::now_timestamp(),
        solver_version: options.solver_version.clone(),
        node_ids: network.graph.nodes().iter().map(|n| n.name.clone()).collect(),
        link_ids: network.graph.links().iter().map(|l| l.name.clone()).collect(),
        report_start: times.report_start,
        report_step: times.report_step,
        duration: times.duration,
        hydraulic_steps: summary.steps,
        quality,
    }
}

/// Manifests of the committed runs of the network at `network_path`.
pub fn list_runs(network_path: &Path, out_dir: Option<&Path>) -> AppResult<Vec<RunManifest>> {
    let def = network_service::load_network(network_path)?;
    let request = RunRequest {
        network_path,
        out_dir,
        options: RunOptions::default(),
    };
    Ok(open_store(&request)?.list_runs(&def.name)?)
}
