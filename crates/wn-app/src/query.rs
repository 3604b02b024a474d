//! Queries against stored runs.
//!
//! Ids and times are checked against the manifest before any stream is
//! opened.

use std::path::Path;

use wn_results::{
    HydraulicStep, LinkValues, NodeValues, QualityPeriod, ResultsError, RunManifest, RunStore,
};

use crate::error::{AppError, AppResult};

/// A committed run: its store and manifest.
#[derive(Debug, Clone)]
pub struct RunRef {
    store: RunStore,
    pub manifest: RunManifest,
}

impl RunRef {
    pub fn open(store: RunStore, run_id: &str) -> AppResult<Self> {
        let manifest = store.load_manifest(run_id)?;
        Ok(Self { store, manifest })
    }

    /// Open a run from its directory (`<store>/<run_id>`).
    pub fn open_dir(dir: &Path) -> AppResult<Self> {
        let (Some(root), Some(run_id)) = (dir.parent(), dir.file_name()) else {
            return Err(AppError::InvalidConfig(format!(
                "{} is not a run directory",
                dir.display()
            )));
        };
        let store = RunStore::new(root.to_path_buf())?;
        Self::open(store, &run_id.to_string_lossy())
    }

    pub fn run_id(&self) -> &str {
        &self.manifest.run_id
    }

    fn check_time(&self, time: i64) -> AppResult<()> {
        if !self.manifest.covers(time) {
            return Err(AppError::InvalidConfig(format!(
                "time {time} s is outside the reported window [{}, {}]",
                self.manifest.report_start, self.manifest.duration
            )));
        }
        Ok(())
    }

    fn hydraulics_at(&self, time: i64) -> AppResult<HydraulicStep> {
        let mismatch = |what: String| AppError::Results(ResultsError::Mismatch { what });
        let mut reader = self.store.open_hydraulics(self.run_id())?;
        let step = reader
            .seek_to(time)?
            .ok_or_else(|| mismatch(format!("no hydraulic step covers t = {time} s")))?;
        if step.head.len() != self.manifest.node_ids.len()
            || step.flow.len() != self.manifest.link_ids.len()
        {
            return Err(mismatch("hydraulic stream does not match the manifest".into()));
        }
        Ok(step)
    }

    /// Quality period index for a reporting time, `None` between reports.
    fn period_at(&self, time: i64) -> Option<usize> {
        let m = &self.manifest;
        let offset = time - m.report_start;
        if m.report_step <= 0 || offset < 0 || offset % m.report_step != 0 {
            return None;
        }
        usize::try_from(offset / m.report_step).ok()
    }

    fn quality_at(
        &self,
        time: i64,
        pick: impl Fn(&QualityPeriod) -> Option<f32>,
    ) -> AppResult<Option<f64>> {
        let Some(index) = self.period_at(time) else {
            return Ok(None);
        };
        if !self.store.has_quality(self.run_id()) {
            return Ok(None);
        }
        let mut reader = self.store.open_quality(self.run_id())?;
        Ok(reader
            .period(index)?
            .and_then(|p| pick(&p))
            .map(f64::from))
    }
}

/// Head, demand and quality of `node_id` at `time`.
pub fn node_values_at(run: &RunRef, node_id: &str, time: i64) -> AppResult<NodeValues> {
    let index = run
        .manifest
        .node_index(node_id)
        .ok_or_else(|| AppError::InvalidConfig(format!("unknown node '{node_id}'")))?;
    run.check_time(time)?;

    let step = run.hydraulics_at(time)?;
    let quality = run.quality_at(time, |p| p.nodes.get(index).copied())?;
    Ok(NodeValues {
        time,
        head: step.head[index],
        demand: step.demand[index],
        quality,
    })
}

/// Flow, head loss and quality of `link_id` at `time`.
pub fn link_values_at(run: &RunRef, link_id: &str, time: i64) -> AppResult<LinkValues> {
    let index = run
        .manifest
        .link_index(link_id)
        .ok_or_else(|| AppError::InvalidConfig(format!("unknown link '{link_id}'")))?;
    run.check_time(time)?;

    let step = run.hydraulics_at(time)?;
    let quality = run.quality_at(time, |p| p.links.get(index).copied())?;
    Ok(LinkValues {
        time,
        flow: step.flow[index],
        head_delta: step.head_delta[index],
        quality,
    })
}
