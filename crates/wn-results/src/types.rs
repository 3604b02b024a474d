//! Result data types.

use serde::{Deserialize, Serialize};

pub type RunId = String;

/// What a finished run directory contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub network_name: String,
    /// RFC 3339 time the run was committed.
    pub timestamp: String,
    pub solver_version: String,
    pub node_ids: Vec<String>,
    pub link_ids: Vec<String>,
    pub report_start: i64,
    pub report_step: i64,
    pub duration: i64,
    pub hydraulic_steps: usize,
    pub quality: QualitySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QualitySummary {
    #[default]
    None,
    Chemical {
        periods: usize,
        mass_balance_ratio: f64,
    },
    Age {
        periods: usize,
    },
    Trace {
        node: String,
        periods: usize,
    },
}

impl QualitySummary {
    pub fn periods(&self) -> usize {
        match self {
            QualitySummary::None => 0,
            QualitySummary::Chemical { periods, .. }
            | QualitySummary::Age { periods }
            | QualitySummary::Trace { periods, .. } => *periods,
        }
    }
}

impl RunManifest {
    pub fn now_timestamp() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.node_ids.iter().position(|n| n == id)
    }

    pub fn link_index(&self, id: &str) -> Option<usize> {
        self.link_ids.iter().position(|l| l == id)
    }

    /// Whether `time` lies in the reported window `[report_start, duration]`.
    pub fn covers(&self, time: i64) -> bool {
        time >= self.report_start && time <= self.duration
    }
}

/// Values of one node at a reported time, in internal units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeValues {
    pub time: i64,
    pub head: f64,
    pub demand: f64,
    pub quality: Option<f64>,
}

/// Values of one link at a reported time, in internal units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkValues {
    pub time: i64,
    pub flow: f64,
    pub head_delta: f64,
    pub quality: Option<f64>,
}
