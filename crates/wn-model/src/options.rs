//! Analysis options and their defaults.

use serde::{Deserialize, Serialize};
use wn_core::FlowUnits;

/// Head loss formula used for every pipe in the network.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeadlossFormula {
    #[default]
    #[serde(alias = "H-W")]
    Hw,
    #[serde(alias = "D-W")]
    Dw,
    #[serde(alias = "C-M")]
    Cm,
}

/// What to do when a hydraulic step fails to converge within the trial budget.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnbalancedPolicy {
    /// Halt the run with an error.
    #[default]
    Stop,
    /// Allow this many extra trials with status checks disabled, then keep going.
    Continue(u32),
}

impl UnbalancedPolicy {
    /// Extra iterations granted on top of `max_trials`; -1 means stop.
    pub fn extra_iter(self) -> i32 {
        match self {
            UnbalancedPolicy::Stop => -1,
            UnbalancedPolicy::Continue(n) => n as i32,
        }
    }
}

/// Starting flows used when a run begins.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InitialFlow {
    /// Every open link starts at a negligible flow.
    #[default]
    Quiescent,
    /// Every open pipe and valve starts at 1 ft/s.
    UnitVelocity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HydraulicOptions {
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,
    #[serde(default = "default_max_trials")]
    pub max_trials: u32,
    #[serde(default)]
    pub unbalanced: UnbalancedPolicy,
    #[serde(default = "default_check_freq")]
    pub check_freq: u32,
    #[serde(default = "default_max_check")]
    pub max_check: u32,
    #[serde(default)]
    pub damp_limit: f64,
    #[serde(default = "default_emitter_exponent")]
    pub emitter_exponent: f64,
    #[serde(default = "default_one")]
    pub demand_multiplier: f64,
    #[serde(default = "default_rq_tol")]
    pub rq_tol: f64,
    #[serde(default)]
    pub initial_flow: InitialFlow,
}

impl Default for HydraulicOptions {
    fn default() -> Self {
        Self {
            accuracy: default_accuracy(),
            max_trials: default_max_trials(),
            unbalanced: UnbalancedPolicy::default(),
            check_freq: default_check_freq(),
            max_check: default_max_check(),
            damp_limit: 0.0,
            emitter_exponent: default_emitter_exponent(),
            demand_multiplier: default_one(),
            rq_tol: default_rq_tol(),
            initial_flow: InitialFlow::default(),
        }
    }
}

/// Simulation clock settings, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeOptions {
    #[serde(default)]
    pub duration: i64,
    #[serde(default = "default_hour")]
    pub hydraulic_step: i64,
    #[serde(default = "default_quality_step")]
    pub quality_step: i64,
    #[serde(default = "default_hour")]
    pub pattern_step: i64,
    #[serde(default)]
    pub pattern_start: i64,
    #[serde(default = "default_hour")]
    pub report_step: i64,
    #[serde(default)]
    pub report_start: i64,
    /// Defaults to a tenth of the hydraulic step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_step: Option<i64>,
    #[serde(default)]
    pub start_clocktime: i64,
}

impl Default for TimeOptions {
    fn default() -> Self {
        Self {
            duration: 0,
            hydraulic_step: default_hour(),
            quality_step: default_quality_step(),
            pattern_step: default_hour(),
            pattern_start: 0,
            report_step: default_hour(),
            report_start: 0,
            rule_step: None,
            start_clocktime: 0,
        }
    }
}

impl TimeOptions {
    pub fn rule_step(&self) -> i64 {
        self.rule_step
            .unwrap_or(self.hydraulic_step / 10)
            .clamp(1, self.hydraulic_step.max(1))
    }

    /// Quality step, never longer than the hydraulic step.
    pub fn quality_step(&self) -> i64 {
        if self.quality_step <= 0 {
            return self.hydraulic_step.max(1);
        }
        self.quality_step.min(self.hydraulic_step.max(1))
    }

    /// First reporting instant strictly after `time` (or `report_start` if not yet reached).
    pub fn next_report_time(&self, time: i64) -> i64 {
        if time < self.report_start {
            return self.report_start;
        }
        let step = self.report_step.max(1);
        self.report_start + ((time - self.report_start) / step + 1) * step
    }

    /// Whether `time` is a reporting instant.
    pub fn is_report_time(&self, time: i64) -> bool {
        time >= self.report_start && (time - self.report_start) % self.report_step.max(1) == 0
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QualityModeDef {
    #[default]
    None,
    Chemical,
    Age,
    Trace,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityOptionsDef {
    #[serde(default)]
    pub mode: QualityModeDef,
    /// Source node traced when `mode` is `trace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_node: Option<String>,
    #[serde(default = "default_one")]
    pub bulk_order: f64,
    #[serde(default = "default_one")]
    pub wall_order: f64,
    #[serde(default = "default_one")]
    pub tank_order: f64,
    #[serde(default = "default_quality_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub limiting_concentration: f64,
    /// Global bulk coefficient (1/day).
    #[serde(default)]
    pub bulk_coeff: f64,
    /// Global wall coefficient (length/day).
    #[serde(default)]
    pub wall_coeff: f64,
    /// Wall coefficient derived from pipe roughness when a pipe gives none.
    #[serde(default)]
    pub roughness_correlation: f64,
    /// Molecular diffusivity relative to chlorine at 20 C.
    #[serde(default = "default_one")]
    pub diffusivity: f64,
}

impl Default for QualityOptionsDef {
    fn default() -> Self {
        Self {
            mode: QualityModeDef::None,
            trace_node: None,
            bulk_order: 1.0,
            wall_order: 1.0,
            tank_order: 1.0,
            tolerance: default_quality_tolerance(),
            limiting_concentration: 0.0,
            bulk_coeff: 0.0,
            wall_coeff: 0.0,
            roughness_correlation: 0.0,
            diffusivity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OptionsDef {
    #[serde(default)]
    pub flow_units: FlowUnits,
    #[serde(default)]
    pub headloss: HeadlossFormula,
    #[serde(default)]
    pub hydraulics: HydraulicOptions,
    #[serde(default)]
    pub times: TimeOptions,
    #[serde(default)]
    pub quality: QualityOptionsDef,
}

fn default_accuracy() -> f64 {
    0.001
}

fn default_max_trials() -> u32 {
    200
}

fn default_check_freq() -> u32 {
    2
}

fn default_max_check() -> u32 {
    10
}

fn default_emitter_exponent() -> f64 {
    0.5
}

fn default_one() -> f64 {
    1.0
}

fn default_rq_tol() -> f64 {
    1e-7
}

fn default_hour() -> i64 {
    3600
}

fn default_quality_step() -> i64 {
    300
}

fn default_quality_tolerance() -> f64 {
    0.01
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let h = HydraulicOptions::default();
        assert_eq!(h.accuracy, 0.001);
        assert_eq!(h.max_trials, 200);
        assert_eq!(h.unbalanced.extra_iter(), -1);
        assert_eq!(h.check_freq, 2);
        assert_eq!(h.max_check, 10);

        let t = TimeOptions::default();
        assert_eq!(t.rule_step(), 360);
        assert_eq!(t.quality_step(), 300);
    }

    #[test]
    fn report_times() {
        let t = TimeOptions {
            report_start: 1800,
            report_step: 3600,
            ..TimeOptions::default()
        };
        assert_eq!(t.next_report_time(0), 1800);
        assert_eq!(t.next_report_time(1800), 5400);
        assert_eq!(t.next_report_time(5399), 5400);
        assert!(t.is_report_time(5400));
        assert!(!t.is_report_time(3600));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: OptionsDef = serde_yaml::from_str(
            "flow_units: LPS\nheadloss: D-W\nhydraulics:\n  unbalanced: !continue 10\n",
        )
        .unwrap();
        assert_eq!(opts.flow_units, FlowUnits::Lps);
        assert_eq!(opts.headloss, HeadlossFormula::Dw);
        assert_eq!(opts.hydraulics.unbalanced, UnbalancedPolicy::Continue(10));
        assert_eq!(opts.hydraulics.accuracy, 0.001);
    }
}
