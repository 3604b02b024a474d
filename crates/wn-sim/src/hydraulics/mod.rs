//! Extended-period hydraulic engine.
//!
//! One hydraulic time step runs `demands -> controls -> network solve ->
//! warnings`, after which [`HydraulicEngine::next_step`] picks the step
//! length, moves tank levels and advances the clock.

mod actions;
mod balance;
mod demands;
mod status;
mod timestep;
mod warnings;

use std::f64::consts::PI;
use std::io::Write;

use tracing::info;
use wn_components::{HeadlossModel, PipeGeometry, PumpModel, headloss_model};
use wn_controls::RuleEvaluator;
use wn_core::constants::QZERO;
use wn_model::{InitialFlow, LinkKind, Network, NodeKind, PumpCurve, ValveKind};
use wn_results::{HydraulicHeader, HydraulicStep, HydraulicStreamWriter};
use wn_solver::SparseMatrix;

use crate::cancel::{CancelToken, SimClock};
use crate::error::{SimError, SimResult};
use crate::state::NetworkState;

/// Outcome of one network solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSolution {
    pub time: i64,
    pub iterations: usize,
    /// Sum of flow changes over sum of flows at the last trial.
    pub relative_error: f64,
    pub balanced: bool,
}

/// Totals over a complete hydraulic run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HydraulicSummary {
    pub steps: usize,
    pub unbalanced_steps: usize,
    pub max_iterations: usize,
    pub final_time: i64,
}

/// Per-iteration work arrays.
#[derive(Debug, Clone)]
struct Workspace {
    /// Inverse head loss derivative per link.
    p: Vec<f64>,
    /// Flow correction per link.
    y: Vec<f64>,
    /// Matrix diagonal, by row.
    diag: Vec<f64>,
    /// Off-diagonal coefficients, by slot.
    off: Vec<f64>,
    /// Right-hand side, by row; holds the heads after a solve.
    rhs: Vec<f64>,
    /// Flow excess per node.
    excess: Vec<f64>,
}

impl Workspace {
    fn new(network: &Network, matrix: &SparseMatrix) -> Self {
        let nj = network.junction_count;
        Self {
            p: vec![0.0; network.link_count()],
            y: vec![0.0; network.link_count()],
            diag: vec![0.0; nj],
            off: vec![0.0; matrix.coeff_count()],
            rhs: vec![0.0; nj],
            excess: vec![0.0; network.node_count()],
        }
    }

    fn clear(&mut self) {
        self.p.fill(0.0);
        self.y.fill(0.0);
        self.diag.fill(0.0);
        self.off.fill(0.0);
        self.rhs.fill(0.0);
        self.excess.fill(0.0);
    }
}

/// Hydraulic simulation of one network.
#[derive(Debug)]
pub struct HydraulicEngine {
    network: Network,
    matrix: SparseMatrix,
    formula: &'static dyn HeadlossModel,
    ends: Vec<(usize, usize)>,
    geometry: Vec<PipeGeometry>,
    /// Friction resistance per pipe (zero for pumps and valves).
    resistance: Vec<f64>,
    pumps: Vec<Option<PumpModel>>,
    /// Emitter head exponent.
    qexp: f64,
    rules: Option<Box<dyn RuleEvaluator>>,
    state: NetworkState,
    work: Workspace,
    relax: f64,
    time: i64,
    clock: SimClock,
}

impl HydraulicEngine {
    /// Prepare a network for simulation.
    ///
    /// Pipe resistances, pump curves and the sparse structure are derived
    /// once here. Invalid pump curves and regulating valves attached to
    /// storage nodes are rejected.
    pub fn new(network: &Network, rules: Option<Box<dyn RuleEvaluator>>) -> SimResult<Self> {
        let ends = network.graph.link_ends();
        let matrix = SparseMatrix::build(network.node_count(), network.junction_count, &ends)?;
        let formula = headloss_model(network.headloss);

        let mut geometry = Vec::with_capacity(network.link_count());
        let mut resistance = Vec::with_capacity(network.link_count());
        let mut pumps = Vec::with_capacity(network.link_count());
        for (k, link) in network.links.iter().enumerate() {
            let geom = PipeGeometry {
                length: link.length,
                diameter: link.diameter,
                roughness: link.roughness,
            };
            let name = || network.graph.links()[k].name.clone();
            let (r, pump) = match &link.kind {
                LinkKind::Pipe { .. } => (formula.resistance(&geom), None),
                LinkKind::Pump(p) => {
                    let model = match p.curve {
                        PumpCurve::ConstantPower(hp) => PumpModel::constant_power(hp)?,
                        PumpCurve::Head(c) => {
                            let curve = network.curve(c).ok_or_else(|| SimError::InvalidConfig {
                                what: format!("pump {} has no head curve", name()),
                            })?;
                            PumpModel::from_curve(curve)?
                        }
                    };
                    (0.0, Some(model))
                }
                LinkKind::Valve { kind, curve } => {
                    let (n1, n2) = ends[k];
                    let regulating = matches!(kind, ValveKind::Prv | ValveKind::Psv | ValveKind::Fcv);
                    if regulating
                        && (n1 >= network.junction_count || n2 >= network.junction_count)
                    {
                        return Err(SimError::InvalidConfig {
                            what: format!("valve {} cannot connect to a tank or reservoir", name()),
                        });
                    }
                    if *kind == ValveKind::Gpv && curve.and_then(|c| network.curve(c)).is_none() {
                        return Err(SimError::InvalidConfig {
                            what: format!("GPV {} has no head loss curve", name()),
                        });
                    }
                    (0.0, None)
                }
            };
            geometry.push(geom);
            resistance.push(r);
            pumps.push(pump);
        }

        let exponent = network.hydraulics.emitter_exponent;
        if !(exponent > 0.0) {
            return Err(SimError::InvalidConfig {
                what: "emitter exponent must be positive".into(),
            });
        }
        let rules = rules.filter(|r| !r.is_empty());
        let work = Workspace::new(network, &matrix);
        let state = NetworkState::new(network);

        info!(
            network = %network.name,
            nodes = network.node_count(),
            links = network.link_count(),
            rules = rules.is_some(),
            "hydraulic engine ready"
        );

        Ok(Self {
            network: network.clone(),
            matrix,
            formula,
            ends,
            geometry,
            resistance,
            pumps,
            qexp: 1.0 / exponent,
            rules,
            state,
            work,
            relax: 1.0,
            time: 0,
            clock: SimClock::new(),
        })
    }

    /// Publish simulated time through `clock` instead of a private one.
    pub fn with_clock(mut self, clock: SimClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    /// Simulated time of the current step (s).
    pub fn current_time(&self) -> i64 {
        self.time
    }

    /// Polling handle publishing the simulated time.
    pub fn clock(&self) -> SimClock {
        self.clock.clone()
    }

    /// Header for the hydraulic step stream of this network.
    pub fn stream_header(&self) -> HydraulicHeader {
        let t = &self.network.times;
        HydraulicHeader::new(
            self.network.node_count(),
            self.network.link_count(),
            t.report_start,
            t.report_step,
            t.duration,
        )
    }

    /// Reset to the initial state: tank levels, link statuses and settings,
    /// starting flows and time zero.
    pub fn init(&mut self) {
        self.state = NetworkState::new(&self.network);
        for (j, node) in self.network.nodes.iter().enumerate() {
            if let NodeKind::Junction(junc) = &node.kind
                && junc.emitter > 0.0
            {
                self.state.emitter_flow[j] = 1.0;
            }
        }
        for k in 0..self.network.link_count() {
            self.state.flow[k] = self.initial_flow(k);
        }
        self.relax = 1.0;
        self.time = 0;
        self.clock.set(0);
    }

    fn initial_flow(&self, k: usize) -> f64 {
        if self.state.status[k].is_closed() {
            return QZERO;
        }
        if let Some(pump) = &self.pumps[k] {
            return self.state.setting[k].unwrap_or(1.0) * pump.initial_flow();
        }
        match self.network.hydraulics.initial_flow {
            InitialFlow::Quiescent => QZERO,
            InitialFlow::UnitVelocity => {
                let d = self.network.links[k].diameter;
                PI * d * d / 4.0
            }
        }
    }

    /// Solve the network at the current time: update demands, apply due
    /// controls, then balance flows and heads.
    pub fn run_step(&mut self) -> SimResult<StepSolution> {
        self.apply_demands();
        self.apply_controls();
        let solution = self.solve()?;
        if !solution.balanced && self.network.hydraulics.unbalanced.extra_iter() < 0 {
            return Err(SimError::Unbalanced { time: self.time });
        }
        self.log_warnings(&solution);
        Ok(solution)
    }

    /// Choose the next step length, move tank levels and advance the clock.
    ///
    /// Returns the step taken; zero once the duration has been reached.
    pub fn next_step(&mut self) -> SimResult<i64> {
        let duration = self.network.times.duration;
        if self.time >= duration {
            return Ok(0);
        }
        if self.network.times.hydraulic_step <= 0 {
            return Err(SimError::InvalidConfig {
                what: "hydraulic step must be positive".into(),
            });
        }
        let step = self.time_step();
        self.time += step;
        self.clock.set(self.time);
        Ok(step)
    }

    /// Current solution as a stream record (`step` left at zero).
    ///
    /// Closed links report zero flow; junction demand includes emitter outflow.
    pub fn snapshot(&self) -> HydraulicStep {
        let s = &self.state;
        let demand = (0..self.network.node_count())
            .map(|n| s.demand[n] + s.emitter_flow[n])
            .collect();
        let flow = (0..self.network.link_count())
            .map(|k| if s.status[k].is_closed() { 0.0 } else { s.flow[k] })
            .collect();
        let head_delta = self
            .ends
            .iter()
            .map(|&(n1, n2)| s.head[n1] - s.head[n2])
            .collect();
        HydraulicStep {
            demand,
            head: s.head.clone(),
            flow,
            head_delta,
            step: 0,
            time: self.time,
        }
    }

    /// Run the whole period, writing every solution to `writer`.
    ///
    /// Cancellation is honoured between steps; the writer is left for the
    /// caller to finish.
    pub fn run<W: Write>(
        &mut self,
        writer: &mut HydraulicStreamWriter<W>,
        cancel: &CancelToken,
    ) -> SimResult<HydraulicSummary> {
        self.init();
        let mut summary = HydraulicSummary::default();
        loop {
            if cancel.is_cancelled() {
                return Err(SimError::Cancelled { time: self.time });
            }
            let solution = self.run_step()?;
            let mut record = self.snapshot();
            record.step = self.next_step()?;
            writer.write_step(&record)?;

            summary.steps += 1;
            summary.max_iterations = summary.max_iterations.max(solution.iterations);
            if !solution.balanced {
                summary.unbalanced_steps += 1;
            }
            summary.final_time = record.time;
            info!(
                time = record.time,
                step = record.step,
                iterations = solution.iterations,
                "hydraulic step"
            );
            if record.is_last() {
                break;
            }
        }
        Ok(summary)
    }
}
