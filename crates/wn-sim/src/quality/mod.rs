//! Water quality transport.
//!
//! Each link holds a queue of [`Segment`]s that move with the flow. Every
//! quality step reacts the segments, drains the downstream ends into their
//! nodes, mixes the nodes and tanks, adds source mass and releases the new
//! node water into the upstream ends of the links. The engine reads its
//! flows from hydraulic stream records, so it can run after the hydraulics
//! without the hydraulic engine being present.

mod mass_balance;
mod reactions;
mod segments;
mod tanks;

pub use mass_balance::MassBalance;
pub use reactions::{
    ReactionExpression, ReactionVars, bulk_rate, mass_transfer_coeff, wall_coefficient, wall_rate,
};
pub use segments::Segment;
pub use tanks::TankStore;

use std::collections::VecDeque;
use std::io::{Read, Write};

use tracing::{debug, info};
use wn_core::TankId;
use wn_core::constants::{LITERS_PER_FT3, TINY};
use wn_model::{Network, NodeKind, QualityMode, SourceKind};
use wn_results::{HydraulicStep, HydraulicStreamReader, QualityStreamWriter};

use crate::cancel::{CancelToken, SimClock};
use crate::error::{SimError, SimResult};
use segments::SegmentList;
use tanks::TankQuality;

/// Flows and demands the quality engine transports with.
pub type HydraulicSnapshot = HydraulicStep;

/// Outflow below which a source node adds no mass (cfs).
const SOURCE_CUTOFF: f64 = 10.0 * TINY;

/// Concentration assigned to the trace node (percent).
const TRACE_CONC: f64 = 100.0;

/// Per-node inflow totals collected while draining links.
struct Accumulator {
    vol_in: Vec<f64>,
    mass_in: Vec<f64>,
    /// Volume leaving through links.
    vol_out: Vec<f64>,
    /// Mean concentration at the link ends touching the node.
    neighbour: Vec<Option<f64>>,
}

/// Segment transport engine for one network.
#[derive(Debug)]
pub struct QualityEngine {
    network: Network,
    mode: QualityMode,
    qstep: i64,
    tol: f64,
    ends: Vec<(usize, usize)>,
    links: Vec<SegmentList>,
    /// Flow direction the segments are ordered for.
    forward: Vec<bool>,
    flow: Vec<f64>,
    demand: Vec<f64>,
    wall_coeff: Vec<f64>,
    /// Junction and reservoir concentration; outflow concentration for tanks.
    node_conc: Vec<f64>,
    /// Source contribution to each node's outflow.
    boost: Vec<f64>,
    tanks: Vec<TankQuality>,
    reaction: Option<Box<dyn ReactionExpression>>,
    balance: MassBalance,
    time: i64,
    clock: SimClock,
}

impl QualityEngine {
    pub fn new(network: &Network) -> SimResult<Self> {
        if let QualityMode::Trace { node } = network.quality.mode
            && node.pos() >= network.node_count()
        {
            return Err(SimError::InvalidConfig {
                what: format!("trace node index {} out of range", node.pos()),
            });
        }
        let n = network.node_count();
        let l = network.link_count();
        Ok(Self {
            network: network.clone(),
            mode: network.quality.mode,
            qstep: network.times.quality_step(),
            tol: network.quality.tolerance,
            ends: network.graph.link_ends(),
            links: network
                .links
                .iter()
                .map(|link| SegmentList::with_capacity(link.volume()))
                .collect(),
            forward: vec![true; l],
            flow: vec![0.0; l],
            demand: vec![0.0; n],
            wall_coeff: vec![0.0; l],
            node_conc: vec![0.0; n],
            boost: vec![0.0; n],
            tanks: Vec::new(),
            reaction: None,
            balance: MassBalance::default(),
            time: 0,
            clock: SimClock::new(),
        })
    }

    /// Replace the built-in bulk reaction law.
    pub fn with_reaction(mut self, reaction: Box<dyn ReactionExpression>) -> Self {
        self.reaction = Some(reaction);
        self
    }

    /// Publish simulated time through `clock` as transport advances.
    pub fn with_clock(mut self, clock: SimClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    /// Set initial concentrations and fill every link with one segment of
    /// its downstream node's water.
    pub fn init(&mut self, snapshot: &HydraulicSnapshot) -> SimResult<()> {
        self.time = snapshot.time;
        for (n, node) in self.network.nodes.iter().enumerate() {
            self.node_conc[n] = match self.mode {
                QualityMode::Trace { node: t } if t.pos() == n => TRACE_CONC,
                QualityMode::Trace { .. } | QualityMode::None => 0.0,
                QualityMode::Chemical | QualityMode::Age => node.initial_quality,
            };
        }
        self.boost.fill(0.0);
        self.tanks = self
            .network
            .tanks
            .iter()
            .map(|t| TankQuality::new(t, self.node_conc[t.node.pos()]))
            .collect();

        self.forward.fill(true);
        self.load_hydraulics(snapshot)?;
        for k in 0..self.links.len() {
            let conc = self.node_conc[self.downstream(k)];
            self.links[k].fill(conc);
        }

        self.balance = MassBalance {
            initial: self.total_mass(),
            ..MassBalance::default()
        };
        debug!(time = self.time, mass = self.balance.initial, "quality initialized");
        Ok(())
    }

    /// Transport over `duration` seconds with the flows of `snapshot`.
    pub fn advance(&mut self, snapshot: &HydraulicSnapshot, duration: i64) -> SimResult<()> {
        self.load_hydraulics(snapshot)?;
        self.time = snapshot.time;
        if self.mode == QualityMode::None {
            self.time += duration.max(0);
            self.clock.set(self.time);
            return Ok(());
        }
        let mut remaining = duration;
        while remaining > 0 {
            let dt = self.qstep.min(remaining);
            self.transport(dt as f64);
            self.time += dt;
            remaining -= dt;
        }
        self.clock.set(self.time);
        Ok(())
    }

    /// Quality at every node: tank contents for tanks, otherwise the
    /// concentration of the water leaving the node.
    pub fn node_quality(&self) -> Vec<f64> {
        let mut q: Vec<f64> = self
            .node_conc
            .iter()
            .zip(&self.boost)
            .map(|(c, b)| c + b)
            .collect();
        for (tank, tq) in self.network.tanks.iter().zip(&self.tanks) {
            if !tank.is_reservoir() {
                q[tank.node.pos()] = tq.conc();
            }
        }
        q
    }

    /// Volume-weighted mean quality of every link; an empty link reports
    /// the mean of its end nodes.
    pub fn link_quality(&self) -> Vec<f64> {
        let nodes = self.node_quality();
        self.links
            .iter()
            .zip(&self.ends)
            .map(|(segs, &(n1, n2))| {
                segs.mean_conc()
                    .unwrap_or_else(|| (nodes[n1] + nodes[n2]) / 2.0)
            })
            .collect()
    }

    pub fn link_segments(&self, link: usize) -> &VecDeque<Segment> {
        self.links[link].segments()
    }

    pub fn tank_store(&self, tank: TankId) -> Option<&TankStore> {
        self.tanks.get(tank.pos()).map(|t| &t.store)
    }

    pub fn mass_balance(&self) -> MassBalance {
        MassBalance {
            final_mass: self.total_mass(),
            ..self.balance
        }
    }

    /// Mass held in links and tanks.
    pub fn total_mass(&self) -> f64 {
        let links: f64 = self.links.iter().map(SegmentList::mass).sum();
        let tanks: f64 = self
            .network
            .tanks
            .iter()
            .zip(&self.tanks)
            .filter(|(t, _)| !t.is_reservoir())
            .map(|(_, q)| q.mass())
            .sum();
        links + tanks
    }

    /// Run quality over a hydraulic step stream, writing one period per
    /// reporting time. Returns the number of periods written.
    pub fn run_from_stream<R: Read, W: Write>(
        &mut self,
        reader: &mut HydraulicStreamReader<R>,
        writer: &mut QualityStreamWriter<W>,
        cancel: &CancelToken,
    ) -> SimResult<usize> {
        let Some(mut current) = reader.next_step()? else {
            return Ok(0);
        };
        self.init(&current)?;
        let mut periods = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(SimError::Cancelled { time: self.time });
            }
            if self.network.times.is_report_time(self.time) {
                writer.write_period(&self.node_quality(), &self.link_quality())?;
                periods += 1;
            }
            if current.is_last() {
                break;
            }
            self.advance(&current, current.step)?;
            match reader.next_step()? {
                Some(next) => current = next,
                None => break,
            }
        }
        let mb = self.mass_balance();
        info!(
            periods,
            final_time = self.time,
            mass_ratio = mb.ratio(),
            "quality run finished"
        );
        Ok(periods)
    }

    fn upstream(&self, k: usize) -> usize {
        let (n1, n2) = self.ends[k];
        if self.forward[k] { n1 } else { n2 }
    }

    fn downstream(&self, k: usize) -> usize {
        let (n1, n2) = self.ends[k];
        if self.forward[k] { n2 } else { n1 }
    }

    /// Take flows and demands from `snapshot`, reversing the segments of
    /// links whose flow changed direction.
    fn load_hydraulics(&mut self, snapshot: &HydraulicSnapshot) -> SimResult<()> {
        if snapshot.flow.len() != self.links.len() || snapshot.demand.len() != self.demand.len() {
            return Err(SimError::InvalidConfig {
                what: format!(
                    "hydraulic record has {} nodes and {} links, network has {} and {}",
                    snapshot.demand.len(),
                    snapshot.flow.len(),
                    self.demand.len(),
                    self.links.len()
                ),
            });
        }
        let opts = &self.network.quality;
        for (k, &q) in snapshot.flow.iter().enumerate() {
            let forward = if q > 0.0 {
                true
            } else if q < 0.0 {
                false
            } else {
                self.forward[k]
            };
            if forward != self.forward[k] {
                self.links[k].reverse();
                self.forward[k] = forward;
            }
            self.flow[k] = q;
            let link = &self.network.links[k];
            self.wall_coeff[k] = if self.mode == QualityMode::Chemical {
                wall_coefficient(
                    q,
                    link.diameter,
                    link.length,
                    link.kw,
                    opts.wall_order,
                    opts.diffusivity,
                )
            } else {
                0.0
            };
        }
        self.demand.copy_from_slice(&snapshot.demand);
        Ok(())
    }

    fn transport(&mut self, dt: f64) {
        self.react_links(dt);
        let acc = self.accumulate(dt);
        self.update_nodes(dt, &acc);
        self.source_input(dt, &acc);
        self.release(dt);
    }

    fn react_links(&mut self, dt: f64) {
        match self.mode {
            QualityMode::Age => {
                for list in &mut self.links {
                    for s in list.iter_mut() {
                        s.conc += dt / 3600.0;
                    }
                }
            }
            QualityMode::Chemical => {
                let opts = &self.network.quality;
                let reaction = self.reaction.as_deref();
                let mut reacted = 0.0;
                for (k, list) in self.links.iter_mut().enumerate() {
                    let link = &self.network.links[k];
                    if link.length == 0.0 {
                        continue;
                    }
                    for s in list.iter_mut() {
                        let vars = ReactionVars {
                            concentration: s.conc,
                            bulk_coeff: link.kb,
                            order: opts.bulk_order,
                            limit: opts.limiting_concentration,
                        };
                        let bulk = match reaction {
                            Some(r) => r.evaluate(&vars),
                            None => bulk_rate(s.conc, link.kb, opts.bulk_order, vars.limit),
                        };
                        let wall = wall_rate(
                            s.conc,
                            link.diameter,
                            link.kw,
                            self.wall_coeff[k],
                            opts.wall_order,
                        );
                        let c = (s.conc + (bulk + wall) * dt).max(0.0);
                        reacted += (s.conc - c) * s.volume;
                        s.conc = c;
                    }
                }
                self.balance.reacted += reacted;
            }
            QualityMode::Trace { .. } | QualityMode::None => {}
        }
    }

    /// Drain the flow volume of every link into its downstream node.
    fn accumulate(&mut self, dt: f64) -> Accumulator {
        let n = self.node_count();
        let mut sum = vec![0.0; n];
        let mut count = vec![0u32; n];
        for k in 0..self.links.len() {
            let (i, j) = (self.upstream(k), self.downstream(k));
            if let Some(f) = self.links[k].front() {
                sum[j] += f.conc;
                count[j] += 1;
            }
            if let Some(b) = self.links[k].back() {
                sum[i] += b.conc;
                count[i] += 1;
            }
        }

        let mut acc = Accumulator {
            vol_in: vec![0.0; n],
            mass_in: vec![0.0; n],
            vol_out: vec![0.0; n],
            neighbour: sum
                .iter()
                .zip(&count)
                .map(|(s, &c)| (c > 0).then(|| s / f64::from(c)))
                .collect(),
        };
        for k in 0..self.links.len() {
            let v = self.flow[k].abs() * dt;
            if v <= 0.0 {
                continue;
            }
            let (i, j) = (self.upstream(k), self.downstream(k));
            let (mass, passed) = self.links[k].drain(v);
            // Water passing through a link within the step is delivered at
            // the link's newest concentration.
            self.balance.inflow += passed;
            acc.vol_in[j] += v;
            acc.mass_in[j] += mass;
            acc.vol_out[i] += v;
        }
        acc
    }

    fn update_nodes(&mut self, dt: f64, acc: &Accumulator) {
        for j in 0..self.network.junction_count {
            let out = acc.vol_out[j] + self.demand[j].max(0.0) * dt;
            let mass = acc.mass_in[j];
            self.node_conc[j] = if out > 0.0 {
                mass / out
            } else if acc.vol_in[j] > 0.0 {
                // Nowhere for the inflow to go within this step.
                self.balance.outflow += mass;
                mass / acc.vol_in[j]
            } else {
                acc.neighbour[j].unwrap_or(self.node_conc[j])
            };
        }

        let opts = &self.network.quality;
        for (t, tank) in self.network.tanks.iter().enumerate() {
            let n = tank.node.pos();
            if tank.is_reservoir() {
                self.balance.outflow += acc.mass_in[n];
                self.node_conc[n] = match self.mode {
                    QualityMode::Trace { node } if node.pos() == n => TRACE_CONC,
                    QualityMode::Chemical => self.network.nodes[n].initial_quality,
                    _ => 0.0,
                };
                continue;
            }
            let tq = &mut self.tanks[t];
            match self.mode {
                QualityMode::Chemical => {
                    let reaction = self.reaction.as_deref();
                    let gained = tq.react(dt, |c| {
                        let vars = ReactionVars {
                            concentration: c,
                            bulk_coeff: tank.kb,
                            order: opts.tank_order,
                            limit: opts.limiting_concentration,
                        };
                        match reaction {
                            Some(r) => r.evaluate(&vars),
                            None => bulk_rate(c, tank.kb, opts.tank_order, vars.limit),
                        }
                    });
                    self.balance.reacted -= gained;
                }
                QualityMode::Age => {
                    tq.react(dt, |_| 1.0 / 3600.0);
                }
                QualityMode::Trace { .. } | QualityMode::None => {}
            }
            self.node_conc[n] = tq.mix(acc.vol_in[n], acc.mass_in[n], acc.vol_out[n], self.tol);
        }

        if let QualityMode::Trace { node } = self.mode {
            self.node_conc[node.pos()] = TRACE_CONC;
        }
    }

    /// Work out each source node's contribution to its outflow concentration.
    fn source_input(&mut self, dt: f64, acc: &Accumulator) {
        self.boost.fill(0.0);
        if self.mode != QualityMode::Chemical {
            return;
        }
        let t = &self.network.times;
        let period = (self.time + t.pattern_start) / t.pattern_step.max(1);
        for (n, node) in self.network.nodes.iter().enumerate() {
            let Some(src) = &node.source else {
                continue;
            };
            if src.strength == 0.0 {
                continue;
            }
            let is_junction = matches!(node.kind, NodeKind::Junction(_));
            let volout = if is_junction {
                acc.vol_out[n] + self.demand[n].max(0.0) * dt
            } else {
                acc.vol_out[n]
            };
            if volout / dt <= SOURCE_CUTOFF {
                continue;
            }
            let s = src.strength * self.network.pattern_factor(src.pattern, period);
            let added = match src.kind {
                SourceKind::Concen if is_junction => {
                    if self.demand[n] < 0.0 {
                        -s * self.demand[n] * dt
                    } else {
                        0.0
                    }
                }
                SourceKind::Concen => {
                    // Storage outflow is replaced by source water; what the
                    // tank released leaves the system.
                    if let NodeKind::Tank(tank) = node.kind
                        && !self.network.tanks[tank.pos()].is_reservoir()
                    {
                        self.balance.outflow += self.node_conc[n] * volout;
                    }
                    self.node_conc[n] = 0.0;
                    s * volout
                }
                SourceKind::Mass => s * dt / 60.0 / LITERS_PER_FT3,
                SourceKind::Setpoint => {
                    if s > self.node_conc[n] {
                        (s - self.node_conc[n]) * volout
                    } else {
                        0.0
                    }
                }
                SourceKind::FlowPaced => s * volout,
            };
            self.boost[n] = added / volout;
            self.balance.inflow += added;
        }
    }

    /// Push each node's outflow into the upstream end of its links.
    fn release(&mut self, dt: f64) {
        for k in 0..self.links.len() {
            let v = self.flow[k].abs() * dt;
            if v <= 0.0 {
                continue;
            }
            let i = self.upstream(k);
            if i >= self.network.junction_count
                && let NodeKind::Tank(t) = self.network.nodes[i].kind
                && self.network.tanks[t.pos()].is_reservoir()
            {
                self.balance.inflow += self.node_conc[i] * v;
            }
            let c = self.node_conc[i] + self.boost[i];
            let spilled = self.links[k].release(v, c, self.tol);
            self.balance.outflow += c * spilled;
        }
        for j in 0..self.network.junction_count {
            let d = self.demand[j];
            if d > 0.0 {
                self.balance.outflow += (self.node_conc[j] + self.boost[j]) * d * dt;
            }
        }
    }

    fn node_count(&self) -> usize {
        self.node_conc.len()
    }
}
