//! Compiled, immutable network description in internal units (ft, cfs, s).
//!
//! Node order is fixed: junctions first (`0..junction_count`), then
//! reservoirs, then tanks. Every reservoir and tank owns a `Tank` entry;
//! a reservoir is a tank with zero area.

use wn_core::{CurveId, FlowUnits, LinkId, NodeId, PatternId, TankId};
use wn_graph::{Graph, NameIndex};

use crate::controls::{Control, Rule};
use crate::options::{HeadlossFormula, HydraulicOptions, TimeOptions};
use crate::schema::{MixingModel, SourceKind, ValveKind};

/// Link status, ordered by precedence.
///
/// Everything at or below `Closed` carries no flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkStatus {
    /// Pump cannot deliver the required head.
    XHead,
    /// Temporarily closed (check valve reversal, tank full/empty).
    TempClosed,
    Closed,
    Open,
    /// Control valve regulating.
    Active,
    /// Pump exceeding its maximum flow.
    XFlow,
    /// FCV cannot supply its flow.
    XFcv,
    /// Pressure valve cannot hold its setting.
    XPressure,
}

impl LinkStatus {
    pub fn is_closed(self) -> bool {
        self <= LinkStatus::Closed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Demand {
    /// Base demand (cfs).
    pub base: f64,
    pub pattern: Option<PatternId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    pub demands: Vec<Demand>,
    /// Emitter head loss coefficient: h = ke * q^(1/emitter_exponent). Zero when absent.
    pub emitter: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Junction(Junction),
    Tank(TankId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub kind: SourceKind,
    /// Concentration, or mass per minute for `SourceKind::Mass`.
    pub strength: f64,
    pub pattern: Option<PatternId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub elevation: f64,
    pub kind: NodeKind,
    pub initial_quality: f64,
    pub source: Option<Source>,
}

/// Storage node. Heads are absolute grades (ft), volumes ft^3.
#[derive(Debug, Clone, PartialEq)]
pub struct Tank {
    pub node: NodeId,
    /// Cross-sectional area; zero for a reservoir.
    pub area: f64,
    pub hmin: f64,
    pub hmax: f64,
    pub h0: f64,
    pub vmin: f64,
    pub vmax: f64,
    pub v0: f64,
    pub mixing: MixingModel,
    /// Mixing zone volume of a two-compartment tank.
    pub v1max: f64,
    /// Bulk reaction coefficient (1/s).
    pub kb: f64,
    /// Head pattern (reservoirs only).
    pub head_pattern: Option<PatternId>,
}

impl Tank {
    pub fn is_reservoir(&self) -> bool {
        self.area == 0.0
    }

    pub fn volume_at(&self, head: f64) -> f64 {
        self.vmin + (head - self.hmin) * self.area
    }

    pub fn head_at(&self, volume: f64) -> f64 {
        if self.is_reservoir() {
            return self.h0;
        }
        self.hmin + (volume - self.vmin) / self.area
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PumpCurve {
    /// Constant power (hp).
    ConstantPower(f64),
    /// Head curve: x = flow (cfs), y = head (ft).
    Head(CurveId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pump {
    pub curve: PumpCurve,
    pub speed_pattern: Option<PatternId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkKind {
    Pipe { check_valve: bool },
    Pump(Pump),
    Valve {
        kind: ValveKind,
        /// Head loss curve (GPV).
        curve: Option<CurveId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkData {
    pub kind: LinkKind,
    /// Diameter (ft); zero for pumps.
    pub diameter: f64,
    /// Length (ft); zero for pumps and valves.
    pub length: f64,
    /// Hazen-Williams C, Darcy-Weisbach roughness (ft) or Manning n.
    pub roughness: f64,
    /// Minor loss coefficient in head-per-flow-squared form.
    pub km: f64,
    pub initial_status: LinkStatus,
    /// Pump speed or valve setting; `None` when the status is fixed.
    pub initial_setting: Option<f64>,
    /// Bulk reaction coefficient (1/s).
    pub kb: f64,
    /// Wall reaction coefficient (ft/s for first order).
    pub kw: f64,
}

impl LinkData {
    pub fn is_pump(&self) -> bool {
        matches!(self.kind, LinkKind::Pump(_))
    }

    pub fn valve_kind(&self) -> Option<ValveKind> {
        match self.kind {
            LinkKind::Valve { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn is_check_valve(&self) -> bool {
        matches!(self.kind, LinkKind::Pipe { check_valve: true })
    }

    /// Volume of water held in the link (ft^3).
    pub fn volume(&self) -> f64 {
        0.785398 * self.length * self.diameter * self.diameter
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub name: String,
    pub factors: Vec<f64>,
}

impl Pattern {
    /// Multiplier for pattern period `period`, wrapping around the pattern length.
    pub fn factor(&self, period: i64) -> f64 {
        if self.factors.is_empty() {
            return 1.0;
        }
        let len = self.factors.len() as i64;
        self.factors[period.rem_euclid(len) as usize]
    }
}

/// Piecewise linear curve in internal units.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

impl Curve {
    /// Intercept and slope `(h0, r)` of the segment covering `|x|`,
    /// extrapolating the first and last segments.
    pub fn segment(&self, x: f64) -> (f64, f64) {
        let x = x.abs();
        let n = self.points.len();
        if n < 2 {
            let y = self.points.first().map(|p| p.1).unwrap_or(0.0);
            return (y, 0.0);
        }
        let mut k2 = self.points.iter().take_while(|p| p.0 < x).count();
        if k2 == 0 {
            k2 = 1;
        } else if k2 == n {
            k2 = n - 1;
        }
        let (x1, y1) = self.points[k2 - 1];
        let (x2, y2) = self.points[k2];
        let r = (y2 - y1) / (x2 - x1);
        (y1 - r * x1, r)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityMode {
    None,
    Chemical,
    /// Water age in hours.
    Age,
    /// Percent of flow originating at `node`.
    Trace { node: NodeId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualityOptions {
    pub mode: QualityMode,
    pub bulk_order: f64,
    pub wall_order: f64,
    pub tank_order: f64,
    /// Concentration tolerance for merging segments.
    pub tolerance: f64,
    pub limiting_concentration: f64,
    /// Molecular diffusivity (ft^2/s).
    pub diffusivity: f64,
}

impl QualityOptions {
    pub fn is_active(&self) -> bool {
        self.mode != QualityMode::None
    }
}

/// A compiled network ready for simulation.
#[derive(Debug, Clone)]
pub struct Network {
    pub name: String,
    pub graph: Graph,
    pub index: NameIndex,
    pub junction_count: usize,
    /// Per-node data, parallel to `graph.nodes()`.
    pub nodes: Vec<NodeData>,
    /// Per-link data, parallel to `graph.links()`.
    pub links: Vec<LinkData>,
    pub tanks: Vec<Tank>,
    pub patterns: Vec<Pattern>,
    pub curves: Vec<Curve>,
    pub controls: Vec<Control>,
    pub rules: Vec<Rule>,
    pub flow_units: FlowUnits,
    pub headloss: HeadlossFormula,
    pub hydraulics: HydraulicOptions,
    pub times: TimeOptions,
    pub quality: QualityOptions,
}

impl Network {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_junction(&self, node: NodeId) -> bool {
        node.pos() < self.junction_count
    }

    pub fn tank_of(&self, node: NodeId) -> Option<TankId> {
        match self.nodes.get(node.pos())?.kind {
            NodeKind::Tank(t) => Some(t),
            NodeKind::Junction(_) => None,
        }
    }

    pub fn node_name(&self, node: NodeId) -> &str {
        self.graph.node(node).map(|n| n.name.as_str()).unwrap_or("?")
    }

    pub fn link_name(&self, link: LinkId) -> &str {
        self.graph.link(link).map(|l| l.name.as_str()).unwrap_or("?")
    }

    /// Start and end node positions of a link.
    pub fn link_nodes(&self, link: LinkId) -> (usize, usize) {
        let l = &self.graph.links()[link.pos()];
        (l.from.pos(), l.to.pos())
    }

    /// Multiplier of an optional pattern at `period` (1.0 without a pattern).
    pub fn pattern_factor(&self, pattern: Option<PatternId>, period: i64) -> f64 {
        pattern
            .and_then(|p| self.patterns.get(p.pos()))
            .map(|p| p.factor(period))
            .unwrap_or(1.0)
    }

    pub fn curve(&self, id: CurveId) -> Option<&Curve> {
        self.curves.get(id.pos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_precedence() {
        assert!(LinkStatus::XHead < LinkStatus::TempClosed);
        assert!(LinkStatus::TempClosed.is_closed());
        assert!(LinkStatus::Closed.is_closed());
        assert!(!LinkStatus::Open.is_closed());
        assert!(LinkStatus::Active < LinkStatus::XPressure);
    }

    #[test]
    fn pattern_wraps() {
        let p = Pattern {
            name: "P".into(),
            factors: vec![1.0, 2.0, 3.0],
        };
        assert_eq!(p.factor(0), 1.0);
        assert_eq!(p.factor(4), 2.0);
    }

    #[test]
    fn curve_segments_extrapolate() {
        let c = Curve {
            name: "C".into(),
            points: vec![(0.0, 10.0), (1.0, 8.0), (2.0, 2.0)],
        };
        assert_eq!(c.segment(0.5), (10.0, -2.0));
        assert_eq!(c.segment(1.5), (14.0, -6.0));
        assert_eq!(c.segment(3.0), (14.0, -6.0));
        assert_eq!(c.segment(-0.5), (10.0, -2.0));
    }

    #[test]
    fn tank_volume_head_inverse() {
        let t = Tank {
            node: NodeId::from_index(0),
            area: 100.0,
            hmin: 10.0,
            hmax: 30.0,
            h0: 20.0,
            vmin: 50.0,
            vmax: 2050.0,
            v0: 1050.0,
            mixing: MixingModel::Mixed,
            v1max: 2050.0,
            kb: 0.0,
            head_pattern: None,
        };
        assert_eq!(t.volume_at(20.0), 1050.0);
        assert_eq!(t.head_at(1050.0), 20.0);
    }
}
