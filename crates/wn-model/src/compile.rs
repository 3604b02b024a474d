//! Compile a validated `NetworkDef` into a `Network` in internal units.

use std::collections::HashMap;

use tracing::debug;
use wn_core::constants::{DIFFUSIVITY, MINOR_LOSS_FACTOR, SEC_PER_DAY};
use wn_core::{CurveId, FlowUnits, Id, LinkId, NodeId, PatternId, UnitSystem};
use wn_graph::{GraphBuilder, NameIndex};

use crate::controls::{
    Control, LinkAction, Premise, PremiseValue, Rule, RuleAction, Subject, Trigger,
};
use crate::network::{
    Curve, Demand, Junction, LinkData, LinkKind, LinkStatus, Network, NodeData, NodeKind, Pattern,
    Pump, PumpCurve, QualityMode, QualityOptions, Source, Tank,
};
use crate::options::{HeadlossFormula, QualityModeDef};
use crate::schema::{
    ActionDef, LinkVariable, NetworkDef, NodeVariable, OpenClosed, PipeStatusDef, PremiseValueDef,
    SourceDef, SubjectDef, TriggerDef, ValveKind,
};
use crate::validate::{ValidationError, validate_network};
use crate::{ModelError, ModelResult};

/// Unit factors taking user values to internal units.
#[derive(Debug, Clone, Copy)]
struct Factors {
    length: f64,
    diameter: f64,
    flow: f64,
    dw_roughness: f64,
    power: f64,
}

impl Factors {
    fn new(units: FlowUnits) -> Self {
        let system: UnitSystem = units.system();
        Self {
            length: system.length_to_ft(),
            diameter: system.diameter_to_ft(),
            flow: units.to_cfs(),
            dw_roughness: system.dw_roughness_to_ft(),
            power: system.power_to_hp(),
        }
    }
}

fn missing(id: &str, context: &str) -> ModelError {
    ModelError::Validation(ValidationError::MissingReference {
        id: id.to_string(),
        context: context.to_string(),
    })
}

pub fn compile(def: &NetworkDef) -> ModelResult<Network> {
    validate_network(def)?;

    let f = Factors::new(def.options.flow_units);
    let q = &def.options.quality;

    let pattern_ids: HashMap<&str, PatternId> = def
        .patterns
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.as_str(), Id::from_usize(i)))
        .collect();
    let curve_ids: HashMap<&str, CurveId> = def
        .curves
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), Id::from_usize(i)))
        .collect();
    let pattern = |name: &Option<String>| -> ModelResult<Option<PatternId>> {
        match name {
            None => Ok(None),
            Some(n) => pattern_ids
                .get(n.as_str())
                .copied()
                .map(Some)
                .ok_or_else(|| missing(n, "pattern")),
        }
    };
    let source = |s: &Option<SourceDef>| -> ModelResult<Option<Source>> {
        s.as_ref()
            .map(|s| {
                Ok(Source {
                    kind: s.kind,
                    strength: s.strength,
                    pattern: pattern(&s.pattern)?,
                })
            })
            .transpose()
    };

    let mut builder = GraphBuilder::new();
    let mut nodes = Vec::new();
    let mut tanks = Vec::new();

    // Emitter: q = C p^e  =>  h = ke q^(1/e)
    let qexp = 1.0 / def.options.hydraulics.emitter_exponent;
    for j in &def.junctions {
        builder.add_node(j.id.clone());
        let demands = j
            .demands
            .iter()
            .map(|d| {
                Ok(Demand {
                    base: d.base * f.flow,
                    pattern: pattern(&d.pattern)?,
                })
            })
            .collect::<ModelResult<Vec<_>>>()?;
        let emitter = match j.emitter {
            Some(c) if c > 0.0 => f.length / (c * f.flow).powf(qexp),
            _ => 0.0,
        };
        nodes.push(NodeData {
            elevation: j.elevation * f.length,
            kind: NodeKind::Junction(Junction { demands, emitter }),
            initial_quality: j.initial_quality,
            source: source(&j.source)?,
        });
    }
    let junction_count = nodes.len();

    for r in &def.reservoirs {
        let node = builder.add_node(r.id.clone());
        let head = r.head * f.length;
        let tank = Id::from_usize(tanks.len());
        tanks.push(Tank {
            node,
            area: 0.0,
            hmin: head,
            hmax: head,
            h0: head,
            vmin: 0.0,
            vmax: 0.0,
            v0: 0.0,
            mixing: crate::schema::MixingModel::Mixed,
            v1max: 0.0,
            kb: 0.0,
            head_pattern: pattern(&r.pattern)?,
        });
        nodes.push(NodeData {
            elevation: head,
            kind: NodeKind::Tank(tank),
            initial_quality: r.initial_quality,
            source: source(&r.source)?,
        });
    }

    for t in &def.tanks {
        let node = builder.add_node(t.id.clone());
        let elevation = t.elevation * f.length;
        let diameter = t.diameter * f.length;
        let area = std::f64::consts::PI * diameter * diameter / 4.0;
        let hmin = elevation + t.min_level * f.length;
        let hmax = elevation + t.max_level * f.length;
        let h0 = elevation + t.init_level * f.length;
        let vmin = if t.min_volume > 0.0 {
            t.min_volume * f.length.powi(3)
        } else {
            area * t.min_level * f.length
        };
        let vmax = vmin + (hmax - hmin) * area;
        let v0 = vmin + (h0 - hmin) * area;
        let tank = Id::from_usize(tanks.len());
        tanks.push(Tank {
            node,
            area,
            hmin,
            hmax,
            h0,
            vmin,
            vmax,
            v0,
            mixing: t.mixing.model,
            v1max: t.mixing.fraction * vmax,
            kb: t.bulk_coeff.unwrap_or(q.bulk_coeff) / SEC_PER_DAY as f64,
            head_pattern: None,
        });
        nodes.push(NodeData {
            elevation,
            kind: NodeKind::Tank(tank),
            initial_quality: t.initial_quality,
            source: source(&t.source)?,
        });
    }

    let node_lookup: HashMap<String, NodeId> = def
        .junctions
        .iter()
        .map(|j| j.id.clone())
        .chain(def.reservoirs.iter().map(|r| r.id.clone()))
        .chain(def.tanks.iter().map(|t| t.id.clone()))
        .enumerate()
        .map(|(i, name)| (name, Id::from_usize(i)))
        .collect();
    let node_id = |name: &str| -> ModelResult<NodeId> {
        node_lookup
            .get(name)
            .copied()
            .ok_or_else(|| missing(name, "node"))
    };

    let wall_per_sec = f.length / SEC_PER_DAY as f64;
    let mut links = Vec::new();
    for p in &def.pipes {
        builder.add_link(p.id.clone(), node_id(&p.from)?, node_id(&p.to)?);
        let diameter = p.diameter * f.diameter;
        let roughness = match def.options.headloss {
            HeadlossFormula::Dw => p.roughness * f.dw_roughness,
            HeadlossFormula::Hw | HeadlossFormula::Cm => p.roughness,
        };
        let kw = match p.wall_coeff {
            Some(kw) => kw,
            None if q.roughness_correlation != 0.0 => match def.options.headloss {
                HeadlossFormula::Hw => q.roughness_correlation / roughness,
                HeadlossFormula::Dw => q.roughness_correlation / (roughness / diameter).ln().abs(),
                HeadlossFormula::Cm => q.roughness_correlation * roughness,
            },
            None => q.wall_coeff,
        };
        links.push(LinkData {
            kind: LinkKind::Pipe {
                check_valve: p.status == PipeStatusDef::Cv,
            },
            diameter,
            length: p.length * f.length,
            roughness,
            km: MINOR_LOSS_FACTOR * p.minor_loss / diameter.powi(4),
            initial_status: match p.status {
                PipeStatusDef::Closed => LinkStatus::Closed,
                PipeStatusDef::Open | PipeStatusDef::Cv => LinkStatus::Open,
            },
            initial_setting: None,
            kb: p.bulk_coeff.unwrap_or(q.bulk_coeff) / SEC_PER_DAY as f64,
            kw: kw * wall_per_sec,
        });
    }

    // Pump and GPV curves are both flow vs. head
    let curves: Vec<Curve> = def
        .curves
        .iter()
        .map(|c| Curve {
            name: c.id.clone(),
            points: c
                .points
                .iter()
                .map(|&(x, y)| (x * f.flow, y * f.length))
                .collect(),
        })
        .collect();

    for p in &def.pumps {
        builder.add_link(p.id.clone(), node_id(&p.from)?, node_id(&p.to)?);
        let curve = match (&p.curve, p.power) {
            (Some(c), _) => {
                let id = curve_ids
                    .get(c.as_str())
                    .copied()
                    .ok_or_else(|| missing(c, "pump curve"))?;
                PumpCurve::Head(id)
            }
            (None, Some(power)) => PumpCurve::ConstantPower(power * f.power),
            (None, None) => return Err(missing(&p.id, "pump curve or power")),
        };
        let closed = p.status == OpenClosed::Closed || p.speed == 0.0;
        links.push(LinkData {
            kind: LinkKind::Pump(Pump {
                curve,
                speed_pattern: pattern(&p.pattern)?,
            }),
            diameter: 0.0,
            length: 0.0,
            roughness: 0.0,
            km: 0.0,
            initial_status: if closed {
                LinkStatus::Closed
            } else {
                LinkStatus::Open
            },
            initial_setting: Some(p.speed),
            kb: 0.0,
            kw: 0.0,
        });
    }

    for v in &def.valves {
        builder.add_link(v.id.clone(), node_id(&v.from)?, node_id(&v.to)?);
        let diameter = v.diameter * f.diameter;
        let curve = match (&v.curve, v.kind) {
            (Some(c), ValveKind::Gpv) => {
                let id = curve_ids
                    .get(c.as_str())
                    .copied()
                    .ok_or_else(|| missing(c, "valve curve"))?;
                Some(id)
            }
            _ => None,
        };
        let (initial_status, initial_setting) = match v.status {
            Some(OpenClosed::Open) => (LinkStatus::Open, None),
            Some(OpenClosed::Closed) => (LinkStatus::Closed, None),
            None => (
                LinkStatus::Active,
                Some(valve_setting(v.kind, v.setting, &f)),
            ),
        };
        links.push(LinkData {
            kind: LinkKind::Valve { kind: v.kind, curve },
            diameter,
            length: 0.0,
            roughness: 0.0,
            km: MINOR_LOSS_FACTOR * v.minor_loss / diameter.powi(4),
            initial_status,
            initial_setting,
            kb: 0.0,
            kw: 0.0,
        });
    }

    let graph = builder.build()?;
    let index = NameIndex::from_graph(&graph);
    let link_id = |name: &str| -> ModelResult<LinkId> { Ok(index.link(name)?) };

    let action = |link: LinkId, a: &ActionDef| -> LinkAction {
        match a {
            ActionDef::Status {
                status: OpenClosed::Open,
            } => LinkAction::Open,
            ActionDef::Status {
                status: OpenClosed::Closed,
            } => LinkAction::Close,
            ActionDef::Setting { value } => {
                LinkAction::Setting(link_setting(&links[link.pos()].kind, *value, &f))
            }
        }
    };

    let mut controls = Vec::with_capacity(def.controls.len());
    for c in &def.controls {
        let link = link_id(&c.link)?;
        let trigger = match &c.when {
            TriggerDef::NodeAbove { node, value } | TriggerDef::NodeBelow { node, value } => {
                let n = node_id(node)?;
                let data = &nodes[n.pos()];
                let head = data.elevation + value * f.length;
                let above = matches!(c.when, TriggerDef::NodeAbove { .. });
                match (&data.kind, above) {
                    (NodeKind::Tank(tank), true) => Trigger::TankAbove { tank: *tank, head },
                    (NodeKind::Tank(tank), false) => Trigger::TankBelow { tank: *tank, head },
                    (NodeKind::Junction(_), true) => Trigger::JunctionAbove { node: n, head },
                    (NodeKind::Junction(_), false) => Trigger::JunctionBelow { node: n, head },
                }
            }
            TriggerDef::Time { seconds } => Trigger::AtTime(*seconds),
            TriggerDef::ClockTime { seconds } => Trigger::AtClockTime(*seconds),
        };
        controls.push(Control {
            link,
            action: action(link, &c.action),
            trigger,
        });
    }

    let mut rules = Vec::with_capacity(def.rules.len());
    for r in &def.rules {
        let mut premises = Vec::with_capacity(r.premises.len());
        for p in &r.premises {
            let subject = match &p.subject {
                SubjectDef::Node { id, variable } => Subject::Node {
                    node: node_id(id)?,
                    variable: *variable,
                },
                SubjectDef::Link { id, variable } => Subject::Link {
                    link: link_id(id)?,
                    variable: *variable,
                },
                SubjectDef::Time => Subject::Time,
                SubjectDef::ClockTime => Subject::ClockTime,
            };
            let value = match (&p.value, subject) {
                (PremiseValueDef::Status(s), _) => PremiseValue::Status(*s),
                (PremiseValueDef::Number(v), Subject::Node { variable, .. }) => {
                    PremiseValue::Number(match variable {
                        NodeVariable::Demand => v * f.flow,
                        NodeVariable::Head | NodeVariable::Pressure | NodeVariable::Level => {
                            v * f.length
                        }
                    })
                }
                (PremiseValueDef::Number(v), Subject::Link { link, variable }) => {
                    PremiseValue::Number(match variable {
                        LinkVariable::Flow => v * f.flow,
                        LinkVariable::Setting => link_setting(&links[link.pos()].kind, *v, &f),
                        LinkVariable::Status => *v,
                    })
                }
                (PremiseValueDef::Number(v), Subject::Time | Subject::ClockTime) => {
                    PremiseValue::Number(*v)
                }
            };
            premises.push(Premise {
                join: p.join,
                subject,
                relation: p.relation,
                value,
            });
        }
        let actions = |list: &[crate::schema::RuleActionDef]| -> ModelResult<Vec<RuleAction>> {
            list.iter()
                .map(|a| {
                    let link = link_id(&a.link)?;
                    Ok(RuleAction {
                        link,
                        action: action(link, &a.action),
                    })
                })
                .collect()
        };
        rules.push(Rule {
            name: r.id.clone(),
            priority: r.priority,
            premises,
            then_actions: actions(&r.then)?,
            else_actions: actions(&r.otherwise)?,
        });
    }

    let mode = match q.mode {
        QualityModeDef::None => QualityMode::None,
        QualityModeDef::Chemical => QualityMode::Chemical,
        QualityModeDef::Age => QualityMode::Age,
        QualityModeDef::Trace => {
            let name = q
                .trace_node
                .as_deref()
                .ok_or_else(|| missing("trace_node", "quality options"))?;
            QualityMode::Trace {
                node: node_id(name)?,
            }
        }
    };

    let patterns = def
        .patterns
        .iter()
        .map(|p| Pattern {
            name: p.id.clone(),
            factors: p.multipliers.clone(),
        })
        .collect();

    debug!(
        nodes = nodes.len(),
        links = links.len(),
        tanks = tanks.len(),
        "compiled network '{}'",
        def.name
    );

    Ok(Network {
        name: def.name.clone(),
        graph,
        index,
        junction_count,
        nodes,
        links,
        tanks,
        patterns,
        curves,
        controls,
        rules,
        flow_units: def.options.flow_units,
        headloss: def.options.headloss,
        hydraulics: def.options.hydraulics.clone(),
        times: def.options.times.clone(),
        quality: QualityOptions {
            mode,
            bulk_order: q.bulk_order,
            wall_order: q.wall_order,
            tank_order: q.tank_order,
            tolerance: q.tolerance,
            limiting_concentration: q.limiting_concentration,
            diffusivity: q.diffusivity * DIFFUSIVITY,
        },
    })
}

fn valve_setting(kind: ValveKind, value: f64, f: &Factors) -> f64 {
    match kind {
        ValveKind::Prv | ValveKind::Psv | ValveKind::Pbv => value * f.length,
        ValveKind::Fcv => value * f.flow,
        ValveKind::Tcv | ValveKind::Gpv => value,
    }
}

fn link_setting(kind: &LinkKind, value: f64, f: &Factors) -> f64 {
    match kind {
        LinkKind::Valve { kind, .. } => valve_setting(*kind, value, f),
        LinkKind::Pump(_) | LinkKind::Pipe { .. } => value,
    }
}
