//! Network description schema (YAML / JSON).
//!
//! Values are in the user's unit system, chosen by `options.flow_units`:
//! lengths and heads in ft or m, pipe diameters in in or mm, pressures as
//! head of water in ft or m, pump power in hp or kW.

use serde::{Deserialize, Serialize};

use crate::options::OptionsDef;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkDef {
    pub name: String,
    #[serde(default)]
    pub options: OptionsDef,
    #[serde(default)]
    pub junctions: Vec<JunctionDef>,
    #[serde(default)]
    pub reservoirs: Vec<ReservoirDef>,
    #[serde(default)]
    pub tanks: Vec<TankDef>,
    #[serde(default)]
    pub pipes: Vec<PipeDef>,
    #[serde(default)]
    pub pumps: Vec<PumpDef>,
    #[serde(default)]
    pub valves: Vec<ValveDef>,
    #[serde(default)]
    pub patterns: Vec<PatternDef>,
    #[serde(default)]
    pub curves: Vec<CurveDef>,
    #[serde(default)]
    pub controls: Vec<ControlDef>,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JunctionDef {
    pub id: String,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default)]
    pub demands: Vec<DemandDef>,
    /// Emitter discharge coefficient (flow units at unit pressure head).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emitter: Option<f64>,
    #[serde(default)]
    pub initial_quality: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemandDef {
    pub base: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservoirDef {
    pub id: String,
    pub head: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub initial_quality: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TankDef {
    pub id: String,
    pub elevation: f64,
    pub init_level: f64,
    #[serde(default)]
    pub min_level: f64,
    pub max_level: f64,
    pub diameter: f64,
    #[serde(default)]
    pub min_volume: f64,
    #[serde(default)]
    pub mixing: MixingDef,
    /// Bulk reaction coefficient (1/day); defaults to the global value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk_coeff: Option<f64>,
    #[serde(default)]
    pub initial_quality: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDef>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MixingModel {
    #[default]
    Mixed,
    TwoComp,
    Fifo,
    Lifo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MixingDef {
    #[serde(default)]
    pub model: MixingModel,
    /// Mixing zone volume as a fraction of the tank's maximum volume.
    #[serde(default = "default_mix_fraction")]
    pub fraction: f64,
}

impl Default for MixingDef {
    fn default() -> Self {
        Self {
            model: MixingModel::Mixed,
            fraction: default_mix_fraction(),
        }
    }
}

fn default_mix_fraction() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Fixed concentration of inflow to the node.
    Concen,
    /// Mass booster (mass/minute).
    Mass,
    /// Setpoint booster: outflow raised to the given concentration.
    Setpoint,
    /// Flow-paced booster: concentration added to outflow.
    FlowPaced,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDef {
    pub kind: SourceKind,
    pub strength: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipeStatusDef {
    #[default]
    Open,
    Closed,
    /// Check valve: flow allowed only from `from` to `to`.
    Cv,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipeDef {
    pub id: String,
    pub from: String,
    pub to: String,
    pub length: f64,
    pub diameter: f64,
    pub roughness: f64,
    #[serde(default)]
    pub minor_loss: f64,
    #[serde(default)]
    pub status: PipeStatusDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk_coeff: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_coeff: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OpenClosed {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PumpDef {
    pub id: String,
    pub from: String,
    pub to: String,
    /// Head curve id; exclusive with `power`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    /// Constant power (hp or kW); exclusive with `curve`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Speed pattern id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub status: OpenClosed,
}

fn default_speed() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValveKind {
    /// Pressure reducing valve.
    Prv,
    /// Pressure sustaining valve.
    Psv,
    /// Pressure breaker valve.
    Pbv,
    /// Flow control valve.
    Fcv,
    /// Throttle control valve.
    Tcv,
    /// General purpose valve with a head loss curve.
    Gpv,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValveDef {
    pub id: String,
    pub from: String,
    pub to: String,
    pub kind: ValveKind,
    pub diameter: f64,
    #[serde(default)]
    pub setting: f64,
    #[serde(default)]
    pub minor_loss: f64,
    /// Head loss curve id (GPV only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    /// Fixed status overriding the setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OpenClosed>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternDef {
    pub id: String,
    pub multipliers: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurveDef {
    pub id: String,
    /// (x, y) pairs with strictly increasing x.
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDef {
    Status { status: OpenClosed },
    Setting { value: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerDef {
    /// Tank level or junction pressure head rises above `value`.
    NodeAbove { node: String, value: f64 },
    /// Tank level or junction pressure head falls below `value`.
    NodeBelow { node: String, value: f64 },
    /// Elapsed simulation time in seconds.
    Time { seconds: i64 },
    /// Time of day in seconds after midnight.
    ClockTime { seconds: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlDef {
    pub link: String,
    pub action: ActionDef,
    pub when: TriggerDef,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Join {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeVariable {
    Head,
    Pressure,
    Level,
    Demand,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkVariable {
    Flow,
    Status,
    Setting,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubjectDef {
    Node { id: String, variable: NodeVariable },
    Link { id: String, variable: LinkVariable },
    Time,
    ClockTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusValue {
    Open,
    Closed,
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PremiseValueDef {
    Number(f64),
    Status(StatusValue),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PremiseDef {
    /// How this premise combines with the ones before it.
    #[serde(default)]
    pub join: Join,
    pub subject: SubjectDef,
    pub relation: Relation,
    pub value: PremiseValueDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleActionDef {
    pub link: String,
    pub action: ActionDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleDef {
    pub id: String,
    #[serde(default)]
    pub priority: f64,
    pub premises: Vec<PremiseDef>,
    #[serde(default)]
    pub then: Vec<RuleActionDef>,
    #[serde(default, rename = "else")]
    pub otherwise: Vec<RuleActionDef>,
}
