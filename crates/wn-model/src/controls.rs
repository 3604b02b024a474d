//! Compiled simple controls and rule-based controls.

use wn_core::{LinkId, NodeId, TankId};

pub use crate::schema::{Join, LinkVariable, NodeVariable, Relation, StatusValue};

/// What a control or rule does to a link. Settings are in internal units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkAction {
    Open,
    Close,
    Setting(f64),
}

/// Simple control trigger. Heads are absolute grades (ft).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    TankAbove { tank: TankId, head: f64 },
    TankBelow { tank: TankId, head: f64 },
    JunctionAbove { node: NodeId, head: f64 },
    JunctionBelow { node: NodeId, head: f64 },
    /// Elapsed seconds.
    AtTime(i64),
    /// Seconds after midnight.
    AtClockTime(i64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Control {
    pub link: LinkId,
    pub action: LinkAction,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Subject {
    Node { node: NodeId, variable: NodeVariable },
    Link { link: LinkId, variable: LinkVariable },
    Time,
    ClockTime,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PremiseValue {
    Number(f64),
    Status(StatusValue),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Premise {
    pub join: Join,
    pub subject: Subject,
    pub relation: Relation,
    pub value: PremiseValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleAction {
    pub link: LinkId,
    pub action: LinkAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub priority: f64,
    pub premises: Vec<Premise>,
    pub then_actions: Vec<RuleAction>,
    pub else_actions: Vec<RuleAction>,
}
