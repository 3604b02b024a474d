//! Rule-based controls.

use wn_core::constants::SEC_PER_DAY;
use wn_model::{
    Join, LinkAction, LinkStatus, LinkVariable, Network, NodeVariable, Premise, PremiseValue,
    Relation, Rule, RuleAction, StatusValue, Subject,
};

use crate::error::{ControlError, ControlResult};
use crate::view::NetworkView;

/// Comparison tolerance for numeric premises and setting changes.
const RULE_TOL: f64 = 1.0e-3;

/// Actions a rule evaluation wants applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    /// At most one action per link; each would change its link.
    pub actions: Vec<RuleAction>,
    /// Time at which the rules must be evaluated again.
    pub next_evaluation: Option<i64>,
}

/// Source of rule actions consulted by the hydraulic engine while it steps
/// through a hydraulic time step.
pub trait RuleEvaluator: Send + std::fmt::Debug {
    /// Evaluate at `time`; `dt` is the length of the interval just simulated,
    /// so time premises are tested over `(time - dt, time]`.
    fn evaluate(&mut self, view: &dyn NetworkView, time: i64, dt: i64) -> RuleOutcome;

    /// Evaluation interval (s).
    fn step(&self) -> i64;

    fn is_empty(&self) -> bool;
}

/// Rules resolved against a compiled network.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    step: i64,
    start_clock: i64,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, step: i64, start_clock: i64) -> ControlResult<Self> {
        if step <= 0 {
            return Err(ControlError::InvalidArg {
                what: "rule step must be positive",
            });
        }
        Ok(Self {
            rules,
            step,
            start_clock,
        })
    }

    /// Rules of `network` with its configured rule step and start clock.
    pub fn from_network(network: &Network) -> ControlResult<Self> {
        let nodes = network.node_count();
        let links = network.link_count();
        for rule in &network.rules {
            let bad = |what: String| ControlError::InvalidReference {
                owner: rule.name.clone(),
                what,
            };
            for p in &rule.premises {
                match p.subject {
                    Subject::Node { node, .. } if node.pos() >= nodes => {
                        return Err(bad(format!("node index {}", node.pos())));
                    }
                    Subject::Link { link, .. } if link.pos() >= links => {
                        return Err(bad(format!("link index {}", link.pos())));
                    }
                    _ => {}
                }
            }
            for a in rule.then_actions.iter().chain(&rule.else_actions) {
                if a.link.pos() >= links {
                    return Err(bad(format!("link index {}", a.link.pos())));
                }
            }
        }
        Self::new(
            network.rules.clone(),
            network.times.rule_step(),
            network.times.start_clocktime,
        )
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Premises combined left to right: an AND premise is only tested while
    /// the chain is still true, an OR premise only once it has become false.
    fn premises_hold(&self, rule: &Rule, view: &dyn NetworkView, t1: i64, t2: i64) -> bool {
        let mut result = true;
        for p in &rule.premises {
            match p.join {
                Join::Or => {
                    if !result {
                        result = self.premise_holds(p, view, t1, t2);
                    }
                }
                Join::And => {
                    if !result {
                        return false;
                    }
                    result = self.premise_holds(p, view, t1, t2);
                }
            }
        }
        result
    }

    fn premise_holds(&self, p: &Premise, view: &dyn NetworkView, t1: i64, t2: i64) -> bool {
        match (p.subject, p.value) {
            (Subject::Time, PremiseValue::Number(x)) => time_holds(p.relation, t1, t2, x as i64),
            (Subject::ClockTime, PremiseValue::Number(x)) => {
                let c1 = (t1 + self.start_clock).rem_euclid(SEC_PER_DAY);
                let c2 = (t2 + self.start_clock).rem_euclid(SEC_PER_DAY);
                time_holds(p.relation, c1, c2, x as i64)
            }
            (Subject::Link { link, .. }, PremiseValue::Status(s)) => {
                let current = match view.status(link) {
                    st if st.is_closed() => StatusValue::Closed,
                    LinkStatus::Active => StatusValue::Active,
                    _ => StatusValue::Open,
                };
                match p.relation {
                    Relation::Eq => current == s,
                    Relation::Ne => current != s,
                    _ => false,
                }
            }
            (subject, PremiseValue::Number(v)) => match observed_value(subject, view) {
                Some(x) => value_holds(p.relation, x, v),
                None => false,
            },
            _ => false,
        }
    }
}

/// Numeric value of a node or link variable in internal units.
fn observed_value(subject: Subject, view: &dyn NetworkView) -> Option<f64> {
    let net = view.network();
    match subject {
        Subject::Node { node, variable } => {
            let h = view.head(node);
            Some(match variable {
                NodeVariable::Head => h,
                NodeVariable::Pressure | NodeVariable::Level => h - net.nodes[node.pos()].elevation,
                NodeVariable::Demand => view.demand(node),
            })
        }
        Subject::Link { link, variable } => match variable {
            LinkVariable::Flow => Some(view.flow(link).abs()),
            LinkVariable::Setting => view.setting(link),
            LinkVariable::Status => None,
        },
        Subject::Time | Subject::ClockTime => None,
    }
}

fn value_holds(relation: Relation, x: f64, v: f64) -> bool {
    match relation {
        Relation::Eq => (x - v).abs() <= RULE_TOL,
        Relation::Ne => (x - v).abs() >= RULE_TOL,
        Relation::Lt => x <= v + RULE_TOL,
        Relation::Le => x <= v - RULE_TOL,
        Relation::Gt => x >= v - RULE_TOL,
        Relation::Ge => x >= v + RULE_TOL,
    }
}

/// Time premise over the interval `[t1, t2]`; equality holds when `x`
/// falls inside it (wrapping past midnight for clock times).
fn time_holds(relation: Relation, t1: i64, t2: i64, x: i64) -> bool {
    match relation {
        Relation::Lt => t2 < x,
        Relation::Le => t2 <= x,
        Relation::Gt => t2 > x,
        Relation::Ge => t2 >= x,
        Relation::Eq | Relation::Ne => {
            let inside = if t2 < t1 {
                x >= t1 || x <= t2
            } else {
                x >= t1 && x <= t2
            };
            (relation == Relation::Eq) == inside
        }
    }
}

/// Whether `action` would change the link's current state.
fn changes_link(action: &RuleAction, view: &dyn NetworkView) -> bool {
    let closed = view.status(action.link).is_closed();
    match action.action {
        LinkAction::Open => closed,
        LinkAction::Close => !closed,
        LinkAction::Setting(x) => match view.setting(action.link) {
            Some(v) => (x - v).abs() > RULE_TOL,
            None => true,
        },
    }
}

impl RuleEvaluator for RuleSet {
    fn evaluate(&mut self, view: &dyn NetworkView, time: i64, dt: i64) -> RuleOutcome {
        let t1 = time - dt + 1;
        // (action, priority, rule index)
        let mut pending: Vec<(RuleAction, f64, usize)> = Vec::new();
        for (r, rule) in self.rules.iter().enumerate() {
            let list = if self.premises_hold(rule, view, t1, time) {
                &rule.then_actions
            } else {
                &rule.else_actions
            };
            for a in list {
                match pending.iter_mut().find(|(p, _, _)| p.link == a.link) {
                    Some(slot) => {
                        if rule.priority > slot.1 {
                            *slot = (*a, rule.priority, r);
                        }
                    }
                    None => pending.push((*a, rule.priority, r)),
                }
            }
        }

        let mut actions = Vec::new();
        for (a, _, r) in pending {
            if changes_link(&a, view) {
                tracing::debug!(
                    rule = %self.rules[r].name,
                    link = %view.network().link_name(a.link),
                    time,
                    "rule action"
                );
                actions.push(a);
            }
        }
        RuleOutcome {
            actions,
            next_evaluation: Some(time + self.step),
        }
    }

    fn step(&self) -> i64 {
        self.step
    }

    fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_equality_is_an_interval_test() {
        assert!(time_holds(Relation::Eq, 3301, 3600, 3500));
        assert!(!time_holds(Relation::Eq, 3301, 3600, 3300));
        assert!(time_holds(Relation::Ne, 3301, 3600, 3700));
        // wraps past midnight
        assert!(time_holds(Relation::Eq, 86000, 200, 100));
        assert!(!time_holds(Relation::Eq, 86000, 200, 500));
    }

    #[test]
    fn time_ordering() {
        assert!(time_holds(Relation::Ge, 0, 7200, 7200));
        assert!(!time_holds(Relation::Gt, 0, 7200, 7200));
        assert!(time_holds(Relation::Lt, 0, 100, 7200));
    }

    #[test]
    fn numeric_relations_use_tolerance() {
        assert!(value_holds(Relation::Eq, 10.0005, 10.0));
        assert!(!value_holds(Relation::Eq, 10.01, 10.0));
        assert!(value_holds(Relation::Gt, 9.9995, 10.0));
        assert!(value_holds(Relation::Lt, 10.0005, 10.0));
        assert!(!value_holds(Relation::Ge, 10.0, 10.0));
        assert!(value_holds(Relation::Ne, 11.0, 10.0));
    }

    #[test]
    fn rule_step_must_be_positive() {
        assert!(RuleSet::new(Vec::new(), 0, 0).is_err());
        let set = RuleSet::new(Vec::new(), 360, 0).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.step(), 360);
    }
}
