//! Network description validation.

use std::collections::HashSet;

use crate::options::{QualityModeDef, TimeOptions};
use crate::schema::{
    ActionDef, CurveDef, NetworkDef, PatternDef, PremiseDef, SubjectDef, TriggerDef, ValveKind,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn require_positive(field: String, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value, "must be positive"))
    }
}

pub fn validate_network(net: &NetworkDef) -> Result<(), ValidationError> {
    let mut node_ids = HashSet::new();
    let node_names = net
        .junctions
        .iter()
        .map(|j| &j.id)
        .chain(net.reservoirs.iter().map(|r| &r.id))
        .chain(net.tanks.iter().map(|t| &t.id));
    for id in node_names {
        if !node_ids.insert(id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: id.clone(),
                context: "nodes".to_string(),
            });
        }
    }
    let tank_ids: HashSet<&str> = net
        .tanks
        .iter()
        .map(|t| t.id.as_str())
        .chain(net.reservoirs.iter().map(|r| r.id.as_str()))
        .collect();

    let pattern_ids = unique_ids(net.patterns.iter().map(|p| &p.id), "patterns")?;
    let curve_ids = unique_ids(net.curves.iter().map(|c| &c.id), "curves")?;

    for p in &net.patterns {
        validate_pattern(p)?;
    }
    for c in &net.curves {
        validate_curve(c)?;
    }

    let check_pattern = |pattern: &Option<String>, context: &str| match pattern {
        Some(p) if !pattern_ids.contains(p.as_str()) => Err(ValidationError::MissingReference {
            id: p.clone(),
            context: context.to_string(),
        }),
        _ => Ok(()),
    };

    for j in &net.junctions {
        for d in &j.demands {
            check_pattern(&d.pattern, &format!("junction '{}' demand pattern", j.id))?;
        }
        if let Some(c) = j.emitter
            && c < 0.0
        {
            return Err(invalid(format!("junction '{}' emitter", j.id), c, "must be >= 0"));
        }
        if let Some(s) = &j.source {
            check_pattern(&s.pattern, &format!("junction '{}' source pattern", j.id))?;
        }
    }
    for r in &net.reservoirs {
        check_pattern(&r.pattern, &format!("reservoir '{}' head pattern", r.id))?;
        if let Some(s) = &r.source {
            check_pattern(&s.pattern, &format!("reservoir '{}' source pattern", r.id))?;
        }
    }
    for t in &net.tanks {
        require_positive(format!("tank '{}' diameter", t.id), t.diameter)?;
        if t.min_level > t.max_level {
            return Err(invalid(
                format!("tank '{}' min_level", t.id),
                t.min_level,
                "exceeds max_level",
            ));
        }
        if t.init_level < t.min_level || t.init_level > t.max_level {
            return Err(invalid(
                format!("tank '{}' init_level", t.id),
                t.init_level,
                "outside [min_level, max_level]",
            ));
        }
        if !(0.0..=1.0).contains(&t.mixing.fraction) {
            return Err(invalid(
                format!("tank '{}' mixing fraction", t.id),
                t.mixing.fraction,
                "must be within [0, 1]",
            ));
        }
        if let Some(s) = &t.source {
            check_pattern(&s.pattern, &format!("tank '{}' source pattern", t.id))?;
        }
    }

    let link_names = net
        .pipes
        .iter()
        .map(|p| (&p.id, &p.from, &p.to))
        .chain(net.pumps.iter().map(|p| (&p.id, &p.from, &p.to)))
        .chain(net.valves.iter().map(|v| (&v.id, &v.from, &v.to)));
    let mut link_ids = HashSet::new();
    for (id, from, to) in link_names {
        if !link_ids.insert(id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: id.clone(),
                context: "links".to_string(),
            });
        }
        for end in [from, to] {
            if !node_ids.contains(end.as_str()) {
                return Err(ValidationError::MissingReference {
                    id: end.clone(),
                    context: format!("link '{}' end node", id),
                });
            }
        }
        if from == to {
            return Err(invalid(format!("link '{}' to", id), to, "same node as from"));
        }
    }

    for p in &net.pipes {
        require_positive(format!("pipe '{}' length", p.id), p.length)?;
        require_positive(format!("pipe '{}' diameter", p.id), p.diameter)?;
        require_positive(format!("pipe '{}' roughness", p.id), p.roughness)?;
        if p.minor_loss < 0.0 {
            return Err(invalid(
                format!("pipe '{}' minor_loss", p.id),
                p.minor_loss,
                "must be >= 0",
            ));
        }
    }

    for p in &net.pumps {
        match (&p.curve, p.power) {
            (Some(c), None) => {
                if !curve_ids.contains(c.as_str()) {
                    return Err(ValidationError::MissingReference {
                        id: c.clone(),
                        context: format!("pump '{}' curve", p.id),
                    });
                }
            }
            (None, Some(hp)) => require_positive(format!("pump '{}' power", p.id), hp)?,
            _ => {
                return Err(invalid(
                    format!("pump '{}'", p.id),
                    "curve/power",
                    "exactly one of curve or power is required",
                ));
            }
        }
        if p.speed < 0.0 {
            return Err(invalid(format!("pump '{}' speed", p.id), p.speed, "must be >= 0"));
        }
        check_pattern(&p.pattern, &format!("pump '{}' speed pattern", p.id))?;
    }

    for v in &net.valves {
        require_positive(format!("valve '{}' diameter", v.id), v.diameter)?;
        if v.kind == ValveKind::Gpv {
            match &v.curve {
                Some(c) if curve_ids.contains(c.as_str()) => {}
                Some(c) => {
                    return Err(ValidationError::MissingReference {
                        id: c.clone(),
                        context: format!("valve '{}' curve", v.id),
                    });
                }
                None => {
                    return Err(invalid(
                        format!("valve '{}' curve", v.id),
                        "none",
                        "a GPV requires a head loss curve",
                    ));
                }
            }
        } else if v.setting < 0.0 {
            return Err(invalid(
                format!("valve '{}' setting", v.id),
                v.setting,
                "must be >= 0",
            ));
        }
    }

    for (i, c) in net.controls.iter().enumerate() {
        let context = format!("control {}", i + 1);
        if !link_ids.contains(c.link.as_str()) {
            return Err(ValidationError::MissingReference {
                id: c.link.clone(),
                context,
            });
        }
        if matches!(c.action, ActionDef::Setting { .. })
            && net.pipes.iter().any(|p| p.id == c.link)
        {
            return Err(invalid(context, &c.link, "a pipe has no setting"));
        }
        match &c.when {
            TriggerDef::NodeAbove { node, .. } | TriggerDef::NodeBelow { node, .. } => {
                if !node_ids.contains(node.as_str()) {
                    return Err(ValidationError::MissingReference {
                        id: node.clone(),
                        context,
                    });
                }
            }
            TriggerDef::Time { seconds } | TriggerDef::ClockTime { seconds } => {
                if *seconds < 0 {
                    return Err(invalid(context, seconds, "must be >= 0"));
                }
            }
        }
    }

    let mut rule_ids = HashSet::new();
    for r in &net.rules {
        if !rule_ids.insert(r.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: r.id.clone(),
                context: "rules".to_string(),
            });
        }
        if r.premises.is_empty() {
            return Err(invalid(format!("rule '{}'", r.id), "premises", "at least one premise is required"));
        }
        for p in &r.premises {
            validate_premise(p, &r.id, &node_ids, &tank_ids, &link_ids)?;
        }
        for a in r.then.iter().chain(r.otherwise.iter()) {
            if !link_ids.contains(a.link.as_str()) {
                return Err(ValidationError::MissingReference {
                    id: a.link.clone(),
                    context: format!("rule '{}' action", r.id),
                });
            }
        }
    }

    validate_times(&net.options.times)?;

    let q = &net.options.quality;
    if q.mode == QualityModeDef::Trace {
        match &q.trace_node {
            Some(n) if node_ids.contains(n.as_str()) => {}
            Some(n) => {
                return Err(ValidationError::MissingReference {
                    id: n.clone(),
                    context: "quality trace_node".to_string(),
                });
            }
            None => {
                return Err(invalid("quality.trace_node", "none", "trace mode needs a node"));
            }
        }
    }
    if q.wall_order != 0.0 && q.wall_order != 1.0 {
        return Err(invalid("quality.wall_order", q.wall_order, "must be 0 or 1"));
    }
    if q.tolerance < 0.0 {
        return Err(invalid("quality.tolerance", q.tolerance, "must be >= 0"));
    }

    let h = &net.options.hydraulics;
    require_positive("hydraulics.accuracy".to_string(), h.accuracy)?;
    require_positive("hydraulics.emitter_exponent".to_string(), h.emitter_exponent)?;
    if h.max_trials == 0 {
        return Err(invalid("hydraulics.max_trials", 0, "must be >= 1"));
    }

    Ok(())
}

fn unique_ids<'a>(
    ids: impl Iterator<Item = &'a String>,
    context: &str,
) -> Result<HashSet<&'a str>, ValidationError> {
    let mut set = HashSet::new();
    for id in ids {
        if !set.insert(id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: id.clone(),
                context: context.to_string(),
            });
        }
    }
    Ok(set)
}

fn validate_pattern(p: &PatternDef) -> Result<(), ValidationError> {
    if p.multipliers.is_empty() {
        return Err(invalid(
            format!("pattern '{}'", p.id),
            "[]",
            "needs at least one multiplier",
        ));
    }
    Ok(())
}

fn validate_curve(c: &CurveDef) -> Result<(), ValidationError> {
    if c.points.is_empty() {
        return Err(invalid(format!("curve '{}'", c.id), "[]", "needs at least one point"));
    }
    if c.points.windows(2).any(|w| w[1].0 <= w[0].0) {
        return Err(invalid(
            format!("curve '{}'", c.id),
            "x values",
            "must be strictly increasing",
        ));
    }
    Ok(())
}

fn validate_premise(
    p: &PremiseDef,
    rule: &str,
    node_ids: &HashSet<&str>,
    tank_ids: &HashSet<&str>,
    link_ids: &HashSet<&str>,
) -> Result<(), ValidationError> {
    let context = format!("rule '{}' premise", rule);
    match &p.subject {
        SubjectDef::Node { id, variable } => {
            if !node_ids.contains(id.as_str()) {
                return Err(ValidationError::MissingReference {
                    id: id.clone(),
                    context,
                });
            }
            if *variable == crate::schema::NodeVariable::Level && !tank_ids.contains(id.as_str()) {
                return Err(invalid(context, id, "level applies to tanks only"));
            }
        }
        SubjectDef::Link { id, .. } => {
            if !link_ids.contains(id.as_str()) {
                return Err(ValidationError::MissingReference {
                    id: id.clone(),
                    context,
                });
            }
        }
        SubjectDef::Time | SubjectDef::ClockTime => {}
    }
    Ok(())
}

fn validate_times(t: &TimeOptions) -> Result<(), ValidationError> {
    if t.duration < 0 {
        return Err(invalid("times.duration", t.duration, "must be >= 0"));
    }
    for (field, v) in [
        ("times.hydraulic_step", t.hydraulic_step),
        ("times.pattern_step", t.pattern_step),
        ("times.report_step", t.report_step),
    ] {
        if v <= 0 {
            return Err(invalid(field, v, "must be positive"));
        }
    }
    if t.report_start < 0 || t.pattern_start < 0 {
        return Err(invalid("times.report_start", t.report_start, "must be >= 0"));
    }
    if t.report_start > t.duration {
        return Err(invalid(
            "times.report_start",
            t.report_start,
            "outside the simulation window",
        ));
    }
    Ok(())
}
