//! Hydraulic time step selection and tank level updates.

use tracing::trace;
use wn_core::constants::QZERO;
use wn_core::round_seconds;

use super::HydraulicEngine;

impl HydraulicEngine {
    /// Length of the next hydraulic step.
    ///
    /// The nominal step is cut at the next pattern boundary, reporting
    /// instant, end of run, tank filling or emptying and simple control.
    /// With rules the step is then walked in rule-step increments and ends
    /// early at the first rule that acts. Tank levels are advanced over the
    /// returned step.
    pub(super) fn time_step(&mut self) -> i64 {
        let t = &self.network.times;
        let mut tstep = t.hydraulic_step;

        if t.pattern_step > 0 {
            let n = (self.time + t.pattern_start) / t.pattern_step + 1;
            let to_pattern = n * t.pattern_step - t.pattern_start - self.time;
            if to_pattern > 0 {
                tstep = tstep.min(to_pattern);
            }
        }
        let to_report = t.next_report_time(self.time) - self.time;
        if to_report > 0 {
            tstep = tstep.min(to_report);
        }
        tstep = tstep.min(t.duration - self.time);

        tstep = self.tank_time_step(tstep);
        tstep = self.control_time_step(tstep);

        if self.rules.is_some() {
            tstep = self.rule_time_step(tstep);
        } else {
            self.update_tank_levels(tstep);
        }
        trace!(time = self.time, tstep, "hydraulic step chosen");
        tstep
    }

    /// Shorten `tstep` to the time at which a tank fills or empties.
    fn tank_time_step(&self, mut tstep: i64) -> i64 {
        for (i, tank) in self.network.tanks.iter().enumerate() {
            if tank.is_reservoir() {
                continue;
            }
            let n = tank.node.pos();
            let q = self.state.demand[n];
            if q.abs() <= QZERO {
                continue;
            }
            let h = self.state.head[n];
            let v = self.state.tank_volume[i];
            let dv = if q > 0.0 && h < tank.hmax {
                tank.vmax - v
            } else if q < 0.0 && h > tank.hmin {
                tank.vmin - v
            } else {
                continue;
            };
            let t = round_seconds(dv / q);
            if t > 0 && t < tstep {
                tstep = t;
            }
        }
        tstep
    }

    /// Walk through `tstep` in rule-step increments, moving tank levels and
    /// evaluating rules, and stop at the first increment where a rule acts.
    fn rule_time_step(&mut self, tstep: i64) -> i64 {
        let rule_step = self
            .rules
            .as_ref()
            .map_or(tstep, |r| r.step())
            .max(1);
        let mut dt = rule_step.min(tstep);
        let mut dt1 = (rule_step - self.time % rule_step).min(tstep);
        if dt1 == 0 {
            dt1 = dt;
        }

        let start = self.time;
        let end = start + tstep;
        loop {
            self.time += dt1;
            self.update_tank_levels(dt1);
            if self.check_rules(dt1) {
                break;
            }
            dt = dt.min(end - self.time);
            dt1 = dt;
            if dt <= 0 {
                break;
            }
        }
        let taken = self.time - start;
        self.time = start;
        taken
    }

    /// Evaluate the rules at the current time and apply their actions.
    fn check_rules(&mut self, dt: i64) -> bool {
        let Some(mut rules) = self.rules.take() else {
            return false;
        };
        let outcome = rules.evaluate(&self.state.view(&self.network), self.time, dt);
        self.rules = Some(rules);

        let mut acted = false;
        for a in outcome.actions {
            if self.apply_action(a.link.pos(), a.action) {
                acted = true;
            }
        }
        acted
    }

    /// Move tank volumes and heads forward by `dt` seconds at the current
    /// net inflows.
    ///
    /// A tank within one second of its limit is snapped onto it.
    pub(super) fn update_tank_levels(&mut self, dt: i64) {
        for (i, tank) in self.network.tanks.iter().enumerate() {
            if tank.is_reservoir() {
                continue;
            }
            let n = tank.node.pos();
            let q = self.state.demand[n];
            let mut v = self.state.tank_volume[i] + q * dt as f64;
            if q > 0.0 && v + q >= tank.vmax {
                v = tank.vmax;
            }
            if q < 0.0 && v + q <= tank.vmin {
                v = tank.vmin;
            }
            v = v.clamp(tank.vmin, tank.vmax);
            self.state.tank_volume[i] = v;
            self.state.head[n] = tank.head_at(v);
        }
    }
}
