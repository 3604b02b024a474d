//! Simple controls: one trigger, one action.

use wn_core::constants::{QZERO, SEC_PER_DAY};
use wn_core::{TankId, round_seconds};
use wn_model::{Control, Trigger};

use crate::view::NetworkView;

/// Seconds after midnight at elapsed time `time`.
fn clock(time: i64, start_clock: i64) -> i64 {
    (time + start_clock).rem_euclid(SEC_PER_DAY)
}

/// Whether a tank has reached the level `grade`.
///
/// The comparison is made on volume with a one-second allowance of the
/// tank's net inflow. Reservoirs compare heads.
fn tank_level_reached(view: &dyn NetworkView, tank: TankId, grade: f64, above: bool) -> bool {
    let t = &view.network().tanks[tank.pos()];
    let h = view.head(t.node);
    if t.is_reservoir() {
        return if above { h >= grade } else { h <= grade };
    }
    let allowance = view.demand(t.node).abs();
    let v1 = view.tank_volume(tank);
    let v2 = t.volume_at(grade);
    if above {
        v1 >= v2 - allowance
    } else {
        v1 <= v2 + allowance
    }
}

/// Indexes of the tank-level and time controls whose trigger holds at `time`.
///
/// Junction pressure controls are left to [`pressure_switches`], which runs
/// inside the hydraulic iterations.
pub fn due_controls(
    controls: &[Control],
    view: &dyn NetworkView,
    time: i64,
    start_clock: i64,
) -> Vec<usize> {
    controls
        .iter()
        .enumerate()
        .filter(|(_, c)| match c.trigger {
            Trigger::TankAbove { tank, head } => tank_level_reached(view, tank, head, true),
            Trigger::TankBelow { tank, head } => tank_level_reached(view, tank, head, false),
            Trigger::AtTime(t) => time == t,
            Trigger::AtClockTime(t) => clock(time, start_clock) == t,
            Trigger::JunctionAbove { .. } | Trigger::JunctionBelow { .. } => false,
        })
        .map(|(i, _)| i)
        .collect()
}

/// Indexes of junction pressure controls whose trigger holds within `htol`.
pub fn pressure_switches(controls: &[Control], view: &dyn NetworkView, htol: f64) -> Vec<usize> {
    controls
        .iter()
        .enumerate()
        .filter(|(_, c)| match c.trigger {
            Trigger::JunctionBelow { node, head } => view.head(node) <= head + htol,
            Trigger::JunctionAbove { node, head } => view.head(node) >= head - htol,
            _ => false,
        })
        .map(|(i, _)| i)
        .collect()
}

/// Shorten `tstep` to the time at which the next control fires.
///
/// Only controls for which `would_change` returns true (the action would
/// alter its link's current status or setting) are considered.
pub fn time_to_next_control(
    controls: &[Control],
    view: &dyn NetworkView,
    time: i64,
    start_clock: i64,
    tstep: i64,
    would_change: impl Fn(&Control) -> bool,
) -> i64 {
    let net = view.network();
    let mut tstep = tstep;
    for c in controls {
        let t = match c.trigger {
            Trigger::TankAbove { tank, head } | Trigger::TankBelow { tank, head } => {
                let tk = &net.tanks[tank.pos()];
                if tk.is_reservoir() {
                    continue;
                }
                let h = view.head(tk.node);
                let q = view.demand(tk.node);
                if q.abs() <= QZERO {
                    continue;
                }
                let rising_to = matches!(c.trigger, Trigger::TankAbove { .. }) && h < head && q > 0.0;
                let falling_to = matches!(c.trigger, Trigger::TankBelow { .. }) && h > head && q < 0.0;
                if rising_to || falling_to {
                    round_seconds((tk.volume_at(head) - view.tank_volume(tank)) / q)
                } else {
                    0
                }
            }
            Trigger::AtTime(at) if at > time => at - time,
            Trigger::AtTime(_) => 0,
            Trigger::AtClockTime(at) => {
                let now = clock(time, start_clock);
                if at >= now {
                    at - now
                } else {
                    SEC_PER_DAY - now + at
                }
            }
            Trigger::JunctionAbove { .. } | Trigger::JunctionBelow { .. } => continue,
        };
        if t > 0 && t < tstep && would_change(c) {
            tstep = t;
        }
    }
    tstep
}
