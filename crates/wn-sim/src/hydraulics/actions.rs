//! Applying control and rule actions to links.

use tracing::debug;
use wn_controls::{due_controls, pressure_switches, time_to_next_control};
use wn_core::constants::HTOL;
use wn_model::{LinkAction, LinkKind, LinkStatus, ValveKind};

use super::HydraulicEngine;

impl HydraulicEngine {
    /// Status and setting link `k` would take under `action`.
    ///
    /// Opening or closing a pump sets its speed to 1 or 0; opening or
    /// closing a valve other than a GPV drops its setting. A new pump speed
    /// opens or closes the pump; a new FCV setting makes it regulate.
    pub(super) fn action_outcome(
        &self,
        k: usize,
        action: LinkAction,
    ) -> (LinkStatus, Option<f64>) {
        let status = self.state.status[k];
        let setting = self.state.setting[k];
        let kind = &self.network.links[k].kind;
        let fixed_valve = matches!(kind, LinkKind::Valve { kind, .. } if *kind != ValveKind::Gpv);
        match action {
            LinkAction::Open => match kind {
                LinkKind::Pump(_) => (LinkStatus::Open, Some(1.0)),
                _ if fixed_valve => (LinkStatus::Open, None),
                _ => (LinkStatus::Open, setting),
            },
            LinkAction::Close => match kind {
                LinkKind::Pump(_) => (LinkStatus::Closed, Some(0.0)),
                _ if fixed_valve => (LinkStatus::Closed, None),
                _ => (LinkStatus::Closed, setting),
            },
            LinkAction::Setting(v) => match kind {
                LinkKind::Pump(_) => {
                    let status = if v > 0.0 && status.is_closed() {
                        LinkStatus::Open
                    } else if v == 0.0 && !status.is_closed() {
                        LinkStatus::Closed
                    } else {
                        status
                    };
                    (status, Some(v))
                }
                LinkKind::Valve {
                    kind: ValveKind::Fcv,
                    ..
                } => (LinkStatus::Active, Some(v)),
                LinkKind::Valve { .. } => {
                    let status = if setting.is_none() && status.is_closed() {
                        LinkStatus::Open
                    } else {
                        status
                    };
                    (status, Some(v))
                }
                LinkKind::Pipe { .. } => (status, setting),
            },
        }
    }

    /// Whether `action` would open, close or re-set link `k`.
    pub(super) fn action_changes(&self, k: usize, action: LinkAction) -> bool {
        let (status, setting) = self.action_outcome(k, action);
        status.is_closed() != self.state.status[k].is_closed() || setting != self.state.setting[k]
    }

    /// Apply `action` to link `k` if it changes anything.
    pub(super) fn apply_action(&mut self, k: usize, action: LinkAction) -> bool {
        if !self.action_changes(k, action) {
            return false;
        }
        let (status, setting) = self.action_outcome(k, action);
        let was_closed = self.state.status[k].is_closed();
        self.state.status[k] = status;
        self.state.setting[k] = setting;
        if was_closed
            && !status.is_closed()
            && let Some(pump) = &self.pumps[k]
        {
            self.state.flow[k] = setting.unwrap_or(1.0) * pump.initial_flow();
        }
        debug!(
            time = self.time,
            link = %self.network.graph.links()[k].name,
            ?action,
            ?status,
            "control action applied"
        );
        true
    }

    /// Fire the tank-level and time controls due at the current time.
    pub(super) fn apply_controls(&mut self) -> usize {
        let due = due_controls(
            &self.network.controls,
            &self.state.view(&self.network),
            self.time,
            self.network.times.start_clocktime,
        );
        let mut applied = 0;
        for i in due {
            let c = self.network.controls[i];
            if self.apply_action(c.link.pos(), c.action) {
                applied += 1;
            }
        }
        applied
    }

    /// Fire junction pressure controls during the solve.
    pub(super) fn pressure_switch(&mut self) -> bool {
        let due = pressure_switches(
            &self.network.controls,
            &self.state.view(&self.network),
            HTOL,
        );
        let mut changed = false;
        for i in due {
            let c = self.network.controls[i];
            if self.apply_action(c.link.pos(), c.action) {
                changed = true;
            }
        }
        changed
    }

    /// Shorten `tstep` to the next simple control that would change a link.
    pub(super) fn control_time_step(&self, tstep: i64) -> i64 {
        time_to_next_control(
            &self.network.controls,
            &self.state.view(&self.network),
            self.time,
            self.network.times.start_clocktime,
            tstep,
            |c| self.action_changes(c.link.pos(), c.action),
        )
    }
}
