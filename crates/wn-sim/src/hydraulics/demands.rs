use wn_model::{LinkAction, LinkKind, NodeKind};

use super::HydraulicEngine;

impl HydraulicEngine {
    /// Current pattern period.
    fn pattern_period(&self) -> i64 {
        let t = &self.network.times;
        (self.time + t.pattern_start) / t.pattern_step.max(1)
    }

    /// Set junction demands, reservoir heads and pump speeds for the
    /// current pattern period.
    pub(super) fn apply_demands(&mut self) {
        let period = self.pattern_period();
        let multiplier = self.network.hydraulics.demand_multiplier;

        for (j, node) in self.network.nodes.iter().enumerate() {
            if let NodeKind::Junction(junc) = &node.kind {
                self.state.demand[j] = junc
                    .demands
                    .iter()
                    .map(|d| d.base * self.network.pattern_factor(d.pattern, period) * multiplier)
                    .sum();
            }
        }

        for tank in &self.network.tanks {
            if tank.is_reservoir() && tank.head_pattern.is_some() {
                let factor = self.network.pattern_factor(tank.head_pattern, period);
                self.state.head[tank.node.pos()] = tank.h0 * factor;
            }
        }

        let speeds: Vec<(usize, f64)> = self
            .network
            .links
            .iter()
            .enumerate()
            .filter_map(|(k, link)| match &link.kind {
                LinkKind::Pump(p) if p.speed_pattern.is_some() => {
                    Some((k, self.network.pattern_factor(p.speed_pattern, period)))
                }
                _ => None,
            })
            .collect();
        for (k, speed) in speeds {
            let (status, setting) = self.action_outcome(k, LinkAction::Setting(speed));
            self.state.status[k] = status;
            self.state.setting[k] = setting;
        }
    }
}
