//! Post-solve diagnostics. Nothing here changes the solution.

use tracing::warn;
use wn_model::LinkStatus;

use super::{HydraulicEngine, StepSolution};

impl HydraulicEngine {
    pub(super) fn log_warnings(&self, solution: &StepSolution) {
        let time = self.time;
        if !solution.balanced {
            warn!(
                time,
                iterations = solution.iterations,
                error = solution.relative_error,
                "system unbalanced"
            );
        }

        for (k, link) in self.network.graph.links().iter().enumerate() {
            let status = self.state.status[k];
            match status {
                LinkStatus::XHead => {
                    warn!(time, pump = %link.name, "pump cannot deliver head, closed");
                }
                LinkStatus::XFcv => {
                    warn!(time, valve = %link.name, "FCV cannot deliver flow");
                }
                LinkStatus::XPressure => {
                    warn!(time, valve = %link.name, "valve cannot deliver pressure");
                }
                _ => {}
            }
            if let Some(pump) = &self.pumps[k]
                && !status.is_closed()
            {
                let speed = self.state.setting[k].unwrap_or(1.0);
                if self.state.flow[k] > speed * pump.max_flow() {
                    warn!(time, pump = %link.name, "pump exceeds maximum flow");
                }
            }
        }

        let negative = (0..self.network.junction_count)
            .filter(|&j| {
                self.state.head[j] < self.network.nodes[j].elevation && self.state.demand[j] > 0.0
            })
            .count();
        if negative > 0 {
            warn!(time, junctions = negative, "negative pressures");
        }

        self.warn_disconnected();
    }

    /// Junctions with demand that no open path connects to a tank or reservoir.
    fn warn_disconnected(&self) {
        let sources: Vec<_> = self.network.tanks.iter().map(|t| t.node).collect();
        let cut_off = self
            .network
            .graph
            .unreachable_from(&sources, |l| !self.state.status[l.pos()].is_closed());
        let mut count = 0;
        for node in cut_off {
            let j = node.pos();
            if j < self.network.junction_count && self.state.demand[j] != 0.0 {
                count += 1;
                warn!(time = self.time, node = %self.network.node_name(node), "node disconnected");
            }
        }
        if count > 0 {
            warn!(time = self.time, nodes = count, "disconnected nodes");
        }
    }
}
