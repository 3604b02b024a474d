//! Gradient-method network solve.
//!
//! Each trial linearizes every link around its current flow, assembles the
//! junction head equations, solves them and corrects the flows. Regulating
//! PRVs, PSVs and FCVs are assembled separately because an active valve
//! pins a head or a flow instead of acting as a conductance.

use tracing::debug;
use wn_components::{
    LinkCoeffs, emitter_coeffs, emitter_flow_change, gpv_coeffs, pbv_coeffs, tcv_coeffs,
    valve_coeffs,
};
use wn_core::constants::CBIG;
use wn_model::{LinkKind, LinkStatus, NodeKind, ValveKind};
use wn_solver::SolverError;

use super::{HydraulicEngine, StepSolution};
use crate::error::{SimError, SimResult};

/// Relaxation applied to flow corrections once the error falls below the damping limit.
const DAMPED_RELAX: f64 = 0.6;

impl HydraulicEngine {
    pub(crate) fn solve(&mut self) -> SimResult<StepSolution> {
        let opts = &self.network.hydraulics;
        let max_trials = opts.max_trials as usize;
        let extra = opts.unbalanced.extra_iter();
        let trials = if extra > 0 {
            max_trials + extra as usize
        } else {
            max_trials
        };
        let check_freq = opts.check_freq.max(1) as usize;
        let max_check = opts.max_check as usize;
        let damp_limit = opts.damp_limit;
        let accuracy = opts.accuracy;

        let mut next_check = check_freq;
        let mut iter = 1;
        let mut error = f64::INFINITY;
        self.relax = 1.0;

        while iter <= trials {
            self.assemble();
            if let Err(e) = self.matrix.factor_and_solve(
                &mut self.work.diag,
                &mut self.work.off,
                &mut self.work.rhs,
            ) {
                let SolverError::IllConditioned { equation } = e else {
                    return Err(e.into());
                };
                let node = self.matrix.node_at(equation - 1);
                if self.release_bad_valve(node) {
                    continue;
                }
                return Err(SimError::IllConditioned {
                    node: self.network.graph.nodes()[node].name.clone(),
                    time: self.time,
                });
            }
            for j in 0..self.network.junction_count {
                self.state.head[j] = self.work.rhs[self.matrix.row(j)];
            }

            error = self.update_flows();
            self.relax = 1.0;
            let mut valve_change = false;
            if damp_limit > 0.0 {
                if error <= damp_limit {
                    self.relax = DAMPED_RELAX;
                    valve_change = self.valve_status();
                }
            } else {
                valve_change = self.valve_status();
            }
            debug!(iter, error, time = self.time, "hydraulic trial");

            if error <= accuracy {
                if iter > max_trials {
                    break;
                }
                let mut changed = valve_change;
                if self.link_status() {
                    changed = true;
                }
                if self.pressure_switch() {
                    changed = true;
                }
                if !changed {
                    break;
                }
                next_check = iter + check_freq;
            } else if iter <= max_check && iter == next_check {
                self.link_status();
                next_check += check_freq;
            }
            iter += 1;
        }

        Ok(StepSolution {
            time: self.time,
            iterations: iter.min(trials),
            relative_error: error,
            balanced: error <= accuracy,
        })
    }

    fn assemble(&mut self) {
        self.work.clear();
        self.link_coeffs();
        self.emitter_coeffs();
        self.node_coeffs();
        self.valve_coeffs();
    }

    /// Linearized coefficients of link `k`, or `None` for a PRV, PSV or FCV
    /// with a setting (assembled by [`Self::valve_coeffs`]).
    fn link_coefficients(&self, k: usize) -> Option<LinkCoeffs> {
        let link = &self.network.links[k];
        let q = self.state.flow[k];
        let status = self.state.status[k];
        let setting = self.state.setting[k];
        let rq_tol = self.network.hydraulics.rq_tol;
        let coeffs = match &link.kind {
            LinkKind::Valve {
                kind: ValveKind::Prv | ValveKind::Psv | ValveKind::Fcv,
                ..
            } if setting.is_some() => return None,
            _ if status.is_closed() => LinkCoeffs::closed(q),
            LinkKind::Pipe { .. } => {
                self.formula
                    .coeffs(q, self.resistance[k], link.km, &self.geometry[k], rq_tol)
            }
            LinkKind::Pump(_) => match &self.pumps[k] {
                Some(model) => model.coeffs(q, setting.unwrap_or(1.0), rq_tol),
                None => LinkCoeffs::closed(q),
            },
            LinkKind::Valve { kind, curve } => match kind {
                ValveKind::Tcv => tcv_coeffs(q, setting, link.diameter, link.km, rq_tol),
                ValveKind::Pbv => pbv_coeffs(q, setting, link.km, rq_tol),
                ValveKind::Gpv => match curve.and_then(|c| self.network.curve(c)) {
                    Some(c) => gpv_coeffs(q, c, rq_tol),
                    None => valve_coeffs(q, link.km, rq_tol),
                },
                _ => valve_coeffs(q, link.km, rq_tol),
            },
        };
        Some(coeffs)
    }

    fn link_coeffs(&mut self) {
        let nj = self.network.junction_count;
        for k in 0..self.network.link_count() {
            let Some(c) = self.link_coefficients(k) else {
                continue;
            };
            let (n1, n2) = self.ends[k];
            let q = self.state.flow[k];
            let (p, y) = (c.inv_headloss, c.flow_correction);
            let w = &mut self.work;
            w.p[k] = p;
            w.y[k] = y;
            w.excess[n1] -= q;
            w.excess[n2] += q;
            w.off[self.matrix.coeff_index(k)] -= p;
            if n1 < nj {
                let i = self.matrix.row(n1);
                w.diag[i] += p;
                w.rhs[i] += y;
            } else if n2 < nj {
                w.rhs[self.matrix.row(n2)] += p * self.state.head[n1];
            }
            if n2 < nj {
                let j = self.matrix.row(n2);
                w.diag[j] += p;
                w.rhs[j] -= y;
            } else if n1 < nj {
                w.rhs[self.matrix.row(n1)] += p * self.state.head[n2];
            }
        }
    }

    /// Emitters act as links to a virtual reservoir at the junction's elevation.
    fn emitter_coeffs(&mut self) {
        let rq_tol = self.network.hydraulics.rq_tol;
        for (j, node) in self.network.nodes.iter().enumerate() {
            let NodeKind::Junction(junc) = &node.kind else {
                continue;
            };
            if junc.emitter == 0.0 {
                continue;
            }
            let q = self.state.emitter_flow[j];
            let c = emitter_coeffs(junc.emitter, self.qexp, q, rq_tol);
            let i = self.matrix.row(j);
            self.work.diag[i] += c.inv_headloss;
            self.work.rhs[i] += c.flow_correction + c.inv_headloss * node.elevation;
            self.work.excess[j] -= q;
        }
    }

    fn node_coeffs(&mut self) {
        for j in 0..self.network.junction_count {
            self.work.excess[j] -= self.state.demand[j];
            self.work.rhs[self.matrix.row(j)] += self.work.excess[j];
        }
    }

    /// PRV, PSV and FCV with a setting. An active PRV (PSV) fixes its
    /// downstream (upstream) head, an active FCV fixes its flow; otherwise
    /// the valve is an open or closed conductance.
    fn valve_coeffs(&mut self) {
        let rq_tol = self.network.hydraulics.rq_tol;
        for k in 0..self.network.link_count() {
            let link = &self.network.links[k];
            let Some(kind) = link.valve_kind() else {
                continue;
            };
            if !matches!(kind, ValveKind::Prv | ValveKind::Psv | ValveKind::Fcv) {
                continue;
            }
            let Some(setting) = self.state.setting[k] else {
                continue;
            };
            let (n1, n2) = self.ends[k];
            let (i, j) = (self.matrix.row(n1), self.matrix.row(n2));
            let slot = self.matrix.coeff_index(k);
            let q = self.state.flow[k];
            let active = self.state.status[k] == LinkStatus::Active;
            let w = &mut self.work;

            if active {
                match kind {
                    ValveKind::Prv => {
                        let hset = self.network.nodes[n2].elevation + setting;
                        w.p[k] = 0.0;
                        w.y[k] = q + w.excess[n2];
                        w.rhs[j] += hset * CBIG;
                        w.diag[j] += CBIG;
                        if w.excess[n2] < 0.0 {
                            w.rhs[i] += w.excess[n2];
                        }
                    }
                    ValveKind::Psv => {
                        let hset = self.network.nodes[n1].elevation + setting;
                        w.p[k] = 0.0;
                        w.y[k] = q - w.excess[n1];
                        w.rhs[i] += hset * CBIG;
                        w.diag[i] += CBIG;
                        if w.excess[n1] > 0.0 {
                            w.rhs[j] += w.excess[n1];
                        }
                    }
                    _ => {
                        w.excess[n1] -= setting;
                        w.rhs[i] -= setting;
                        w.excess[n2] += setting;
                        w.rhs[j] += setting;
                        let p = 1.0 / CBIG;
                        w.p[k] = p;
                        w.off[slot] -= p;
                        w.diag[i] += p;
                        w.diag[j] += p;
                        w.y[k] = q - setting;
                    }
                }
                continue;
            }

            let c = if self.state.status[k].is_closed() {
                LinkCoeffs::closed(q)
            } else {
                valve_coeffs(q, link.km, rq_tol)
            };
            w.p[k] = c.inv_headloss;
            w.y[k] = c.flow_correction;
            w.off[slot] -= c.inv_headloss;
            w.diag[i] += c.inv_headloss;
            w.diag[j] += c.inv_headloss;
            w.rhs[i] += c.flow_correction - q;
            w.rhs[j] -= c.flow_correction - q;
        }
    }

    /// Correct link and emitter flows from the new heads and return the
    /// relative flow change. Storage node demands become their net inflow.
    fn update_flows(&mut self) -> f64 {
        let nj = self.network.junction_count;
        for tank in &self.network.tanks {
            self.state.demand[tank.node.pos()] = 0.0;
        }

        let mut qsum = 0.0;
        let mut dqsum = 0.0;
        for k in 0..self.network.link_count() {
            let (n1, n2) = self.ends[k];
            let dh = self.state.head[n1] - self.state.head[n2];
            let mut dq = (self.work.y[k] - self.work.p[k] * dh) * self.relax;
            let q = self.state.flow[k];
            if let Some(pump) = &self.pumps[k]
                && pump.is_constant_power()
                && dq > q
            {
                dq = q / 2.0;
            }
            let q = q - dq;
            self.state.flow[k] = q;
            qsum += q.abs();
            dqsum += dq.abs();
            if !self.state.status[k].is_closed() {
                if n1 >= nj {
                    self.state.demand[n1] -= q;
                }
                if n2 >= nj {
                    self.state.demand[n2] += q;
                }
            }
        }

        let rq_tol = self.network.hydraulics.rq_tol;
        for (j, node) in self.network.nodes.iter().enumerate().take(nj) {
            let NodeKind::Junction(junc) = &node.kind else {
                continue;
            };
            if junc.emitter == 0.0 {
                continue;
            }
            let q = self.state.emitter_flow[j];
            let dh = self.state.head[j] - node.elevation;
            let dq = emitter_flow_change(junc.emitter, self.qexp, q, dh, rq_tol);
            self.state.emitter_flow[j] = q - dq;
            qsum += (q - dq).abs();
            dqsum += dq.abs();
        }

        if qsum > self.network.hydraulics.accuracy {
            dqsum / qsum
        } else {
            dqsum
        }
    }
}
