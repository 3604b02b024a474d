//! Link status transitions checked during the network solve.

use tracing::debug;
use wn_core::NodeId;
use wn_core::constants::{BIG, HTOL, QTOL};
use wn_model::{LinkKind, LinkStatus, ValveKind};

use super::HydraulicEngine;

/// Check valve status from the head difference `dh` and flow `q`.
fn cv_status(s: LinkStatus, dh: f64, q: f64) -> LinkStatus {
    if dh.abs() > HTOL {
        if dh < -HTOL || q < -QTOL {
            LinkStatus::Closed
        } else {
            LinkStatus::Open
        }
    } else if q < -QTOL {
        LinkStatus::Closed
    } else {
        s
    }
}

/// Pressure reducing valve status. `hset` is the downstream grade setpoint.
fn prv_status(s: LinkStatus, hset: f64, h1: f64, h2: f64, q: f64, km: f64) -> LinkStatus {
    let hml = km * q * q;
    match s {
        LinkStatus::Active => {
            if q < -QTOL {
                LinkStatus::Closed
            } else if h1 - hml < hset - HTOL {
                LinkStatus::Open
            } else {
                LinkStatus::Active
            }
        }
        LinkStatus::Open => {
            if q < -QTOL {
                LinkStatus::Closed
            } else if h2 >= hset + HTOL {
                LinkStatus::Active
            } else {
                LinkStatus::Open
            }
        }
        LinkStatus::Closed => {
            if h1 >= hset + HTOL && h2 < hset - HTOL {
                LinkStatus::Active
            } else if h1 < hset - HTOL && h1 > h2 + HTOL {
                LinkStatus::Open
            } else {
                LinkStatus::Closed
            }
        }
        LinkStatus::XPressure if q < -QTOL => LinkStatus::Closed,
        other => other,
    }
}

/// Pressure sustaining valve status. `hset` is the upstream grade setpoint.
fn psv_status(s: LinkStatus, hset: f64, h1: f64, h2: f64, q: f64, km: f64) -> LinkStatus {
    let hml = km * q * q;
    match s {
        LinkStatus::Active => {
            if q < -QTOL {
                LinkStatus::Closed
            } else if h2 + hml > hset + HTOL {
                LinkStatus::Open
            } else {
                LinkStatus::Active
            }
        }
        LinkStatus::Open => {
            if q < -QTOL {
                LinkStatus::Closed
            } else if h1 < hset - HTOL {
                LinkStatus::Active
            } else {
                LinkStatus::Open
            }
        }
        LinkStatus::Closed => {
            if h2 > hset + HTOL && h1 > h2 + HTOL {
                LinkStatus::Open
            } else if h1 >= hset + HTOL && h1 > h2 + HTOL {
                LinkStatus::Active
            } else {
                LinkStatus::Closed
            }
        }
        LinkStatus::XPressure if q < -QTOL => LinkStatus::Closed,
        other => other,
    }
}

/// Flow control valve status: it cannot regulate against reverse head or flow.
fn fcv_status(s: LinkStatus, h1: f64, h2: f64, q: f64, setting: f64) -> LinkStatus {
    if h1 - h2 < -HTOL || q < -QTOL {
        LinkStatus::XFcv
    } else if s == LinkStatus::XFcv && q >= setting {
        LinkStatus::Active
    } else {
        s
    }
}

impl HydraulicEngine {
    /// Update PRV and PSV statuses from the latest heads.
    pub(super) fn valve_status(&mut self) -> bool {
        let mut changed = false;
        for k in 0..self.network.link_count() {
            let link = &self.network.links[k];
            let Some(setting) = self.state.setting[k] else {
                continue;
            };
            let (n1, n2) = self.ends[k];
            let (h1, h2) = (self.state.head[n1], self.state.head[n2]);
            let q = self.state.flow[k];
            let old = self.state.status[k];
            let new = match link.valve_kind() {
                Some(ValveKind::Prv) => {
                    let hset = self.network.nodes[n2].elevation + setting;
                    prv_status(old, hset, h1, h2, q, link.km)
                }
                Some(ValveKind::Psv) => {
                    let hset = self.network.nodes[n1].elevation + setting;
                    psv_status(old, hset, h1, h2, q, link.km)
                }
                _ => continue,
            };
            if new != old {
                self.state.status[k] = new;
                self.log_status_change(k, old, new);
                changed = true;
            }
        }
        changed
    }

    /// Update check valve, pump, FCV and tank-connection statuses.
    ///
    /// Links held shut by a head or tank limit are reopened first and then
    /// re-tested.
    pub(super) fn link_status(&mut self) -> bool {
        let mut changed = false;
        for k in 0..self.network.link_count() {
            let (n1, n2) = self.ends[k];
            let dh = self.state.head[n1] - self.state.head[n2];
            let q = self.state.flow[k];
            let old = self.state.status[k];
            if matches!(old, LinkStatus::XHead | LinkStatus::TempClosed) {
                self.state.status[k] = LinkStatus::Open;
            }

            let link = &self.network.links[k];
            match &link.kind {
                LinkKind::Pipe { check_valve: true } => {
                    self.state.status[k] = cv_status(self.state.status[k], dh, q);
                }
                LinkKind::Pump(_) => {
                    let speed = self.state.setting[k].unwrap_or(0.0);
                    if self.state.status[k] >= LinkStatus::Open
                        && speed > 0.0
                        && let Some(pump) = &self.pumps[k]
                    {
                        let hmax = if pump.is_constant_power() {
                            BIG
                        } else {
                            speed * speed * pump.max_head()
                        };
                        self.state.status[k] = if -dh > hmax + HTOL {
                            LinkStatus::XHead
                        } else {
                            LinkStatus::Open
                        };
                    }
                }
                LinkKind::Valve {
                    kind: ValveKind::Fcv,
                    ..
                } => {
                    if let Some(setting) = self.state.setting[k] {
                        let (h1, h2) = (self.state.head[n1], self.state.head[n2]);
                        self.state.status[k] = fcv_status(old, h1, h2, q, setting);
                    }
                }
                _ => {}
            }

            let nj = self.network.junction_count;
            if n1 >= nj || n2 >= nj {
                self.tank_status(k);
            }

            let new = self.state.status[k];
            if new != old {
                self.log_status_change(k, old, new);
                changed = true;
            }
        }
        changed
    }

    /// Close a link that would overfill a full tank or drain an empty one.
    fn tank_status(&mut self, k: usize) {
        if self.state.status[k].is_closed() {
            return;
        }
        let (from, to) = self.ends[k];
        let nj = self.network.junction_count;
        // Orient so that `tank` is the storage node and `q` flows out of it.
        let (tank_node, other, q) = if from >= nj {
            (from, to, self.state.flow[k])
        } else {
            (to, from, -self.state.flow[k])
        };
        let Some(tank) = self.network.tank_of(NodeId::from_usize(tank_node)) else {
            return;
        };
        let tank = &self.network.tanks[tank.pos()];
        if tank.is_reservoir() {
            return;
        }
        let h = self.state.head[tank_node];
        let dh = h - self.state.head[other];
        let is_pump = self.network.links[k].is_pump();

        if h >= tank.hmax - HTOL {
            let filling = if is_pump {
                to == tank_node
            } else {
                cv_status(LinkStatus::Open, dh, q) == LinkStatus::Closed
            };
            if filling {
                self.state.status[k] = LinkStatus::TempClosed;
            }
        }
        if h <= tank.hmin + HTOL {
            let draining = if is_pump {
                from == tank_node
            } else {
                cv_status(LinkStatus::Closed, dh, q) == LinkStatus::Open
            };
            if draining {
                self.state.status[k] = LinkStatus::TempClosed;
            }
        }
    }

    /// Let an active control valve next to `node` stop regulating after the
    /// matrix became singular there. Returns false if there was none.
    ///
    /// Only PRV, PSV and FCV links are candidates; pumps keep their status.
    pub(super) fn release_bad_valve(&mut self, node: usize) -> bool {
        let adjacent: Vec<usize> = self
            .network
            .graph
            .node_links(NodeId::from_usize(node))
            .iter()
            .map(|(l, _)| l.pos())
            .collect();
        for k in adjacent {
            if self.state.status[k] != LinkStatus::Active {
                continue;
            }
            let released = match self.network.links[k].valve_kind() {
                Some(ValveKind::Prv | ValveKind::Psv) => LinkStatus::XPressure,
                Some(ValveKind::Fcv) => LinkStatus::XFcv,
                _ => continue,
            };
            self.log_status_change(k, LinkStatus::Active, released);
            self.state.status[k] = released;
            return true;
        }
        false
    }

    pub(super) fn log_status_change(&self, k: usize, old: LinkStatus, new: LinkStatus) {
        debug!(
            time = self.time,
            link = %self.network.graph.links()[k].name,
            ?old,
            ?new,
            "link status changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_valve_closes_on_reverse_head() {
        assert_eq!(cv_status(LinkStatus::Open, -1.0, 0.5), LinkStatus::Closed);
        assert_eq!(cv_status(LinkStatus::Closed, 1.0, 0.5), LinkStatus::Open);
        assert_eq!(cv_status(LinkStatus::Open, 1.0, -1.0), LinkStatus::Closed);
        // Within the head tolerance the status is kept.
        assert_eq!(cv_status(LinkStatus::Closed, 0.0, 0.0), LinkStatus::Closed);
    }

    #[test]
    fn prv_opens_when_upstream_head_falls_below_setpoint() {
        let s = prv_status(LinkStatus::Active, 100.0, 90.0, 80.0, 1.0, 0.0);
        assert_eq!(s, LinkStatus::Open);
        let s = prv_status(LinkStatus::Open, 100.0, 120.0, 101.0, 1.0, 0.0);
        assert_eq!(s, LinkStatus::Active);
        let s = prv_status(LinkStatus::Active, 100.0, 120.0, 100.0, -1.0, 0.0);
        assert_eq!(s, LinkStatus::Closed);
    }

    #[test]
    fn psv_regulates_upstream() {
        let s = psv_status(LinkStatus::Open, 100.0, 95.0, 80.0, 1.0, 0.0);
        assert_eq!(s, LinkStatus::Active);
        let s = psv_status(LinkStatus::Active, 100.0, 120.0, 110.0, 1.0, 0.0);
        assert_eq!(s, LinkStatus::Open);
    }

    #[test]
    fn fcv_recovers_once_flow_reaches_setting() {
        assert_eq!(
            fcv_status(LinkStatus::Active, 10.0, 20.0, 1.0, 2.0),
            LinkStatus::XFcv
        );
        assert_eq!(
            fcv_status(LinkStatus::XFcv, 20.0, 10.0, 2.0, 2.0),
            LinkStatus::Active
        );
        assert_eq!(
            fcv_status(LinkStatus::XFcv, 20.0, 10.0, 1.0, 2.0),
            LinkStatus::XFcv
        );
    }

    #[test]
    fn singular_node_releases_its_active_valve_once() {
        let def = wn_model::from_yaml_str(
            r#"
name: prv
options:
  flow_units: CFS
junctions:
  - id: J1
  - { id: J2, elevation: 10 }
  - { id: J3, demands: [{ base: 1 }] }
reservoirs:
  - { id: R1, head: 200 }
pipes:
  - { id: P1, from: R1, to: J1, length: 1000, diameter: 12, roughness: 100 }
  - { id: P2, from: J2, to: J3, length: 1000, diameter: 12, roughness: 100 }
valves:
  - { id: V1, from: J1, to: J2, kind: PRV, diameter: 12, setting: 50 }
"#,
        )
        .unwrap();
        let net = wn_model::compile(&def).unwrap();
        let j2 = net.index.node("J2").unwrap().pos();
        let j3 = net.index.node("J3").unwrap().pos();
        let v1 = net.index.link("V1").unwrap().pos();

        let mut engine = HydraulicEngine::new(&net, None).unwrap();
        engine.init();
        engine.state.status[v1] = LinkStatus::Active;

        assert!(!engine.release_bad_valve(j3));
        assert!(engine.release_bad_valve(j2));
        assert_eq!(engine.state.status[v1], LinkStatus::XPressure);
        assert!(!engine.release_bad_valve(j2));
    }
}
