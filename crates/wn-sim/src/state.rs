//! Mutable hydraulic state, kept apart from the immutable network.

use wn_controls::NetworkView;
use wn_core::{LinkId, NodeId, TankId};
use wn_model::{LinkStatus, Network};

/// Everything a hydraulic run rewrites, indexed by node, link or tank position.
///
/// Cloning gives a snapshot that can be restored later.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkState {
    /// Hydraulic grade per node (ft).
    pub head: Vec<f64>,
    /// Junction demand (cfs); net inflow for storage nodes.
    pub demand: Vec<f64>,
    /// Emitter outflow per node (cfs), zero where there is no emitter.
    pub emitter_flow: Vec<f64>,
    pub flow: Vec<f64>,
    pub status: Vec<LinkStatus>,
    /// Pump speed or valve setting; `None` when the status is fixed.
    pub setting: Vec<Option<f64>>,
    /// Stored volume per tank (ft^3).
    pub tank_volume: Vec<f64>,
}

impl NetworkState {
    /// State at the start of a run: initial tank levels, statuses and
    /// settings, junction heads at their elevation and no flow.
    pub fn new(network: &Network) -> Self {
        let mut head: Vec<f64> = network.nodes.iter().map(|n| n.elevation).collect();
        for tank in &network.tanks {
            head[tank.node.pos()] = tank.h0;
        }
        Self {
            head,
            demand: vec![0.0; network.node_count()],
            emitter_flow: vec![0.0; network.node_count()],
            flow: vec![0.0; network.link_count()],
            status: network.links.iter().map(|l| l.initial_status).collect(),
            setting: network.links.iter().map(|l| l.initial_setting).collect(),
            tank_volume: network.tanks.iter().map(|t| t.v0).collect(),
        }
    }

    pub fn view<'a>(&'a self, network: &'a Network) -> StateView<'a> {
        StateView {
            network,
            state: self,
        }
    }

    /// Pressure head at a node (ft of water).
    pub fn pressure(&self, network: &Network, node: usize) -> f64 {
        self.head[node] - network.nodes[node].elevation
    }
}

/// Read-only pairing of a network and its state, as seen by controls.
#[derive(Debug, Clone, Copy)]
pub struct StateView<'a> {
    network: &'a Network,
    state: &'a NetworkState,
}

impl NetworkView for StateView<'_> {
    fn network(&self) -> &Network {
        self.network
    }

    fn head(&self, node: NodeId) -> f64 {
        self.state.head[node.pos()]
    }

    fn demand(&self, node: NodeId) -> f64 {
        self.state.demand[node.pos()]
    }

    fn tank_volume(&self, tank: TankId) -> f64 {
        self.state.tank_volume[tank.pos()]
    }

    fn flow(&self, link: LinkId) -> f64 {
        self.state.flow[link.pos()]
    }

    fn status(&self, link: LinkId) -> LinkStatus {
        self.state.status[link.pos()]
    }

    fn setting(&self, link: LinkId) -> Option<f64> {
        self.state.setting[link.pos()]
    }
}
