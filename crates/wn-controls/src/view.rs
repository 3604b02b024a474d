//! Read-only access to the live hydraulic state.

use wn_core::{LinkId, NodeId, TankId};
use wn_model::{LinkStatus, Network};

/// Current heads, flows and statuses as seen by controls.
///
/// Heads are absolute grades (ft), flows cfs. For a storage node `demand`
/// is its net inflow.
pub trait NetworkView {
    fn network(&self) -> &Network;
    fn head(&self, node: NodeId) -> f64;
    fn demand(&self, node: NodeId) -> f64;
    fn tank_volume(&self, tank: TankId) -> f64;
    fn flow(&self, link: LinkId) -> f64;
    fn status(&self, link: LinkId) -> LinkStatus;
    /// Pump speed or valve setting; `None` when the status is fixed.
    fn setting(&self, link: LinkId) -> Option<f64>;
}
