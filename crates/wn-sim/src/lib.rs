//! Extended-period simulation for waternet networks.
//!
//! Provides:
//! - Hydraulic engine: gradient-method network solve, valve/pump/check-valve
//!   status logic, simple controls and rules, variable time stepping
//! - Water quality engine: Lagrangian segment transport with bulk and wall
//!   reactions, tank mixing models, sources and a mass balance
//! - Cooperative cancellation and a polling clock for progress
//!
//! The static network (`wn_model::Network`) is never mutated during a run;
//! everything that changes lives in [`NetworkState`].

pub mod cancel;
pub mod error;
pub mod hydraulics;
pub mod quality;
pub mod state;

pub use cancel::{CancelToken, SimClock};
pub use error::{SimError, SimResult};
pub use hydraulics::{HydraulicEngine, HydraulicSummary, StepSolution};
pub use quality::{
    HydraulicSnapshot, MassBalance, QualityEngine, ReactionExpression, ReactionVars, Segment,
    TankStore,
};
pub use state::{NetworkState, StateView};
