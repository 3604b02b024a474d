//! Simple controls and rule-based controls for waternet.
//!
//! Controls act on links only: they open or close them or change a pump
//! speed or valve setting. Two kinds are supported:
//! - simple controls with a single trigger (tank level, junction pressure,
//!   elapsed time or clock time)
//! - rules: premises joined by AND/OR with THEN and ELSE action lists,
//!   evaluated at a fixed rule step and resolved by priority
//!
//! Neither kind mutates simulation state. They read it through
//! [`NetworkView`] and report which actions are due; the hydraulic engine
//! applies them.

pub mod error;
pub mod rules;
pub mod simple;
pub mod view;

pub use error::{ControlError, ControlResult};
pub use rules::{RuleEvaluator, RuleOutcome, RuleSet};
pub use simple::{due_controls, pressure_switches, time_to_next_control};
pub use view::NetworkView;
