//! wn-components: link and emitter models for the hydraulic solver.
//!
//! Every model linearizes its element around the current flow and returns a
//! [`LinkCoeffs`] pair:
//! - `inv_headloss`: `1 / |dh/dq|`, the element's conductance in the nodal matrix
//! - `flow_correction`: the Newton correction term, signed with the flow
//!
//! Provided models:
//! - Pipe head loss: Hazen-Williams, Darcy-Weisbach, Chezy-Manning
//! - Pumps: constant power, three-point/single-point power function, custom curve
//! - Valves: open/closed with minor loss, TCV, PBV, GPV
//! - Emitters
//!
//! # Example
//!
//! ```
//! use wn_components::{PipeGeometry, headloss_model};
//! use wn_model::HeadlossFormula;
//!
//! let model = headloss_model(HeadlossFormula::Hw);
//! let pipe = PipeGeometry { length: 1000.0, diameter: 1.0, roughness: 100.0 };
//! let r = model.resistance(&pipe);
//! let c = model.coeffs(1.114, r, 0.0, &pipe, 1e-7);
//! assert!(c.inv_headloss > 0.0);
//! ```

pub mod emitter;
pub mod error;
pub mod headloss;
pub mod pump;
pub mod traits;
pub mod valve;

pub use emitter::{emitter_coeffs, emitter_flow_change};
pub use error::{ComponentError, ComponentResult};
pub use headloss::{ChezyManning, DarcyWeisbach, HazenWilliams, headloss_model};
pub use pump::PumpModel;
pub use traits::{HeadlossModel, LinkCoeffs, PipeGeometry};
pub use valve::{gpv_coeffs, pbv_coeffs, tcv_coeffs, valve_coeffs};
