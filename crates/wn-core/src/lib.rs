//! wn-core: stable foundation for waternet.
//!
//! Contains:
//! - units (flow and length normalization through uom)
//! - numeric (Real + tolerances + float helpers)
//! - constants (solver sentinels and physical constants)
//! - ids (stable compact IDs for network objects)
//! - error (shared error types)

pub mod constants;
pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

pub use error::{WnError, WnResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
