//! Solver sentinels and physical constants (internal units: ft, cfs, s).

use crate::Real;

/// Large conductance used to pin heads and model closed links.
pub const CBIG: Real = 1.0e8;
/// Lower bound on emitter coefficients.
pub const CSMALL: Real = 1.0e-6;
pub const TINY: Real = 1.0e-6;
pub const BIG: Real = 1.0e10;
/// Flow assigned to closed links.
pub const QZERO: Real = 1.0e-6;
/// Head tolerance for status checks (ft).
pub const HTOL: Real = 0.0005;
/// Flow tolerance for status checks (cfs).
pub const QTOL: Real = 0.0001;
/// Kinematic viscosity of water at 20 C (ft^2/s).
pub const VISCOSITY: Real = 1.1e-5;
/// Molecular diffusivity of chlorine at 20 C (ft^2/s).
pub const DIFFUSIVITY: Real = 1.3e-8;
pub const SEC_PER_DAY: i64 = 86_400;
pub const LITERS_PER_FT3: Real = 28.317;
/// Head (ft) produced by one horsepower at one cfs.
pub const HP_HEAD_FACTOR: Real = 8.814;
/// Minor loss factor: km = MINOR_LOSS_FACTOR * K / D^4 with D in ft.
pub const MINOR_LOSS_FACTOR: Real = 0.02517;
