//! Bulk and wall reaction kinetics.

use std::f64::consts::PI;

use wn_core::constants::{TINY, VISCOSITY};
use wn_core::sgn;

/// Values a custom bulk reaction may depend on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionVars {
    pub concentration: f64,
    /// Bulk coefficient of the pipe or tank (1/s for first order).
    pub bulk_coeff: f64,
    pub order: f64,
    pub limit: f64,
}

/// User-supplied bulk reaction rate, replacing the built-in n-th order law.
///
/// The result is a rate of change of concentration per second.
pub trait ReactionExpression: Send + std::fmt::Debug {
    fn evaluate(&self, vars: &ReactionVars) -> f64;
}

/// Bulk reaction rate (concentration per second).
///
/// Order 0 is a constant rate, a negative order is Michaelis-Menten with
/// half-saturation `limit`, any other order is `kb c^n` limited by `limit`
/// when that is non-zero.
pub fn bulk_rate(c: f64, kb: f64, order: f64, limit: f64) -> f64 {
    let term = if order == 0.0 {
        1.0
    } else if order < 0.0 {
        let mut c1 = limit + c;
        if c1.abs() < TINY {
            c1 = sgn(c1) * TINY;
        }
        c / c1
    } else {
        let c1 = if limit == 0.0 {
            c
        } else if kb > 0.0 {
            (limit - c).max(0.0)
        } else {
            (c - limit).max(0.0)
        };
        let term = if order == 1.0 {
            c1
        } else if order == 2.0 {
            c1 * c
        } else {
            c1 * c.max(0.0).powf(order - 1.0)
        };
        term.max(0.0)
    };
    kb * term
}

/// Wall reaction rate (concentration per second).
///
/// For first order `kf` is the apparent coefficient from
/// [`wall_coefficient`]; for zero order it is the mass transfer coefficient
/// and the rate is capped by the transfer of `c` to the wall.
pub fn wall_rate(c: f64, diameter: f64, kw: f64, kf: f64, order: f64) -> f64 {
    if kw == 0.0 || diameter == 0.0 {
        return 0.0;
    }
    if order == 0.0 {
        let transfer = sgn(kw) * c * kf;
        let rate = if transfer.abs() < kw.abs() { transfer } else { kw };
        rate * 4.0 / diameter
    } else {
        c * kf
    }
}

/// Mass transfer coefficient (ft/s) between bulk flow and pipe wall.
///
/// Sherwood number: 2 in stagnant flow, Notter-Sleicher when turbulent,
/// Graetz in laminar flow.
pub fn mass_transfer_coeff(q: f64, diameter: f64, length: f64, diffusivity: f64) -> f64 {
    if diameter <= 0.0 || diffusivity <= 0.0 {
        return 0.0;
    }
    let area = PI * diameter * diameter / 4.0;
    let re = q.abs() / area * diameter / VISCOSITY;
    let sc = VISCOSITY / diffusivity;
    let sh = if re < 1.0 {
        2.0
    } else if re >= 2300.0 {
        0.0149 * re.powf(0.88) * sc.powf(0.333)
    } else {
        let y = diameter / length.max(TINY) * re * sc;
        3.65 + 0.0668 * y / (1.0 + 0.04 * y.powf(0.667))
    };
    sh * diffusivity / diameter
}

/// Coefficient used by [`wall_rate`] for a pipe carrying `q`.
pub fn wall_coefficient(
    q: f64,
    diameter: f64,
    length: f64,
    kw: f64,
    order: f64,
    diffusivity: f64,
) -> f64 {
    if kw == 0.0 || diameter <= 0.0 {
        return 0.0;
    }
    let kf = mass_transfer_coeff(q, diameter, length, diffusivity);
    if order == 0.0 {
        return kf;
    }
    if kf <= 0.0 {
        // No diffusion limit: the wall reaction alone sets the rate.
        return 4.0 * kw / diameter;
    }
    4.0 / diameter * kw * kf / (kf + kw.abs())
}
