//! Valve coefficients for valves that are not regulating pressure or flow.
//!
//! PRV, PSV and FCV in their active state are assembled directly into the
//! nodal equations by the engine; these functions cover every other case.

use wn_core::constants::{CBIG, MINOR_LOSS_FACTOR, TINY};
use wn_core::sgn;
use wn_model::Curve;

use crate::traits::LinkCoeffs;

/// Open valve with minor loss coefficient `km` (zero loss when `km == 0`).
pub fn valve_coeffs(q: f64, km: f64, rq_tol: f64) -> LinkCoeffs {
    if km > 0.0 {
        let p = (2.0 * km * q.abs()).max(rq_tol);
        LinkCoeffs {
            inv_headloss: 1.0 / p,
            flow_correction: q / 2.0,
        }
    } else {
        LinkCoeffs {
            inv_headloss: 1.0 / rq_tol,
            flow_correction: q,
        }
    }
}

/// Throttle control valve: an active setting is a loss coefficient that
/// replaces the valve's own minor loss.
pub fn tcv_coeffs(q: f64, setting: Option<f64>, diameter: f64, km: f64, rq_tol: f64) -> LinkCoeffs {
    let km = match setting {
        Some(k) => MINOR_LOSS_FACTOR * k / diameter.powi(4),
        None => km,
    };
    valve_coeffs(q, km, rq_tol)
}

/// Pressure breaker valve: forces a head loss equal to its setting unless the
/// valve's own minor loss already exceeds it.
pub fn pbv_coeffs(q: f64, setting: Option<f64>, km: f64, rq_tol: f64) -> LinkCoeffs {
    match setting {
        Some(h) if h != 0.0 && km * q * q <= h => LinkCoeffs {
            inv_headloss: CBIG,
            flow_correction: h * CBIG,
        },
        _ => valve_coeffs(q, km, rq_tol),
    }
}

/// General purpose valve following a head loss vs. flow curve.
pub fn gpv_coeffs(q: f64, curve: &Curve, rq_tol: f64) -> LinkCoeffs {
    let qa = q.abs().max(TINY);
    let (h0, r) = curve.segment(qa);
    let p = 1.0 / r.max(rq_tol);
    LinkCoeffs {
        inv_headloss: p,
        flow_correction: p * (h0 + r * qa) * sgn(q),
    }
}
