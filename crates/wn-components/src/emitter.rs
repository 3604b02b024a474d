//! Emitters: pressure-dependent outflow `h - z = ke * q^qexp`.

use wn_core::constants::CSMALL;
use wn_core::sgn;

use crate::traits::LinkCoeffs;

/// Inverse derivative of `ke * |q|^qexp`, clamped at `1 / rq_tol`.
fn inverse_slope(ke: f64, qexp: f64, q: f64, rq_tol: f64) -> f64 {
    let p = qexp * ke * q.abs().powf(qexp - 1.0);
    if p < rq_tol { 1.0 / rq_tol } else { 1.0 / p }
}

/// Coefficients of an emitter treated as a link to a virtual reservoir at
/// the node's elevation. `qexp` is the head exponent (2 for an orifice).
pub fn emitter_coeffs(ke: f64, qexp: f64, q: f64, rq_tol: f64) -> LinkCoeffs {
    let ke = ke.max(CSMALL);
    let z = ke * q.abs().powf(qexp);
    let p = inverse_slope(ke, qexp, q, rq_tol);
    LinkCoeffs {
        inv_headloss: p,
        flow_correction: sgn(q) * z * p,
    }
}

/// Newton change in emitter flow for pressure head `dh = h - elevation`.
pub fn emitter_flow_change(ke: f64, qexp: f64, q: f64, dh: f64, rq_tol: f64) -> f64 {
    let ke = ke.max(CSMALL);
    let p = inverse_slope(ke, qexp, q, rq_tol);
    q / qexp - p * dh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitter_flow_change_vanishes_at_solution() {
        // h = 4 q^2 at q = 1.5 -> h = 9
        let dq = emitter_flow_change(4.0, 2.0, 1.5, 9.0, 1e-7);
        assert!(dq.abs() < 1e-12);
    }

    #[test]
    fn zero_flow_is_bounded() {
        let c = emitter_coeffs(4.0, 2.0, 0.0, 1e-7);
        assert_eq!(c.inv_headloss, 1e7);
        assert_eq!(c.flow_correction, 0.0);
    }

    #[test]
    fn coefficients_match_slope() {
        let c = emitter_coeffs(4.0, 2.0, 1.5, 1e-7);
        assert!((c.inv_headloss - 1.0 / 12.0).abs() < 1e-15);
        assert!((c.flow_correction - 9.0 / 12.0).abs() < 1e-12);
    }
}
