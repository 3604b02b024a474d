//! Core traits and shared types for link models.

use wn_core::constants::CBIG;
use wn_model::HeadlossFormula;

/// Linearized contribution of one element to the nodal equations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkCoeffs {
    /// Inverse head loss derivative, `1 / |dh/dq|`.
    pub inv_headloss: f64,
    /// Flow correction term; follows the sign of the flow.
    pub flow_correction: f64,
}

impl LinkCoeffs {
    /// A closed link: negligible conductance, its whole flow corrected away.
    pub fn closed(q: f64) -> Self {
        Self {
            inv_headloss: 1.0 / CBIG,
            flow_correction: q,
        }
    }
}

/// Physical pipe parameters in internal units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipeGeometry {
    /// Length (ft).
    pub length: f64,
    /// Inside diameter (ft).
    pub diameter: f64,
    /// Hazen-Williams C, Darcy-Weisbach roughness height (ft) or Manning n.
    pub roughness: f64,
}

/// Head loss law of a pipe: `h = f(q) * r * |q|^exponent + km * q^2`.
pub trait HeadlossModel: Send + Sync + std::fmt::Debug {
    fn formula(&self) -> HeadlossFormula;

    /// Flow exponent of the friction term.
    fn exponent(&self) -> f64;

    /// Flow-independent resistance coefficient of a pipe.
    fn resistance(&self, pipe: &PipeGeometry) -> f64;

    /// Flow-dependent friction multiplier applied to the resistance (1 for
    /// formulas with a fixed coefficient).
    fn friction_factor(&self, _q: f64, _pipe: &PipeGeometry) -> f64 {
        1.0
    }

    /// Coefficients of an open pipe carrying flow `q`.
    ///
    /// `km` is the minor loss coefficient in head-per-flow-squared form.
    fn coeffs(
        &self,
        q: f64,
        resistance: f64,
        km: f64,
        pipe: &PipeGeometry,
        rq_tol: f64,
    ) -> LinkCoeffs {
        let hexp = self.exponent();
        let qa = q.abs();
        let f = self.friction_factor(q, pipe);
        if let Some(c) = low_flow(q, f * resistance + km, hexp, rq_tol) {
            return c;
        }
        let hpipe = resistance * qa.powf(hexp);
        let hml = if km > 0.0 { km * qa * qa } else { 0.0 };
        let p = q / (hexp * hpipe + 2.0 * hml);
        LinkCoeffs {
            inv_headloss: p.abs(),
            flow_correction: p * (hpipe + hml),
        }
    }
}

/// Small-flow branch shared by every formula: once the total resistance times
/// the flow drops below `rq_tol`, the conductance is pinned at `1 / rq_tol`.
pub(crate) fn low_flow(q: f64, r1: f64, hexp: f64, rq_tol: f64) -> Option<LinkCoeffs> {
    if r1 * q.abs() < rq_tol {
        Some(LinkCoeffs {
            inv_headloss: 1.0 / rq_tol,
            flow_correction: q / hexp,
        })
    } else {
        None
    }
}
