//! Pipe head loss formulas.

use std::f64::consts::PI;

use wn_core::constants::VISCOSITY;
use wn_core::sgn;
use wn_model::HeadlossFormula;

use crate::traits::{HeadlossModel, LinkCoeffs, PipeGeometry, low_flow};

/// Gravitational acceleration (ft/s^2).
const GRAVITY: f64 = 32.2;

// Darcy-Weisbach friction factor constants. `w = Re * PI / 4`.
const A1: f64 = 3.14159265359e03; // 1000 PI
const A2: f64 = 1.57079632679e03; // 500 PI
const A3: f64 = 5.02654824574e01; // 16 PI
const A4: f64 = 6.28318530718; // 2 PI
const A8: f64 = 4.61841319859; // 5.74 (PI/4)^0.9
const A9: f64 = -8.68588963807e-01; // -2 / ln(10)
const AA: f64 = -1.5634601348; // -2 (0.9) 2 / ln(10)
const AB: f64 = 3.28895476345e-03; // 5.74 / 4000^0.9
const AC: f64 = AA * AB;

/// Hazen-Williams: `h = 4.727 L / (C^1.852 D^4.871) q^1.852`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HazenWilliams;

impl HeadlossModel for HazenWilliams {
    fn formula(&self) -> HeadlossFormula {
        HeadlossFormula::Hw
    }

    fn exponent(&self) -> f64 {
        1.852
    }

    fn resistance(&self, pipe: &PipeGeometry) -> f64 {
        4.727 * pipe.length / pipe.roughness.powf(1.852) / pipe.diameter.powf(4.871)
    }
}

/// Darcy-Weisbach with a flow-dependent friction factor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DarcyWeisbach;

impl HeadlossModel for DarcyWeisbach {
    fn formula(&self) -> HeadlossFormula {
        HeadlossFormula::Dw
    }

    fn exponent(&self) -> f64 {
        2.0
    }

    /// `L / (2 g D A^2)`; multiplied by the friction factor at each trial.
    fn resistance(&self, pipe: &PipeGeometry) -> f64 {
        let d = pipe.diameter;
        let area = PI * d * d / 4.0;
        pipe.length / 2.0 / GRAVITY / d / (area * area)
    }

    fn friction_factor(&self, q: f64, pipe: &PipeGeometry) -> f64 {
        friction(q, pipe).0
    }

    fn coeffs(
        &self,
        q: f64,
        resistance: f64,
        km: f64,
        pipe: &PipeGeometry,
        rq_tol: f64,
    ) -> LinkCoeffs {
        let (f, dfdq) = friction(q, pipe);
        let r1 = f * resistance + km;
        if let Some(c) = low_flow(q, r1, self.exponent(), rq_tol) {
            return c;
        }
        let qa = q.abs();
        let hloss = r1 * qa * qa;
        let hgrad = 2.0 * r1 * qa + dfdq * resistance * qa * qa;
        let p = 1.0 / hgrad;
        LinkCoeffs {
            inv_headloss: p,
            flow_correction: sgn(q) * hloss * p,
        }
    }
}

/// Darcy-Weisbach friction factor and its derivative with respect to |q|.
///
/// By flow regime:
/// - `w >= A1` (Re >= 4000): Swamee-Jain approximation of Colebrook-White
/// - `A2 < w < A1`: cubic interpolation of Dunlop
/// - `A4 < w <= A2`: Hagen-Poiseuille, `f = 64 / Re`
/// - otherwise: `f = 8`
fn friction(q: f64, pipe: &PipeGeometry) -> (f64, f64) {
    let q = q.abs();
    let s = VISCOSITY * pipe.diameter;
    let w = q / s;
    let rel_rough = pipe.roughness / (3.7 * pipe.diameter);
    if w >= A1 {
        let y1 = A8 / w.powf(0.9);
        let y2 = rel_rough + y1;
        let y3 = A9 * y2.ln();
        let f = 1.0 / (y3 * y3);
        (f, 1.8 * f * y1 * A9 / y2 / y3 / q)
    } else if w > A2 {
        let y2 = rel_rough + AB;
        let y3 = A9 * y2.ln();
        let fa = 1.0 / (y3 * y3);
        let fb = (2.0 + AC / (y2 * y3)) * fa;
        let r = w / A2;
        let x1 = 7.0 * fa - fb;
        let x2 = 0.128 - 17.0 * fa + 2.5 * fb;
        let x3 = -0.128 + 13.0 * fa - (fb + fb);
        let x4 = r * (0.032 - 3.0 * fa + 0.5 * fb);
        let f = x1 + r * (x2 + r * (x3 + x4));
        (f, (x2 + r * (2.0 * x3 + 3.0 * x4)) / s / A2)
    } else if w > A4 {
        let f = A3 * s / q;
        (f, -f / q)
    } else {
        (8.0, 0.0)
    }
}

/// Chezy-Manning: `h = (4n / (1.49 PI D^2))^2 (D/4)^-1.333 L q^2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChezyManning;

impl HeadlossModel for ChezyManning {
    fn formula(&self) -> HeadlossFormula {
        HeadlossFormula::Cm
    }

    fn exponent(&self) -> f64 {
        2.0
    }

    fn resistance(&self, pipe: &PipeGeometry) -> f64 {
        let d = pipe.diameter;
        let k = 4.0 * pipe.roughness / (1.49 * PI * d * d);
        k * k * (d / 4.0).powf(-1.333) * pipe.length
    }
}

static HAZEN_WILLIAMS: HazenWilliams = HazenWilliams;
static DARCY_WEISBACH: DarcyWeisbach = DarcyWeisbach;
static CHEZY_MANNING: ChezyManning = ChezyManning;

/// Model implementing `formula`.
pub fn headloss_model(formula: HeadlossFormula) -> &'static dyn HeadlossModel {
    match formula {
        HeadlossFormula::Hw => &HAZEN_WILLIAMS,
        HeadlossFormula::Dw => &DARCY_WEISBACH,
        HeadlossFormula::Cm => &CHEZY_MANNING,
    }
}
