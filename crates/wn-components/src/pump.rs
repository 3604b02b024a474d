//! Pump models and head curve fitting.

use wn_core::constants::{BIG, HP_HEAD_FACTOR, TINY};
use wn_model::Curve;

use crate::error::{ComponentError, ComponentResult};
use crate::traits::LinkCoeffs;

/// Head-flow characteristic of a pump at full speed.
///
/// Internally the characteristic is written in head loss form,
/// `hloss = h0 + r * q^n`, so that a pump adds head `-(h0 + r q^n)`.
/// Relative speed `s` scales it as `s^2 h0 + r s^(2-n) q^n`.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpModel {
    /// Constant horsepower `hp`: head gain `8.814 hp / q`.
    ConstantPower { hp: f64 },
    /// Head gain `a + b q^c` fitted through the curve points.
    PowerFunction {
        h0: f64,
        r: f64,
        n: f64,
        hmax: f64,
        qmax: f64,
        q0: f64,
    },
    /// Piecewise linear curve with strictly decreasing heads.
    Custom {
        curve: Curve,
        hmax: f64,
        qmax: f64,
        q0: f64,
    },
}

impl PumpModel {
    pub fn constant_power(hp: f64) -> ComponentResult<Self> {
        if !(hp > 0.0) {
            return Err(ComponentError::InvalidArg {
                what: "pump power must be positive",
            });
        }
        Ok(PumpModel::ConstantPower { hp })
    }

    /// Classify and fit a head curve.
    ///
    /// One point, or three points starting at zero flow, give a power
    /// function; anything else is used piecewise.
    pub fn from_curve(curve: &Curve) -> ComponentResult<Self> {
        let pts = &curve.points;
        let bad = |reason| ComponentError::InvalidCurve {
            curve: curve.name.clone(),
            reason,
        };
        match pts.len() {
            0 => Err(bad("curve has no points")),
            1 => {
                let (q1, h1) = pts[0];
                power_function(1.33334 * h1, h1, 0.0, q1, 2.0 * q1)
                    .ok_or_else(|| bad("cannot fit power function"))
            }
            3 if pts[0].0 == 0.0 => {
                power_function(pts[0].1, pts[1].1, pts[2].1, pts[1].0, pts[2].0)
                    .ok_or_else(|| bad("cannot fit power function"))
            }
            n => {
                if pts.windows(2).any(|w| w[1].0 <= w[0].0) {
                    return Err(bad("flows must increase"));
                }
                if pts.windows(2).any(|w| w[1].1 >= w[0].1) {
                    return Err(bad("heads must decrease"));
                }
                let qmax = pts[n - 1].0;
                Ok(PumpModel::Custom {
                    curve: curve.clone(),
                    hmax: pts[0].1,
                    qmax,
                    q0: (pts[0].0 + qmax) / 2.0,
                })
            }
        }
    }

    pub fn is_constant_power(&self) -> bool {
        matches!(self, PumpModel::ConstantPower { .. })
    }

    /// Shutoff head at full speed.
    pub fn max_head(&self) -> f64 {
        match self {
            PumpModel::ConstantPower { .. } => BIG,
            PumpModel::PowerFunction { hmax, .. } | PumpModel::Custom { hmax, .. } => *hmax,
        }
    }

    /// Flow at zero head, full speed.
    pub fn max_flow(&self) -> f64 {
        match self {
            PumpModel::ConstantPower { .. } => BIG,
            PumpModel::PowerFunction { qmax, .. } | PumpModel::Custom { qmax, .. } => *qmax,
        }
    }

    /// Design flow used to start a run.
    pub fn initial_flow(&self) -> f64 {
        match self {
            PumpModel::ConstantPower { .. } => 1.0,
            PumpModel::PowerFunction { q0, .. } | PumpModel::Custom { q0, .. } => *q0,
        }
    }

    /// `(h0, r, n)` of the head loss form at flow magnitude `q` and speed `speed`.
    fn law(&self, q: f64, speed: f64) -> (f64, f64, f64) {
        match self {
            PumpModel::ConstantPower { hp } => (0.0, -HP_HEAD_FACTOR * hp, -1.0),
            PumpModel::PowerFunction { h0, r, n, .. } => (*h0, *r, *n),
            PumpModel::Custom { curve, .. } => {
                let (h0, r) = curve.segment(q / speed);
                (-h0, -r, 1.0)
            }
        }
    }

    /// Head added at flow `q` and relative speed `speed`.
    pub fn head_gain(&self, q: f64, speed: f64) -> f64 {
        let q = q.abs().max(TINY);
        let (h0, r, n) = self.law(q, speed);
        -(speed * speed * h0 + r * speed.powf(2.0 - n) * q.powf(n))
    }

    /// Coefficients of an open pump carrying `q` at relative speed `speed`.
    pub fn coeffs(&self, q: f64, speed: f64, rq_tol: f64) -> LinkCoeffs {
        if speed == 0.0 {
            return LinkCoeffs::closed(q);
        }
        let qa = q.abs().max(TINY);
        let (h0, r, n) = self.law(qa, speed);
        let h0 = speed * speed * h0;
        let mut r = r * speed.powf(2.0 - n);
        if n != 1.0 {
            r = n * r * qa.powf(n - 1.0);
        }
        let p = 1.0 / r.max(rq_tol);
        LinkCoeffs {
            inv_headloss: p,
            flow_correction: q / n + p * h0,
        }
    }
}

/// Fit `h = a + b q^c` through `(0, h0)`, `(q1, h1)`, `(q2, h2)`.
fn power_function(h0: f64, h1: f64, h2: f64, q1: f64, q2: f64) -> Option<PumpModel> {
    if h0 < TINY || h0 - h1 < TINY || h1 - h2 < TINY || q1 < TINY || q2 - q1 < TINY {
        return None;
    }
    let a = h0;
    let h4 = h0 - h1;
    let h5 = h0 - h2;
    let c = (h5 / h4).ln() / (q2 / q1).ln();
    if c <= 0.0 || c > 20.0 {
        return None;
    }
    let b = -h4 / q1.powf(c);
    if b >= 0.0 {
        return None;
    }
    Some(PumpModel::PowerFunction {
        h0: -a,
        r: -b,
        n: c,
        hmax: a,
        qmax: (-a / b).powf(1.0 / c),
        q0: q1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(points: &[(f64, f64)]) -> Curve {
        Curve {
            name: "C".into(),
            points: points.to_vec(),
        }
    }

    #[test]
    fn three_point_curve_passes_through_points() {
        let m = PumpModel::from_curve(&curve(&[(0.0, 200.0), (600.0, 160.0), (1200.0, 90.0)]))
            .unwrap();
        assert!(matches!(m, PumpModel::PowerFunction { .. }));
        assert!((m.head_gain(600.0, 1.0) - 160.0).abs() < 1e-9);
        assert!((m.head_gain(1200.0, 1.0) - 90.0).abs() < 1e-9);
        assert_eq!(m.max_head(), 200.0);
        assert_eq!(m.initial_flow(), 600.0);
        assert!(m.head_gain(m.max_flow(), 1.0).abs() < 1e-6);
    }

    #[test]
    fn single_point_curve() {
        let m = PumpModel::from_curve(&curve(&[(2.0, 100.0)])).unwrap();
        assert!((m.head_gain(2.0, 1.0) - 100.0).abs() < 1e-9);
        assert!((m.max_head() - 133.334).abs() < 1e-9);
        // shutoff at twice the design flow, up to the rounded 4/3 factor
        assert!(m.head_gain(4.0, 1.0).abs() < 0.01);
    }

    #[test]
    fn multi_point_curve_is_custom() {
        let m = PumpModel::from_curve(&curve(&[(1.0, 100.0), (2.0, 80.0), (3.0, 50.0), (4.0, 10.0)]))
            .unwrap();
        assert!(matches!(m, PumpModel::Custom { .. }));
        assert_eq!(m.initial_flow(), 2.5);
        assert!((m.head_gain(2.5, 1.0) - 65.0).abs() < 1e-9);
    }

    #[test]
    fn rising_curve_is_rejected() {
        let err = PumpModel::from_curve(&curve(&[(1.0, 10.0), (2.0, 20.0)])).unwrap_err();
        assert!(matches!(err, ComponentError::InvalidCurve { .. }));
        assert!(PumpModel::from_curve(&curve(&[(0.0, 10.0), (1.0, 12.0), (2.0, 5.0)])).is_err());
        assert!(PumpModel::constant_power(0.0).is_err());
    }

    #[test]
    fn speed_scales_affinity_laws() {
        let m = PumpModel::from_curve(&curve(&[(0.0, 200.0), (600.0, 160.0), (1200.0, 90.0)]))
            .unwrap();
        // h(s q, s) = s^2 h(q, 1)
        let s: f64 = 0.8;
        assert!((m.head_gain(s * 600.0, s) - s * s * 160.0).abs() < 1e-9);
    }

    #[test]
    fn coefficients_linearize_the_curve() {
        let m = PumpModel::from_curve(&curve(&[(0.0, 200.0), (600.0, 160.0), (1200.0, 90.0)]))
            .unwrap();
        let q = 600.0;
        let c = m.coeffs(q, 1.0, 1e-7);
        // no flow update when the head across the pump matches the curve
        let dh = -m.head_gain(q, 1.0);
        let dq = c.flow_correction - c.inv_headloss * dh;
        assert!(dq.abs() < 1e-9 * q, "dq = {dq}");
        assert!(c.inv_headloss > 0.0);
    }

    #[test]
    fn stopped_pump_is_closed() {
        let m = PumpModel::constant_power(10.0).unwrap();
        assert_eq!(m.coeffs(0.3, 0.0, 1e-7), LinkCoeffs::closed(0.3));
        assert!(m.is_constant_power());
        assert!((m.head_gain(1.0, 1.0) - HP_HEAD_FACTOR * 10.0).abs() < 1e-9);
    }
}
