use crate::WnError;

/// Floating point type used throughout the system.
pub type Real = f64;

/// Absolute/relative tolerance pair.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, WnError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(WnError::NonFinite { what, value: v })
    }
}

/// Round half away from zero to the nearest whole second.
pub fn round_seconds(x: Real) -> i64 {
    if x >= 0.0 {
        (x + 0.5) as i64
    } else {
        (x - 0.5) as i64
    }
}

/// Sign of `x` with `sgn(0) == 1`.
pub fn sgn(x: Real) -> Real {
    if x < 0.0 { -1.0 } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        assert!(format!("{err}").contains("Non-finite"));
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_seconds(1634.5), 1635);
        assert_eq!(round_seconds(1634.49), 1634);
        assert_eq!(round_seconds(-2.5), -3);
        assert_eq!(sgn(0.0), 1.0);
        assert_eq!(sgn(-3.0), -1.0);
    }

    proptest::proptest! {
        #[test]
        fn rounding_stays_within_half_a_second(x in -1.0e9f64..1.0e9) {
            let r = round_seconds(x) as f64;
            proptest::prop_assert!((r - x).abs() <= 0.5 + 1e-9);
            proptest::prop_assert_eq!(round_seconds(-x), -round_seconds(x));
        }
    }
}
