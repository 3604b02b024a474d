//! Newton iterations on single elements between two fixed heads.

use proptest::prelude::*;
use wn_components::{
    LinkCoeffs, PipeGeometry, PumpModel, emitter_coeffs, emitter_flow_change, headloss_model,
};
use wn_model::{Curve, HeadlossFormula};

/// Iterate `q -= y - p * dh` from `q0` until the update is negligible.
fn settle(mut q: f64, dh: f64, coeffs: impl Fn(f64) -> LinkCoeffs) -> (f64, usize) {
    for iter in 1..=100 {
        let c = coeffs(q);
        let dq = c.flow_correction - c.inv_headloss * dh;
        q -= dq;
        if dq.abs() < 1e-10 * (1.0 + q.abs()) {
            return (q, iter);
        }
    }
    (q, 100)
}

#[test]
fn hazen_williams_pipe_reaches_headloss_balance() {
    let model = headloss_model(HeadlossFormula::Hw);
    let pipe = PipeGeometry {
        length: 1000.0,
        diameter: 1.0,
        roughness: 100.0,
    };
    let r = model.resistance(&pipe);
    let dh = 5.0;
    let (q, iters) = settle(1.0, dh, |q| model.coeffs(q, r, 0.0, &pipe, 1e-7));
    assert!(iters < 100);
    assert!((r * q.powf(1.852) - dh).abs() < 1e-8);
}

#[test]
fn darcy_pipe_converges_in_reverse() {
    let model = headloss_model(HeadlossFormula::Dw);
    let pipe = PipeGeometry {
        length: 500.0,
        diameter: 0.5,
        roughness: 0.0005,
    };
    let r = model.resistance(&pipe);
    let (q, _) = settle(0.1, -3.0, |q| model.coeffs(q, r, 0.2, &pipe, 1e-7));
    assert!(q < 0.0);
    let f = model.friction_factor(q, &pipe);
    let h = (f * r + 0.2) * q * q;
    assert!((h - 3.0).abs() < 1e-6, "h = {h}");
}

#[test]
fn pump_finds_operating_point() {
    let pump = PumpModel::from_curve(&Curve {
        name: "P".into(),
        points: vec![(0.0, 200.0), (600.0, 160.0), (1200.0, 90.0)],
    })
    .unwrap();
    // pump lifting 130 ft: head loss across it is -130
    let (q, _) = settle(pump.initial_flow(), -130.0, |q| pump.coeffs(q, 1.0, 1e-7));
    assert!((pump.head_gain(q, 1.0) - 130.0).abs() < 1e-6);
    assert!(q > 600.0 && q < 1200.0);
}

#[test]
fn emitter_discharge() {
    let (ke, qexp, dh) = (2.0, 2.0, 8.0);
    let mut q = 1.0;
    for _ in 0..100 {
        q -= emitter_flow_change(ke, qexp, q, dh, 1e-7);
    }
    assert!((q - 2.0).abs() < 1e-9);
    assert!(emitter_coeffs(ke, qexp, q, 1e-7).inv_headloss > 0.0);
}

proptest! {
    #[test]
    fn conductance_is_positive_and_bounded(
        q in -50.0f64..50.0,
        length in 1.0f64..5000.0,
        diameter in 0.1f64..4.0,
    ) {
        for (formula, roughness) in [
            (HeadlossFormula::Hw, 110.0),
            (HeadlossFormula::Dw, 0.0005),
            (HeadlossFormula::Cm, 0.012),
        ] {
            let model = headloss_model(formula);
            let pipe = PipeGeometry { length, diameter, roughness };
            let r = model.resistance(&pipe);
            let c = model.coeffs(q, r, 0.0, &pipe, 1e-7);
            prop_assert!(c.inv_headloss > 0.0);
            prop_assert!(c.inv_headloss <= 1e7);
            prop_assert!(c.flow_correction.is_finite());
        }
    }
}
