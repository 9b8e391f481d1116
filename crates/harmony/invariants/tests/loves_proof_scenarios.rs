//! End-to-end behaviour of the Love's Proof evaluator.

use std::f64::consts::PI;

use harmony_invariants::{LovesProofEvaluator, ReasonCode, Verdict, Window};
use harmony_types::TimeSeries;
use proptest::prelude::*;

fn uniform(values: Vec<f64>, step: f64) -> TimeSeries {
    TimeSeries::uniform(0.0, step, values).unwrap()
}

fn evaluate(c: Vec<f64>, s: Vec<f64>, x: Vec<f64>, step: f64) -> Verdict {
    LovesProofEvaluator::default()
        .evaluate(&uniform(c, step), &uniform(s, step), &uniform(x, step), Window::Full)
        .unwrap()
}

// ----------------------------------------------------------------------------
// Documented scenarios
// ----------------------------------------------------------------------------

#[test]
fn rising_coherence_falling_stress_quiet_carrier_holds() {
    let v = evaluate(
        vec![0.3, 0.4, 0.5, 0.6],
        vec![0.8, 0.6, 0.4, 0.2],
        vec![2.0; 4],
        1.0,
    );
    assert!(v.holds);
    assert!(v.p_slope.abs() < 1e-12);
}

#[test]
fn growing_oscillation_does_not_hold() {
    let v = evaluate(
        vec![0.3, 0.4, 0.5, 0.6],
        vec![0.8, 0.6, 0.4, 0.2],
        vec![0.0, 5.0, -5.0, 5.0],
        1.0,
    );
    assert!(!v.holds);
    assert_eq!(v.reason, Some(ReasonCode::ReactivePowerIncreasing));
}

#[test]
fn record_is_flat_and_complete() {
    let v = evaluate(
        vec![0.0, 0.4, 0.5, 0.6],
        vec![0.8, 0.6, 0.4, 0.2],
        vec![2.0; 4],
        1.0,
    );
    let record = v.to_record();
    assert_eq!(record["clamped_C"], true);
    assert_eq!(record["samples"], 4);
    assert!(record["G_mean"].is_number());
}

// ----------------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------------

proptest! {
    /// Sufficiency is not necessity: coherence rising while the carrier's
    /// oscillation grows never passes.
    #[test]
    fn oscillatory_forcing_never_holds(
        c0 in 0.05f64..0.4,
        dc in 0.0005f64..0.002,
        growth in 0.2f64..2.0,
        freq in 0.5f64..2.0,
    ) {
        let n = 200;
        let step = 0.1;
        let c: Vec<f64> = (0..n).map(|i| c0 + dc * i as f64).collect();
        let s: Vec<f64> = (0..n).map(|i| 0.9 - 0.002 * i as f64).collect();
        let x: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 * step;
                (1.0 + growth * t) * (2.0 * PI * freq * t).sin()
            })
            .collect();
        let v = evaluate(c, s, x, step);
        prop_assert!(v.g_mean > 0.0);
        prop_assert!(!v.holds);
        prop_assert!(v.violations().contains(&ReasonCode::ReactivePowerIncreasing));
    }

    /// Any zero in the coherence window is surfaced.
    #[test]
    fn zero_coherence_always_clamped(
        mut c in prop::collection::vec(0.01f64..1.0, 4..40),
        at in any::<prop::sample::Index>(),
    ) {
        let i = at.index(c.len());
        c[i] = 0.0;
        let n = c.len();
        let v = evaluate(c, vec![0.5; n], vec![1.0; n], 1.0);
        prop_assert!(v.clamped_c);
    }

    /// Flat stress is a tie and fails, whatever coherence does.
    #[test]
    fn flat_stress_never_holds(
        c in prop::collection::vec(0.01f64..1.0, 4..40),
        level in 0.0f64..1.0,
    ) {
        let n = c.len();
        let v = evaluate(c, vec![level; n], vec![1.0; n], 1.0);
        prop_assert!(!v.holds);
        prop_assert!(v.violations().contains(&ReasonCode::StressNotDecreasing));
    }
}
