//! Every adapter keeps its output inside [0, 1] and one value per step.

use harmony_metrics::{
    kuramoto_order, CoherenceMetric, CompositePhysiological, CompressionGain, Losses,
    PhaseConcentration, PhysiologicalSignals, PredictionError, Predictions, StressMetric,
    VelocityEnergy,
};
use proptest::prelude::*;

fn in_unit(values: &[f64]) -> bool {
    values.iter().all(|v| (0.0..=1.0).contains(v))
}

// ----------------------------------------------------------------------------
// Coherence
// ----------------------------------------------------------------------------

proptest! {
    /// Kuramoto order stays in [0, 1] for any number of oscillators.
    #[test]
    fn kuramoto_is_bounded(
        rows in (1usize..6, 1usize..32).prop_flat_map(|(n, t)| {
            prop::collection::vec(prop::collection::vec(-10.0f64..10.0, t), n)
        })
    ) {
        let steps = rows[0].len();
        let r = kuramoto_order(&rows).unwrap();
        prop_assert_eq!(r.len(), steps);
        prop_assert!(in_unit(&r));
    }

    #[test]
    fn phase_concentration_is_bounded(
        phases in prop::collection::vec(-10.0f64..10.0, 1..64),
        window in 1usize..16,
    ) {
        let c = PhaseConcentration { window }.coherence(&phases).unwrap();
        prop_assert_eq!(c.len(), phases.len());
        prop_assert!(in_unit(&c));
    }

    #[test]
    fn compression_gain_is_bounded(
        pairs in prop::collection::vec((0.0f64..10.0, 0.0f64..10.0), 1..64),
    ) {
        let (model, baseline): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let c = CompressionGain::default()
            .coherence(&Losses { model, baseline })
            .unwrap();
        prop_assert!(in_unit(&c));
    }
}

// ----------------------------------------------------------------------------
// Stress
// ----------------------------------------------------------------------------

proptest! {
    #[test]
    fn composite_stress_is_bounded(
        rows in prop::collection::vec((20.0f64..220.0, 0.0f64..20.0, 5.0f64..150.0), 1..64),
    ) {
        let heart_rate = rows.iter().map(|r| r.0).collect();
        let eda = Some(rows.iter().map(|r| r.1).collect());
        let hrv = Some(rows.iter().map(|r| r.2).collect());
        let s = CompositePhysiological
            .stress(&PhysiologicalSignals { heart_rate, eda, hrv })
            .unwrap();
        prop_assert_eq!(s.len(), rows.len());
        prop_assert!(in_unit(&s));
    }

    #[test]
    fn prediction_error_is_bounded(
        pairs in prop::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 1..64),
        baseline in prop::option::of(0.1f64..50.0),
    ) {
        let (predictions, targets): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let s = PredictionError { baseline_error: baseline }
            .stress(&Predictions { predictions, targets })
            .unwrap();
        prop_assert!(in_unit(&s));
    }

    /// Velocity energy peaks at exactly 1 whenever the signal moves.
    #[test]
    fn velocity_energy_is_normalized(
        signal in prop::collection::vec(-100.0f64..100.0, 2..64),
        window in 0usize..12,
    ) {
        let s = VelocityEnergy { window }.stress(&signal).unwrap();
        prop_assert_eq!(s.len(), signal.len());
        prop_assert!(in_unit(&s));
        let moves = signal.windows(2).any(|w| (w[1] - w[0]).abs() > 1e-3);
        if moves {
            let max = s.iter().copied().fold(0.0, f64::max);
            prop_assert!((max - 1.0).abs() < 1e-9);
        }
    }
}
