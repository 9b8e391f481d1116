//! End-to-end flows through the engine facade.

use harmony_consent::{ConsentLedger, SharedConsentLedger};
use harmony_engine::{
    Action, DriftKind, Engine, EngineConfig, EntityId, ReasonCode, TimeSeries,
};
use proptest::prelude::*;

fn series(values: &[f64]) -> TimeSeries {
    TimeSeries::uniform(0.0, 1.0, values.to_vec()).unwrap()
}

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

#[test]
fn session_lifecycle() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    let alice = EntityId::new("alice");
    let bob = EntityId::new("bob");
    engine.register(&bob, vec![0.5, -0.5, 0.25, 1.0]).unwrap();

    // Bob lets Alice observe him, then changes his mind.
    engine.grant(&bob, &alice, &Action::observe()).unwrap();
    assert!(engine.witness(&alice, &bob, 2).unwrap().is_some());
    engine.revoke(&bob, &alice, &Action::observe()).unwrap();
    assert!(engine.witness(&alice, &bob, 2).unwrap().is_none());

    // Alice never granted Bob anything.
    assert!(!engine.check(&alice, &bob, &Action::observe()).unwrap());

    assert!(engine.end_session(&bob));
    assert!(engine.boundary_score(&bob).is_none());
    // The audit trail outlives the session.
    assert_eq!(engine.ledger().audit_entity(&bob).unwrap().len(), 2);
}

#[test]
fn engines_share_one_ledger() {
    let ledger = SharedConsentLedger::new(ConsentLedger::new());
    let a = Engine::with_ledger(EngineConfig::default(), ledger.clone()).unwrap();
    let b = Engine::with_ledger(EngineConfig::default(), ledger).unwrap();
    let subject = EntityId::new("s");
    let analyst = EntityId::new("o");
    a.grant(&subject, &analyst, &Action::analyze()).unwrap();
    assert!(b.check(&subject, &analyst, &Action::analyze()).unwrap());
}

#[test]
fn zero_coherence_is_surfaced() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let verdict = engine
        .evaluate(
            &series(&[0.0, 0.2, 0.4, 0.6]),
            &series(&[0.8, 0.6, 0.4, 0.2]),
            &series(&[1.0; 4]),
        )
        .unwrap();
    assert!(verdict.clamped_c);
    let record = verdict.to_record();
    assert_eq!(record["clamped_C"], serde_json::Value::Bool(true));
}

#[test]
fn too_short_windows_are_errors_not_verdicts() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let err = engine
        .evaluate(&series(&[0.3, 0.4]), &series(&[0.8, 0.6]), &series(&[1.0, 1.0]))
        .unwrap_err();
    assert!(err.to_string().contains("insufficient history"));
}

#[test]
fn continuous_sweep_flags_short_windows() {
    let mut config = EngineConfig::default();
    config.signal.window = Some(1.0);
    let engine = Engine::new(config).unwrap();
    let o = EntityId::new("o");
    let s = EntityId::new("s");
    engine.grant(&s, &o, &Action::analyze()).unwrap();
    let verdicts = engine
        .evaluate_continuous_for(
            &o,
            &s,
            &series(&[0.3, 0.4, 0.5, 0.6]),
            &series(&[0.8, 0.6, 0.4, 0.2]),
            &series(&[1.0; 4]),
        )
        .unwrap()
        .unwrap();
    assert_eq!(verdicts.len(), 3);
    assert!(verdicts
        .iter()
        .all(|v| !v.holds && v.reason == Some(ReasonCode::InsufficientHistory)));
}

#[test]
fn overrides_reach_the_detector() {
    let config = EngineConfig::default()
        .with_overrides([("HARMONY_DRIFT_THRESHOLD_COHERENCE", "0.5")])
        .unwrap();
    let mut engine = Engine::new(config).unwrap();
    engine
        .set_baseline("coherence", DriftKind::Phase, 0.8)
        .unwrap();
    assert!(engine.check_drift("coherence", 0.4).unwrap().is_none());
    assert!(engine.check_drift("coherence", 0.2).unwrap().is_some());
}

#[test]
fn invalid_config_is_rejected() {
    let config = EngineConfig::from_json(r#"{ "signal": { "alpha": 0.0 } }"#).unwrap();
    assert!(Engine::new(config).is_err());
}

// ----------------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------------

proptest! {
    /// Drift checks never move the baseline, however many times they run.
    #[test]
    fn drift_checks_are_pure(baseline in 0.0f64..1.0, readings in prop::collection::vec(0.0f64..1.0, 1..30)) {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.set_baseline("coherence", DriftKind::Phase, baseline).unwrap();
        let mut crossings = 0;
        for r in &readings {
            if engine.check_drift("coherence", *r).unwrap().is_some() {
                crossings += 1;
            }
        }
        let expected = readings.iter().filter(|r| (*r - baseline).abs() > 0.1).count();
        prop_assert_eq!(crossings, expected);
        prop_assert_eq!(engine.drift_log().len(), expected);
    }
}
