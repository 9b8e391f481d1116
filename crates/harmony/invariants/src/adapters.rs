//! Domain adapters: which canonical metrics feed C and S, and how the
//! influence carrier is derived, for each supported domain.

use harmony_metrics::{CoherenceDefinition, StressDefinition};
use harmony_types::TimeSeries;

use crate::error::InvariantError;
use crate::loves_proof::{LovesProofEvaluator, Window};
use crate::verdict::Verdict;

/// Directive phrases counted as linguistic push by default.
pub const DIRECTIVE_KEYWORDS: [&str; 5] = ["should", "must", "need to", "have to", "ought to"];

const AMPLITUDE_EPS: f64 = 1e-6;

/// The metric definitions a domain adapter declares for its inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdapterProfile {
    pub coherence: CoherenceDefinition,
    pub stress: StressDefinition,
    /// What the influence carrier `x` measures in this domain.
    pub carrier: &'static str,
}

/// A domain-specific front end to the Love's Proof evaluator.
pub trait DomainAdapter {
    fn profile(&self) -> AdapterProfile;

    fn evaluator(&self) -> &LovesProofEvaluator;

    /// Evaluate and tag the verdict with this adapter's definitions.
    fn check(
        &self,
        c: &TimeSeries,
        s: &TimeSeries,
        x: &TimeSeries,
        window: Window,
    ) -> Result<Verdict, InvariantError> {
        let profile = self.profile();
        Ok(self
            .evaluator()
            .evaluate(c, s, x, window)?
            .with_definitions(profile.coherence, profile.stress))
    }
}

/// Heart-field dynamics: spectral coherence against composite physiological
/// stress.
#[derive(Clone, Debug, Default)]
pub struct PhysiologyAdapter {
    evaluator: LovesProofEvaluator,
}

impl PhysiologyAdapter {
    pub fn new(evaluator: LovesProofEvaluator) -> Self {
        Self { evaluator }
    }

    /// The carrier is `influence` when given, otherwise the heart amplitude
    /// scaled to [0, 1), otherwise the stress series itself.
    pub fn check_heart_field(
        &self,
        coherence: &TimeSeries,
        stress: &TimeSeries,
        influence: Option<&TimeSeries>,
        heart_amplitude: Option<&TimeSeries>,
        window: Window,
    ) -> Result<Verdict, InvariantError> {
        let carrier = match (influence, heart_amplitude) {
            (Some(x), _) => x.clone(),
            (None, Some(amplitude)) => normalize_amplitude(amplitude)?,
            (None, None) => stress.clone(),
        };
        self.check(coherence, stress, &carrier, window)
    }

    /// Sliding evaluation with stress doubling as the carrier.
    pub fn check_continuous(
        &self,
        coherence: &TimeSeries,
        stress: &TimeSeries,
        width: f64,
        step: f64,
    ) -> Result<Vec<Verdict>, InvariantError> {
        let profile = self.profile();
        Ok(self
            .evaluator
            .evaluate_continuous(coherence, stress, stress, width, step)?
            .into_iter()
            .map(|v| v.with_definitions(profile.coherence, profile.stress))
            .collect())
    }
}

impl DomainAdapter for PhysiologyAdapter {
    fn profile(&self) -> AdapterProfile {
        AdapterProfile {
            coherence: CoherenceDefinition::SpectralConcentration,
            stress: StressDefinition::CompositePhysiological,
            carrier: "normalized heart amplitude",
        }
    }

    fn evaluator(&self) -> &LovesProofEvaluator {
        &self.evaluator
    }
}

fn normalize_amplitude(amplitude: &TimeSeries) -> Result<TimeSeries, InvariantError> {
    let values = amplitude.values();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(amplitude.map_values(|a| (a - min) / (max - min + AMPLITUDE_EPS))?)
}

/// Oscillator coupling: order parameter against mismatch energy, with the
/// applied coupling strength as carrier.
#[derive(Clone, Debug, Default)]
pub struct CouplingAdapter {
    evaluator: LovesProofEvaluator,
}

impl CouplingAdapter {
    pub fn new(evaluator: LovesProofEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn check_entrainment(
        &self,
        order_parameter: &TimeSeries,
        mismatch_energy: &TimeSeries,
        coupling_strength: &TimeSeries,
        window: Window,
    ) -> Result<Verdict, InvariantError> {
        self.check(order_parameter, mismatch_energy, coupling_strength, window)
    }

    pub fn check_consent_dynamics(
        &self,
        phase_concentration: &TimeSeries,
        receiver_resistance: &TimeSeries,
        applied_coupling: &TimeSeries,
        window: Window,
    ) -> Result<Verdict, InvariantError> {
        let verdict = self
            .evaluator
            .evaluate(phase_concentration, receiver_resistance, applied_coupling, window)?;
        Ok(verdict.with_definitions(
            CoherenceDefinition::PhaseConcentration,
            self.profile().stress,
        ))
    }
}

impl DomainAdapter for CouplingAdapter {
    fn profile(&self) -> AdapterProfile {
        AdapterProfile {
            coherence: CoherenceDefinition::KuramotoOrder,
            stress: StressDefinition::VelocityEnergy,
            carrier: "applied coupling strength",
        }
    }

    fn evaluator(&self) -> &LovesProofEvaluator {
        &self.evaluator
    }
}

/// Conversation: dialogue coherence against recipient resistance, with
/// directive-keyword density as carrier.
#[derive(Clone, Debug, Default)]
pub struct DialogueAdapter {
    evaluator: LovesProofEvaluator,
}

impl DialogueAdapter {
    pub fn new(evaluator: LovesProofEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn check_influence(
        &self,
        dialogue_coherence: &TimeSeries,
        recipient_resistance: &TimeSeries,
        linguistic_push: &TimeSeries,
        window: Window,
    ) -> Result<Verdict, InvariantError> {
        self.check(
            dialogue_coherence,
            recipient_resistance,
            linguistic_push,
            window,
        )
    }

    /// Directive phrases per word for each utterance. Matching is
    /// case-insensitive substring counting, so "musty" counts as "must".
    pub fn estimate_linguistic_push(&self, texts: &[&str], keywords: Option<&[&str]>) -> Vec<f64> {
        let keywords = keywords.unwrap_or(&DIRECTIVE_KEYWORDS);
        texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let directives: usize = keywords
                    .iter()
                    .filter(|k| !k.is_empty())
                    .map(|k| lower.matches(&k.to_lowercase()).count())
                    .sum();
                let words = text.split_whitespace().count().max(1);
                directives as f64 / words as f64
            })
            .collect()
    }
}

impl DomainAdapter for DialogueAdapter {
    fn profile(&self) -> AdapterProfile {
        AdapterProfile {
            coherence: CoherenceDefinition::CompressionGain,
            stress: StressDefinition::PredictionError,
            carrier: "directive keyword density",
        }
    }

    fn evaluator(&self) -> &LovesProofEvaluator {
        &self.evaluator
    }
}
