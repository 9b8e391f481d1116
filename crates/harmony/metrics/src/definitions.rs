use serde::{Deserialize, Serialize};

/// Canonical coherence definitions. Every coherence value in the engine is
/// produced by exactly one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoherenceDefinition {
    /// Kuramoto order parameter `R(t) = |mean_k exp(i·φ_k(t))|`.
    KuramotoOrder,
    /// Phase concentration `|mean(exp(i·φ))|` over one phase series.
    PhaseConcentration,
    /// Share of spectral power within a band around a fundamental.
    SpectralConcentration,
    /// Predictive structure gain `1 − L_model / L_baseline`.
    CompressionGain,
}

/// Canonical stress definitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StressDefinition {
    /// Heart rate, electrodermal activity and inverted HRV, averaged.
    CompositePhysiological,
    /// Normalized absolute prediction error (surprise).
    PredictionError,
    /// Smoothed squared rate of change.
    VelocityEnergy,
}

impl CoherenceDefinition {
    pub fn formula(&self) -> &'static str {
        match self {
            Self::KuramotoOrder => "R(t) = |(1/N) sum_k exp(i phi_k(t))|",
            Self::PhaseConcentration => "C = |mean(exp(i phi))|",
            Self::SpectralConcentration => "C = P(f0 - bw .. f0 + bw) / P_total",
            Self::CompressionGain => "C = 1 - L_model / (L_baseline + eps)",
        }
    }
}

impl StressDefinition {
    pub fn formula(&self) -> &'static str {
        match self {
            Self::CompositePhysiological => "S = mean(hr_norm, eda_norm, 1 - hrv_norm)",
            Self::PredictionError => "S = |pred - target| / baseline_error",
            Self::VelocityEnergy => "S = smooth(diff(x)^2) / max",
        }
    }
}

impl std::fmt::Display for CoherenceDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KuramotoOrder => write!(f, "kuramoto_order"),
            Self::PhaseConcentration => write!(f, "phase_concentration"),
            Self::SpectralConcentration => write!(f, "spectral_concentration"),
            Self::CompressionGain => write!(f, "compression_gain"),
        }
    }
}

impl std::fmt::Display for StressDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompositePhysiological => write!(f, "composite_physiological"),
            Self::PredictionError => write!(f, "prediction_error"),
            Self::VelocityEnergy => write!(f, "velocity_energy"),
        }
    }
}
