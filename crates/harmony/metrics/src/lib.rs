//! # harmony-metrics
//!
//! Domain signals turned into the two normalized quantities the invariants
//! consume:
//!
//! - **Coherence** C(t) in [0, 1]: order or alignment.
//! - **Stress** S(t) in [0, 1]: pressure or instability.
//!
//! Every adapter implements [`CoherenceMetric`] or [`StressMetric`] and
//! declares the canonical definition it computes, so a verdict can always be
//! traced back to the formula that produced its inputs.

#![deny(unsafe_code)]

pub mod coherence;
pub mod definitions;
pub mod error;
pub mod stress;

pub use coherence::{
    kuramoto_order, phase_concentration, spectral_concentration, spectral_concentration_with,
    CoherenceMetric, CompressionGain, KuramotoOrder, Losses, PhaseConcentration,
    SpectralConcentration,
};
pub use definitions::{CoherenceDefinition, StressDefinition};
pub use error::MetricError;
pub use stress::{
    CompositePhysiological, PhysiologicalSignals, PredictionError, Predictions, StressMetric,
    VelocityEnergy,
};
