use harmony_metrics::MetricError;
use harmony_signal::SignalError;
use harmony_types::SeriesError;
use thiserror::Error;

/// Errors from invariant evaluation.
///
/// A verdict that merely fails its conditions is not an error; these are
/// reserved for inputs the evaluator cannot compute over.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantError {
    #[error("invalid signal: {0}")]
    InvalidSignal(#[from] SignalError),

    #[error("series misaligned: {reason}")]
    SeriesAlignment { reason: String },

    #[error("insufficient history: {samples} samples, {required} required")]
    InsufficientHistory { samples: usize, required: usize },

    #[error("metric adapter failed: {0}")]
    Metric(#[from] MetricError),

    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

impl From<SeriesError> for InvariantError {
    fn from(err: SeriesError) -> Self {
        InvariantError::InvalidSignal(SignalError::InvalidSignal(err))
    }
}

impl InvariantError {
    pub(crate) fn misaligned(reason: impl Into<String>) -> Self {
        InvariantError::SeriesAlignment {
            reason: reason.into(),
        }
    }
}
