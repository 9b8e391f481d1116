use harmony_types::SeriesError;
use thiserror::Error;

/// Errors from signal decomposition and windowing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    /// Non-finite or empty input.
    #[error("invalid signal: {0}")]
    InvalidSignal(#[from] SeriesError),

    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

impl SignalError {
    pub(crate) fn parameter(name: &'static str, value: f64) -> Self {
        SignalError::InvalidParameter { name, value }
    }
}
