use thiserror::Error;

/// Errors from metric adapters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("{what} is empty")]
    Empty { what: &'static str },

    #[error("shape mismatch: {left} has {left_len} samples, {right} has {right_len}")]
    ShapeMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    #[error("non-finite {what} at index {index}")]
    NonFinite { what: &'static str, index: usize },

    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

pub(crate) fn check_finite(what: &'static str, values: &[f64]) -> Result<(), MetricError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(MetricError::NonFinite { what, index }),
        None => Ok(()),
    }
}

pub(crate) fn check_same_len(
    left: &'static str,
    left_len: usize,
    right: &'static str,
    right_len: usize,
) -> Result<(), MetricError> {
    if left_len == right_len {
        Ok(())
    } else {
        Err(MetricError::ShapeMismatch {
            left,
            left_len,
            right,
            right_len,
        })
    }
}
