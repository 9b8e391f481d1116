use harmony_types::EntityId;
use thiserror::Error;

/// Errors from the boundary tracker and guard.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SafeguardError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    #[error("entity {0} is already registered")]
    AlreadyRegistered(EntityId),

    #[error("state of {0} must be non-empty and finite")]
    InvalidState(EntityId),

    #[error("state dimension mismatch for {entity}: expected {expected}, got {actual}")]
    DimensionMismatch {
        entity: EntityId,
        expected: usize,
        actual: usize,
    },

    #[error("projection dimension {projection_dim} must be between 1 and {state_dim} exclusive")]
    InvalidProjection {
        projection_dim: usize,
        state_dim: usize,
    },

    #[error("declared projection has {declared} rows but {requested} were requested")]
    ProjectionMismatch { declared: usize, requested: usize },

    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Errors from drift comparison.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriftError {
    #[error("no baseline set for metric {0}")]
    MissingBaseline(String),

    #[error("metric {metric} expects a {expected} value")]
    KindMismatch {
        metric: String,
        expected: &'static str,
    },

    #[error("vector length mismatch for {metric}: baseline {baseline}, current {current}")]
    LengthMismatch {
        metric: String,
        baseline: usize,
        current: usize,
    },

    #[error("non-finite value for metric {0}")]
    NonFinite(String),

    #[error("invalid threshold for {metric}: {value}")]
    InvalidThreshold { metric: String, value: f64 },
}
