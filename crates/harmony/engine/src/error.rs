use harmony_consent::LedgerError;
use harmony_invariants::InvariantError;
use harmony_safeguards::{DriftError, SafeguardError};
use harmony_types::SeriesError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the engine facade.
///
/// Consent denial is not among them; gated calls return `Ok(None)`.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Invariant(#[from] InvariantError),

    #[error(transparent)]
    Safeguard(#[from] SafeguardError),

    #[error(transparent)]
    Drift(#[from] DriftError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("tracing setup failed: {0}")]
    Telemetry(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
