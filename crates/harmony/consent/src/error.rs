use thiserror::Error;

/// Errors from the consent ledger.
///
/// Denied consent is never an error; it is a `false` from the check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A writer panicked while holding the shared ledger.
    #[error("consent ledger lock poisoned")]
    LockPoisoned,

    #[error("audit sink failed: {0}")]
    Sink(String),
}
