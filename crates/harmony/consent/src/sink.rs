use std::sync::{Arc, RwLock};

use crate::error::LedgerError;
use crate::record::ConsentEvent;

/// Receives every consent event before the in-memory log may evict it.
///
/// Persistence belongs to the sink's owner; the ledger only forwards.
pub trait AuditSink: Send + Sync {
    fn write(&self, event: &ConsentEvent) -> Result<(), LedgerError>;
}

impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    fn write(&self, event: &ConsentEvent) -> Result<(), LedgerError> {
        (**self).write(event)
    }
}

/// Unbounded in-memory sink, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: RwLock<Vec<ConsentEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Result<Vec<ConsentEvent>, LedgerError> {
        Ok(self
            .entries
            .read()
            .map_err(|_| LedgerError::LockPoisoned)?
            .clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn write(&self, event: &ConsentEvent) -> Result<(), LedgerError> {
        self.entries
            .write()
            .map_err(|_| LedgerError::LockPoisoned)?
            .push(event.clone());
        Ok(())
    }
}
