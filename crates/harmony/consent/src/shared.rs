use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use harmony_types::{Action, EntityId, EventId};
use tracing::error;

use crate::error::LedgerError;
use crate::ledger::{ConsentCheck, ConsentLedger};
use crate::record::{ConsentEvent, ConsentStatus};

/// A consent ledger shared across threads.
///
/// A single writer lock serializes transitions, so concurrent grant and
/// revoke on one triple land in a well-defined order. Readers proceed in
/// parallel.
#[derive(Clone, Debug, Default)]
pub struct SharedConsentLedger {
    inner: Arc<RwLock<ConsentLedger>>,
}

impl SharedConsentLedger {
    pub fn new(ledger: ConsentLedger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    /// Run `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&ConsentLedger) -> R) -> Result<R, LedgerError> {
        let guard = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(f(&guard))
    }

    /// Run `f` under the write lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut ConsentLedger) -> R) -> Result<R, LedgerError> {
        let mut guard = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(f(&mut guard))
    }

    pub fn grant(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
    ) -> Result<EventId, LedgerError> {
        self.write(|l| l.grant(grantor, grantee, action))
    }

    pub fn grant_at(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
        at: DateTime<Utc>,
    ) -> Result<EventId, LedgerError> {
        self.write(|l| l.grant_at(grantor, grantee, action, at))
    }

    pub fn deny(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
    ) -> Result<EventId, LedgerError> {
        self.write(|l| l.deny(grantor, grantee, action))
    }

    pub fn deny_at(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
        at: DateTime<Utc>,
    ) -> Result<EventId, LedgerError> {
        self.write(|l| l.deny_at(grantor, grantee, action, at))
    }

    pub fn revoke(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
    ) -> Result<EventId, LedgerError> {
        self.write(|l| l.revoke(grantor, grantee, action))
    }

    pub fn revoke_at(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
        at: DateTime<Utc>,
    ) -> Result<EventId, LedgerError> {
        self.write(|l| l.revoke_at(grantor, grantee, action, at))
    }

    pub fn check(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
    ) -> Result<bool, LedgerError> {
        self.read(|l| l.check(grantor, grantee, action))
    }

    pub fn status(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
    ) -> Result<ConsentStatus, LedgerError> {
        self.read(|l| l.status(grantor, grantee, action))
    }

    pub fn propagate_indirect(
        &self,
        from: &EntityId,
        via: &EntityId,
        to: &EntityId,
        action: &Action,
    ) -> Result<bool, LedgerError> {
        self.read(|l| l.propagate_indirect(from, via, to, action))
    }

    /// Snapshot of the retained audit trail.
    pub fn history(&self) -> Result<Vec<ConsentEvent>, LedgerError> {
        self.read(|l| l.history().cloned().collect())
    }

    pub fn audit_entity(&self, entity: &EntityId) -> Result<Vec<ConsentEvent>, LedgerError> {
        self.read(|l| l.audit_entity(entity).cloned().collect())
    }

    pub fn entities(&self) -> Result<BTreeSet<EntityId>, LedgerError> {
        self.read(|l| l.entities().clone())
    }
}

impl From<ConsentLedger> for SharedConsentLedger {
    fn from(ledger: ConsentLedger) -> Self {
        Self::new(ledger)
    }
}

impl ConsentCheck for SharedConsentLedger {
    /// A poisoned lock authorizes nothing.
    fn permits(&self, grantor: &EntityId, grantee: &EntityId, action: &Action) -> bool {
        match self.check(grantor, grantee, action) {
            Ok(granted) => granted,
            Err(err) => {
                error!(
                    error = %err,
                    grantor = %grantor,
                    grantee = %grantee,
                    "consent check failed closed"
                );
                false
            }
        }
    }
}
