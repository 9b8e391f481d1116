//! # harmony-consent
//!
//! Binary, explicit, revocable consent between entities.
//!
//! - Absence of consent is denial.
//! - The latest decision for a (grantor, grantee, action) triple wins.
//! - Consent never chains. Indirect flow needs its own `indirect-share`
//!   record and is decided in one place, [`ConsentLedger::propagate_indirect`].
//! - Every decision is appended to an audit trail; a bounded in-memory log
//!   can forward entries to an [`AuditSink`] before evicting them.

#![deny(unsafe_code)]

pub mod error;
pub mod ledger;
pub mod record;
pub mod shared;
pub mod sink;

pub use error::LedgerError;
pub use ledger::{AuditRetention, ConsentCheck, ConsentLedger};
pub use record::{ConsentEvent, ConsentStatus, Transition};
pub use shared::SharedConsentLedger;
pub use sink::{AuditSink, MemoryAuditSink};
