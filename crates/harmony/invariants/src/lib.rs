//! # harmony-invariants
//!
//! Checks over measured dynamics. None of them act on what they measure;
//! each returns a structured finding.
//!
//! - **Love's Proof**: coherence grows, stress falls and the reactive power
//!   of the influence carrier does not rise. A sufficient condition for
//!   non-coercive influence; a failed verdict is inconclusive, never proof
//!   of coercion.
//! - **Domain adapters**: physiology, coupling and dialogue front ends that
//!   declare which canonical metrics feed the evaluator.
//! - **Growth bounds**: growth stays below a rate bound and saturates.
//! - **Consent lock**: influence requires the receiver to be able to lock to
//!   the driver with meaningful coupling.

#![deny(unsafe_code)]

pub mod adapters;
pub mod consent_lock;
pub mod error;
pub mod growth_bounds;
pub mod loves_proof;
pub mod verdict;

pub use adapters::{
    AdapterProfile, CouplingAdapter, DialogueAdapter, DomainAdapter, PhysiologyAdapter,
    DIRECTIVE_KEYWORDS,
};
pub use consent_lock::{ConsentLock, LockReport};
pub use error::InvariantError;
pub use growth_bounds::{GrowthBounds, GrowthLaw, GrowthReport};
pub use loves_proof::{LovesProofConfig, LovesProofEvaluator, Window};
pub use verdict::{ReasonCode, Verdict};
