//! # harmony-engine
//!
//! Wires the Harmony crates into one session-scoped [`Engine`]:
//!
//! - a consent ledger behind a writer lock,
//! - a boundary tracker that only lets entities see each other through
//!   consent-gated witness projections,
//! - the Love's Proof evaluator, reachable on another entity's behalf only
//!   with an `analyze` grant,
//! - drift detection against caller-set baselines, with a bounded event log.
//!
//! Configuration is an explicit [`EngineConfig`] value. Tracing is opt-in via
//! [`init_tracing`]; the engine never installs a subscriber itself.

#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod telemetry;

pub use config::{
    BoundaryConfig, ConfigError, ConsentConfig, EngineConfig, InvariantConfig, SignalConfig,
};
pub use engine::{BoundaryReport, Engine};
pub use error::{EngineError, EngineResult};
pub use telemetry::{init_tracing, TelemetryConfig};

// Re-export the vocabulary callers need alongside the engine.
pub use harmony_invariants::{ReasonCode, Verdict, Window};
pub use harmony_safeguards::{DriftEvent, DriftKind, GuardCheck, MetricValue};
pub use harmony_signal::Trend;
pub use harmony_types::{Action, EntityId, TimeSeries};
