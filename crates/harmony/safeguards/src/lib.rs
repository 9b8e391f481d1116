//! # harmony-safeguards
//!
//! Boundary protection and drift monitoring for Harmony entities.
//!
//! - [`BoundaryTracker`] owns each entity's state and boundary score and is
//!   the only channel through which one entity observes another. Every
//!   witness call checks `observe` consent first.
//! - Boundary scores never drop silently. A decrease needs consent; one
//!   without it is recorded as a [`BoundaryViolation`] and not applied.
//! - [`BoundaryGuard`] applies integrity thresholds to measured readings;
//!   [`BoundaryEnforcer`] refuses shares and couplings before they happen.
//! - [`check_drift`] and [`DriftDetector`] compare readings against
//!   caller-set baselines and never correct anything.

#![deny(unsafe_code)]

pub mod drift;
pub mod error;
pub mod guard;
pub mod projection;
pub mod tracker;

pub use drift::{
    check_drift, CoherenceTrend, DriftConfig, DriftDetector, DriftEvent, DriftKind, DriftLog,
    MetricValue,
};
pub use error::{DriftError, SafeguardError};
pub use guard::{BoundaryEnforcer, BoundaryGuard, EnforcerConfig, GuardCheck, GuardConfig};
pub use projection::{rank, Projection};
pub use tracker::{BoundaryTracker, BoundaryViolation, TrackerConfig};
