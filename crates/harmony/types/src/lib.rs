//! Core type definitions for the Harmony ethical-invariant engine.
//!
//! This crate provides the shared vocabulary: entity and event identifiers,
//! consent actions, and validated time series. No business logic, just types.
//! Every Harmony crate depends on this crate.

#![deny(unsafe_code)]

pub mod ids;
pub mod series;

pub use ids::{Action, EntityId, EventId};
pub use series::{Sample, SeriesError, TimeSeries};
