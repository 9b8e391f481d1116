//! # harmony-signal
//!
//! Signal plumbing shared by every Harmony invariant:
//!
//! - **AC/DC decomposition**: exponential low-pass split of a series into a
//!   slow baseline (DC) and a fast residual (AC). Linear, and exactly
//!   reconstructing up to floating-point rounding.
//! - **Regression**: the single slope estimator (ordinary least squares
//!   against time) used for coherence growth, stress slope and
//!   reactive-power trend alike, so one verdict never mixes estimators.
//! - **Windowed statistics**: trailing windows measured in elapsed time,
//!   with an explicit "insufficient data" outcome instead of noisy
//!   estimates from too few samples.

#![deny(unsafe_code)]

pub mod acdc;
pub mod error;
pub mod regression;
pub mod window;

pub use acdc::{
    ac_power, decompose, decompose_values, ema_lowpass, Decomposition, SeriesDecomposition,
};
pub use error::SignalError;
pub use regression::{least_squares_slope, mean, trend, Trend};
pub use window::{reactive_power_trend, WindowOutcome, WindowStats, WindowedStatistics};
