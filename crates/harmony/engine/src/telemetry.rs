//! Tracing initialization

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::EngineError;

/// Configuration for tracing initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter directives, e.g. `info` or `harmony_safeguards=debug`.
    pub log_level: String,

    /// Include the event target in each line
    pub with_target: bool,

    /// Colored output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            with_target: true,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

/// Install a global `fmt` subscriber filtered by `config.log_level`.
///
/// Returns `Ok(false)` when a global subscriber is already installed, so
/// calling this more than once is harmless. Never called by the engine
/// itself.
pub fn init_tracing(config: &TelemetryConfig) -> Result<bool, EngineError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| EngineError::Telemetry(format!("{}: {e}", config.log_level)))?;

    let fmt_layer = fmt::layer()
        .with_target(config.with_target)
        .with_ansi(config.ansi);

    Ok(tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok())
}
