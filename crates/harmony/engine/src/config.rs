//! Configuration for the Harmony engine.
//!
//! Every value is an explicit field handed to constructors. Nothing here
//! reads process state; callers that want environment overrides pass the
//! pairs in, e.g. `config.with_overrides(std::env::vars())`.

use harmony_consent::AuditRetention;
use harmony_invariants::{InvariantError, LovesProofConfig, Window};
use harmony_safeguards::{
    DriftConfig, DriftError, DriftKind, EnforcerConfig, GuardConfig, SafeguardError,
    TrackerConfig,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::telemetry::TelemetryConfig;

/// Prefix of recognised override keys.
pub const OVERRIDE_PREFIX: &str = "HARMONY_";
const DRIFT_THRESHOLD_PREFIX: &str = "DRIFT_THRESHOLD_";

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("invalid invariant config: {0}")]
    Invariant(#[from] InvariantError),

    #[error("invalid boundary config: {0}")]
    Safeguard(#[from] SafeguardError),

    #[error("invalid drift config: {0}")]
    Drift(#[from] DriftError),
}

/// Main engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Decomposition and windowing
    #[serde(default)]
    pub signal: SignalConfig,

    /// Love's Proof thresholds
    #[serde(default)]
    pub invariant: InvariantConfig,

    /// Consent audit retention
    #[serde(default)]
    pub consent: ConsentConfig,

    /// Witness leakage and integrity thresholds
    #[serde(default)]
    pub boundary: BoundaryConfig,

    /// Drift thresholds and log size
    #[serde(default)]
    pub drift: DriftConfig,

    /// Log filter and format
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Decomposition and windowing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// EMA smoothing factor in (0, 1).
    pub alpha: f64,
    /// Trailing window width in time units; `None` evaluates whole series.
    pub window: Option<f64>,
    /// Step between windows for continuous evaluation; defaults to the
    /// window width.
    pub step: Option<f64>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            alpha: 0.02,
            window: None,
            step: None,
        }
    }
}

impl SignalConfig {
    pub fn window(&self) -> Window {
        self.window.map_or(Window::Full, Window::Trailing)
    }
}

/// Invariant evaluation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvariantConfig {
    pub epsilon: f64,
    pub min_samples: usize,
    pub power_segments: usize,
    pub tolerance: f64,
    pub require_dc_trend: bool,
}

impl Default for InvariantConfig {
    fn default() -> Self {
        let base = LovesProofConfig::default();
        Self {
            epsilon: base.epsilon,
            min_samples: base.min_samples,
            power_segments: base.power_segments,
            tolerance: base.tolerance,
            require_dc_trend: base.require_dc_trend,
        }
    }
}

/// Consent ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// Audit events kept in memory; `None` keeps all of them.
    pub audit_capacity: Option<usize>,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            audit_capacity: Some(10_000),
        }
    }
}

impl ConsentConfig {
    pub fn retention(&self) -> AuditRetention {
        self.audit_capacity
            .map_or(AuditRetention::Unbounded, AuditRetention::KeepLatest)
    }
}

/// Boundary tracking configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    /// Pre-flight limits on shares and couplings
    #[serde(default)]
    pub enforcer: EnforcerConfig,
}

impl EngineConfig {
    /// Parse a JSON document; missing sections and fields take defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Overlay `HARMONY_*` key/value pairs. Other keys are ignored.
    pub fn with_overrides<I, K, V>(mut self, pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            let Some(name) = key.strip_prefix(OVERRIDE_PREFIX) else {
                continue;
            };
            match name {
                "WINDOW" => self.signal.window = parse_optional(key, value)?,
                "STEP" => self.signal.step = parse_optional(key, value)?,
                "ALPHA" => self.signal.alpha = parse(key, value)?,
                "MIN_SAMPLES" => self.invariant.min_samples = parse(key, value)?,
                "EPSILON" => self.invariant.epsilon = parse(key, value)?,
                "AUDIT_CAPACITY" => self.consent.audit_capacity = parse_optional(key, value)?,
                "LOG" => self.telemetry.log_level = value.to_string(),
                _ => match name.strip_prefix(DRIFT_THRESHOLD_PREFIX) {
                    Some(metric) if !metric.is_empty() => {
                        let threshold: f64 = parse(key, value)?;
                        match metric.parse::<DriftKind>() {
                            Ok(DriftKind::Phase) => self.drift.phase_threshold = threshold,
                            Ok(DriftKind::Boundary) => self.drift.boundary_threshold = threshold,
                            Ok(DriftKind::Role) => self.drift.role_threshold = threshold,
                            Err(()) => {
                                self.drift
                                    .thresholds
                                    .insert(metric.to_ascii_lowercase(), threshold);
                            }
                        }
                    }
                    _ => {
                        debug!(key, "Ignoring unknown override");
                        continue;
                    }
                },
            }
            debug!(key, value, "Config override applied");
        }
        Ok(self)
    }

    /// The evaluator configuration assembled from the signal and invariant
    /// sections.
    pub fn loves_proof(&self) -> LovesProofConfig {
        LovesProofConfig {
            epsilon: self.invariant.epsilon,
            alpha: self.signal.alpha,
            min_samples: self.invariant.min_samples,
            power_segments: self.invariant.power_segments,
            tolerance: self.invariant.tolerance,
            require_dc_trend: self.invariant.require_dc_trend,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("window", self.signal.window), ("step", self.signal.step)] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(ConfigError::InvalidParameter { name, value: v });
                }
            }
        }
        if self.consent.audit_capacity == Some(0) {
            return Err(ConfigError::InvalidParameter {
                name: "audit_capacity",
                value: 0.0,
            });
        }
        self.loves_proof().validate()?;
        self.boundary.tracker.validate()?;
        self.boundary.guard.validate()?;
        self.boundary.enforcer.validate()?;
        self.drift.validate()?;
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// `none`, `full`, `unbounded` or an empty value clear the setting.
fn parse_optional<T: std::str::FromStr>(key: &str, value: &str) -> Result<Option<T>, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "" | "none" | "full" | "unbounded" => Ok(None),
        _ => parse(key, value).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.signal.window(), Window::Full);
        assert_eq!(config.consent.retention(), AuditRetention::KeepLatest(10_000));
        assert_eq!(config.loves_proof(), LovesProofConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(
            r#"{ "signal": { "window": 8.0 }, "drift": { "phase_threshold": 0.2 } }"#,
        )
        .unwrap();
        assert_eq!(config.signal.window, Some(8.0));
        assert_eq!(config.signal.alpha, 0.02);
        assert_eq!(config.drift.phase_threshold, 0.2);
        assert_eq!(config.drift.role_threshold, 0.5);
        assert_eq!(config.boundary.guard.min_integrity, 0.8);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::default()
            .with_overrides([
                ("HARMONY_WINDOW", "12.5"),
                ("HARMONY_ALPHA", "0.1"),
                ("HARMONY_MIN_SAMPLES", "6"),
                ("HARMONY_EPSILON", "1e-9"),
                ("HARMONY_AUDIT_CAPACITY", "unbounded"),
                ("HARMONY_DRIFT_THRESHOLD_PHASE", "0.3"),
                ("HARMONY_DRIFT_THRESHOLD_COHERENCE", "0.4"),
                ("HARMONY_SOMETHING_ELSE", "x"),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.signal.window, Some(12.5));
        assert_eq!(config.signal.alpha, 0.1);
        assert_eq!(config.invariant.min_samples, 6);
        assert_eq!(config.invariant.epsilon, 1e-9);
        assert_eq!(config.consent.retention(), AuditRetention::Unbounded);
        assert_eq!(config.drift.phase_threshold, 0.3);
        assert_eq!(config.drift.thresholds.get("coherence"), Some(&0.4));
    }

    #[test]
    fn test_bad_override_value() {
        let err = EngineConfig::default()
            .with_overrides([("HARMONY_ALPHA", "fast")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(err.to_string().contains("HARMONY_ALPHA"));
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        config.signal.alpha = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invariant(_))));

        let mut config = EngineConfig::default();
        config.signal.window = Some(0.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "window", .. })
        ));

        let mut config = EngineConfig::default();
        config.invariant.min_samples = 1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.drift.role_threshold = -0.1;
        assert!(matches!(config.validate(), Err(ConfigError::Drift(_))));

        let mut config = EngineConfig::default();
        config.boundary.tracker.leakage_weight = 2.0;
        assert!(matches!(config.validate(), Err(ConfigError::Safeguard(_))));

        let mut config = EngineConfig::default();
        config.boundary.enforcer.max_shares = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Safeguard(_))));
    }
}
