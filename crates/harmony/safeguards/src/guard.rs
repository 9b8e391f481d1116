use std::collections::VecDeque;

use harmony_signal::{trend, Trend};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SafeguardError;

/// Slopes below this magnitude count as a stable boundary.
const TREND_TOLERANCE: f64 = 0.001;

/// Thresholds for externally measured boundary integrity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Integrity below this is a hard violation.
    pub min_integrity: f64,
    /// Integrity below this raises an early warning.
    pub alert_threshold: f64,
    /// Largest drop between two readings tolerated without consent.
    pub max_degradation: f64,
    /// Readings kept for trend analysis.
    pub history_capacity: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            min_integrity: 0.8,
            alert_threshold: 0.85,
            max_degradation: 0.01,
            history_capacity: 1_000,
        }
    }
}

impl GuardConfig {
    pub fn validate(&self) -> Result<(), SafeguardError> {
        for (name, value) in [
            ("min_integrity", self.min_integrity),
            ("alert_threshold", self.alert_threshold),
            ("max_degradation", self.max_degradation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SafeguardError::InvalidParameter { name, value });
            }
        }
        if self.alert_threshold < self.min_integrity {
            return Err(SafeguardError::InvalidParameter {
                name: "alert_threshold",
                value: self.alert_threshold,
            });
        }
        Ok(())
    }
}

/// Result of one boundary check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardCheck {
    Safe,
    /// Still valid but approaching the minimum.
    Warning(String),
    /// Below the minimum, or degraded without consent.
    Blocked(String),
}

impl GuardCheck {
    pub fn is_safe(&self) -> bool {
        matches!(self, GuardCheck::Safe)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, GuardCheck::Blocked(_))
    }

    /// Valid means not blocked; warnings are valid.
    pub fn is_valid(&self) -> bool {
        !self.is_blocked()
    }
}

/// Watches a stream of boundary-integrity readings.
#[derive(Clone, Debug, Default)]
pub struct BoundaryGuard {
    config: GuardConfig,
    /// (integrity, consented) per reading, oldest first.
    history: VecDeque<(f64, bool)>,
    violations: Vec<String>,
}

impl BoundaryGuard {
    pub fn new(config: GuardConfig) -> Result<Self, SafeguardError> {
        config.validate()?;
        let history = VecDeque::with_capacity(config.history_capacity.min(1_024));
        Ok(Self {
            config,
            history,
            violations: Vec::new(),
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Check `current` against the minimum, against `previous` for
    /// unconsented degradation, and against the alert threshold, in that
    /// order.
    pub fn check(
        &mut self,
        current: f64,
        previous: Option<f64>,
        consent_for_change: bool,
    ) -> GuardCheck {
        if self.config.history_capacity > 0 {
            if self.history.len() == self.config.history_capacity {
                self.history.pop_front();
            }
            self.history.push_back((current, consent_for_change));
        }

        if current < self.config.min_integrity {
            let msg = format!(
                "boundary integrity {current:.4} below minimum {:.4}",
                self.config.min_integrity
            );
            warn!(%msg, "Boundary below minimum integrity");
            self.violations.push(msg.clone());
            return GuardCheck::Blocked(msg);
        }

        if let Some(previous) = previous {
            let degradation = previous - current;
            if degradation > self.config.max_degradation && !consent_for_change {
                let msg = format!(
                    "boundary degraded without consent ({previous:.4} -> {current:.4})"
                );
                warn!(%msg, degradation, "Boundary violation");
                self.violations.push(msg.clone());
                return GuardCheck::Blocked(msg);
            }
        }

        if current < self.config.alert_threshold {
            let msg = format!(
                "boundary integrity {current:.4} approaching threshold {:.4}",
                self.config.alert_threshold
            );
            debug!(%msg, "Boundary early warning");
            return GuardCheck::Warning(msg);
        }

        GuardCheck::Safe
    }

    /// Direction of the last `window` readings.
    pub fn trend(&self, window: usize) -> Trend {
        let skip = self.history.len().saturating_sub(window.max(2));
        let recent: Vec<f64> = self.history.iter().skip(skip).map(|(v, _)| *v).collect();
        trend(&recent, TREND_TOLERANCE)
    }

    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().map(|(v, _)| *v)
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn clear_violations(&mut self) {
        self.violations.clear();
    }
}

/// Limits for [`BoundaryEnforcer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcerConfig {
    /// Estimated integrity must stay at or above this.
    pub min_boundary: f64,
    /// Concurrent shares allowed per entity.
    pub max_shares: usize,
    /// Strongest coupling an entity may accept.
    pub max_coupling: f64,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            min_boundary: 0.8,
            max_shares: 5,
            max_coupling: 0.5,
        }
    }
}

impl EnforcerConfig {
    pub fn validate(&self) -> Result<(), SafeguardError> {
        if !(0.0..=1.0).contains(&self.min_boundary) {
            return Err(SafeguardError::InvalidParameter {
                name: "min_boundary",
                value: self.min_boundary,
            });
        }
        if self.max_shares == 0 {
            return Err(SafeguardError::InvalidParameter {
                name: "max_shares",
                value: 0.0,
            });
        }
        if !(self.max_coupling.is_finite() && self.max_coupling > 0.0) {
            return Err(SafeguardError::InvalidParameter {
                name: "max_coupling",
                value: self.max_coupling,
            });
        }
        Ok(())
    }
}

/// Pre-flight checks that refuse a share or coupling whose estimated
/// effect would take boundary integrity below the minimum.
///
/// Estimates are heuristic: each share costs up to a tenth of the current
/// integrity, a coupling at the maximum strength costs half.
#[derive(Clone, Debug, Default)]
pub struct BoundaryEnforcer {
    config: EnforcerConfig,
}

impl BoundaryEnforcer {
    pub fn new(config: EnforcerConfig) -> Result<Self, SafeguardError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    /// Integrity after one more share on top of `current_shares`.
    pub fn estimate_after_share(&self, current: f64, current_shares: usize) -> f64 {
        let load = (current_shares + 1) as f64 / self.config.max_shares as f64;
        current * (1.0 - 0.1 * load)
    }

    /// Integrity after accepting a coupling of `strength`.
    pub fn estimate_after_coupling(&self, current: f64, strength: f64) -> f64 {
        current * (1.0 - 0.5 * strength / self.config.max_coupling)
    }

    pub fn can_share_state(
        &self,
        current: f64,
        current_shares: usize,
    ) -> Result<GuardCheck, SafeguardError> {
        check_unit("current", current)?;
        if let Some(reason) = self.below_minimum(current) {
            return Ok(refuse(reason));
        }
        if current_shares >= self.config.max_shares {
            return Ok(refuse(format!(
                "maximum shares ({}) reached",
                self.config.max_shares
            )));
        }
        let estimated = self.estimate_after_share(current, current_shares);
        if estimated < self.config.min_boundary {
            return Ok(refuse(format!(
                "share would take boundary to {estimated:.4}, below minimum {:.4}",
                self.config.min_boundary
            )));
        }
        Ok(GuardCheck::Safe)
    }

    pub fn can_accept_coupling(
        &self,
        current: f64,
        strength: f64,
    ) -> Result<GuardCheck, SafeguardError> {
        check_unit("current", current)?;
        if !(strength.is_finite() && strength >= 0.0) {
            return Err(SafeguardError::InvalidParameter {
                name: "coupling_strength",
                value: strength,
            });
        }
        if let Some(reason) = self.below_minimum(current) {
            return Ok(refuse(reason));
        }
        if strength > self.config.max_coupling {
            return Ok(refuse(format!(
                "coupling strength {strength:.4} exceeds max {:.4}",
                self.config.max_coupling
            )));
        }
        let estimated = self.estimate_after_coupling(current, strength);
        if estimated < self.config.min_boundary {
            return Ok(refuse(format!(
                "coupling would take boundary to {estimated:.4}, below minimum {:.4}",
                self.config.min_boundary
            )));
        }
        Ok(GuardCheck::Safe)
    }

    fn below_minimum(&self, current: f64) -> Option<String> {
        (current < self.config.min_boundary).then(|| {
            format!(
                "boundary {current:.4} already below minimum {:.4}",
                self.config.min_boundary
            )
        })
    }
}

fn refuse(reason: String) -> GuardCheck {
    debug!(%reason, "Boundary pre-flight refused");
    GuardCheck::Blocked(reason)
}

fn check_unit(name: &'static str, value: f64) -> Result<(), SafeguardError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SafeguardError::InvalidParameter { name, value })
    }
}
