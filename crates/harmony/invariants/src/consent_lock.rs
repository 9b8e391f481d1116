use serde::{Deserialize, Serialize};

/// Outcome of a resonance-lock consent check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockReport {
    pub granted: bool,
    /// `1 − Δω / K`, capped at 0.95; zero when not granted.
    pub lock_strength: f64,
    /// Frequency difference is below the coupling strength.
    pub can_lock: bool,
    /// Coupling strength exceeds the receiver's threshold.
    pub meaningful_coupling: bool,
    pub coupling_strength: f64,
    pub frequency_difference: f64,
    pub receiver_threshold: f64,
}

impl LockReport {
    pub fn violation(&self) -> Option<String> {
        if self.granted {
            return None;
        }
        let mut reasons = Vec::new();
        if !self.can_lock {
            reasons.push("frequency difference too large");
        }
        if !self.meaningful_coupling {
            reasons.push("coupling too weak");
        }
        Some(format!("consent denied: {}", reasons.join(" and ")))
    }
}

/// Influence needs mutual resonance: a receiver only locks to a driver it
/// can follow, and only when the coupling clears its threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentLock {
    pub default_threshold: f64,
    /// How strongly stress raises the threshold.
    pub sensitivity: f64,
}

const MAX_LOCK_STRENGTH: f64 = 0.95;
const MAX_THRESHOLD_FACTOR: f64 = 3.0;

impl Default for ConsentLock {
    fn default() -> Self {
        Self {
            default_threshold: 0.1,
            sensitivity: 0.5,
        }
    }
}

impl ConsentLock {
    pub fn check(
        &self,
        coupling_strength: f64,
        frequency_difference: f64,
        receiver_threshold: Option<f64>,
    ) -> LockReport {
        let receiver_threshold = receiver_threshold.unwrap_or(self.default_threshold);
        let can_lock = frequency_difference < coupling_strength;
        let meaningful_coupling = coupling_strength > receiver_threshold;
        let granted = can_lock && meaningful_coupling;
        let lock_strength = if granted {
            (1.0 - frequency_difference / coupling_strength).min(MAX_LOCK_STRENGTH)
        } else {
            0.0
        };
        LockReport {
            granted,
            lock_strength,
            can_lock,
            meaningful_coupling,
            coupling_strength,
            frequency_difference,
            receiver_threshold,
        }
    }

    /// Threshold raised by stress, never above three times the baseline.
    pub fn dynamic_threshold(&self, stress: f64, baseline: Option<f64>) -> f64 {
        let baseline = baseline.unwrap_or(self.default_threshold);
        (baseline * (1.0 + self.sensitivity * stress)).min(baseline * MAX_THRESHOLD_FACTOR)
    }
}
