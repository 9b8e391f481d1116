//! Drift detection: measurement only.
//!
//! A drift check compares a current reading against a baseline the caller
//! set explicitly. It never changes the baseline or the monitored entity,
//! and it reports every crossing without debouncing.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use harmony_signal::{trend, Trend};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::DriftError;

/// Coherence slopes below this magnitude count as stable.
const COHERENCE_TREND_TOLERANCE: f64 = 0.01;

/// What a drifting metric measures, which fixes how magnitude is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftKind {
    /// Absolute change of a scalar, e.g. coherence.
    Phase,
    /// Degradation of a scalar; improvements never drift.
    Boundary,
    /// Euclidean distance between state vectors.
    Role,
}

impl DriftKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phase => "phase",
            Self::Boundary => "boundary",
            Self::Role => "role",
        }
    }
}

impl std::fmt::Display for DriftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DriftKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "phase" => Ok(Self::Phase),
            "boundary" => Ok(Self::Boundary),
            "role" => Ok(Self::Role),
            _ => Err(()),
        }
    }
}

/// A reading of a monitored metric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl MetricValue {
    fn is_finite(&self) -> bool {
        match self {
            Self::Scalar(v) => v.is_finite(),
            Self::Vector(vs) => vs.iter().all(|v| v.is_finite()),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<f64>> for MetricValue {
    fn from(value: Vec<f64>) -> Self {
        Self::Vector(value)
    }
}

/// A threshold crossing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriftEvent {
    pub metric: String,
    pub kind: DriftKind,
    pub baseline: MetricValue,
    pub observed: MetricValue,
    pub magnitude: f64,
    pub threshold: f64,
    pub at: DateTime<Utc>,
}

/// Compare `current` against `baseline` and report an event when the
/// magnitude strictly exceeds `threshold`.
pub fn check_drift(
    metric: &str,
    kind: DriftKind,
    baseline: &MetricValue,
    current: &MetricValue,
    threshold: f64,
) -> Result<Option<DriftEvent>, DriftError> {
    if !(threshold.is_finite() && threshold >= 0.0) {
        return Err(DriftError::InvalidThreshold {
            metric: metric.to_string(),
            value: threshold,
        });
    }
    if !baseline.is_finite() || !current.is_finite() {
        return Err(DriftError::NonFinite(metric.to_string()));
    }

    let magnitude = match (kind, baseline, current) {
        (DriftKind::Phase, MetricValue::Scalar(b), MetricValue::Scalar(c)) => (c - b).abs(),
        (DriftKind::Boundary, MetricValue::Scalar(b), MetricValue::Scalar(c)) => b - c,
        (DriftKind::Role, MetricValue::Vector(b), MetricValue::Vector(c)) => {
            if b.len() != c.len() {
                return Err(DriftError::LengthMismatch {
                    metric: metric.to_string(),
                    baseline: b.len(),
                    current: c.len(),
                });
            }
            b.iter()
                .zip(c)
                .map(|(x, y)| (y - x).powi(2))
                .sum::<f64>()
                .sqrt()
        }
        (DriftKind::Role, _, _) => {
            return Err(DriftError::KindMismatch {
                metric: metric.to_string(),
                expected: "vector",
            })
        }
        _ => {
            return Err(DriftError::KindMismatch {
                metric: metric.to_string(),
                expected: "scalar",
            })
        }
    };

    if magnitude > threshold {
        warn!(metric, %kind, magnitude, threshold, "Drift detected");
        Ok(Some(DriftEvent {
            metric: metric.to_string(),
            kind,
            baseline: baseline.clone(),
            observed: current.clone(),
            magnitude,
            threshold,
            at: Utc::now(),
        }))
    } else {
        debug!(metric, %kind, magnitude, threshold, "Within drift threshold");
        Ok(None)
    }
}

/// Default thresholds per kind plus per-metric overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub phase_threshold: f64,
    pub boundary_threshold: f64,
    pub role_threshold: f64,
    /// Per-metric thresholds. Metric names match case-insensitively.
    pub thresholds: BTreeMap<String, f64>,
    /// Events kept by a [`DriftLog`].
    pub log_capacity: usize,
    /// Readings a [`CoherenceTrend`] fits its slope over.
    pub trend_window: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            phase_threshold: 0.1,
            boundary_threshold: 0.05,
            role_threshold: 0.5,
            thresholds: BTreeMap::new(),
            log_capacity: 1_024,
            trend_window: 10,
        }
    }
}

impl DriftConfig {
    pub fn validate(&self) -> Result<(), DriftError> {
        let defaults = [
            (DriftKind::Phase.as_str(), self.phase_threshold),
            (DriftKind::Boundary.as_str(), self.boundary_threshold),
            (DriftKind::Role.as_str(), self.role_threshold),
        ];
        for (metric, value) in defaults
            .into_iter()
            .chain(self.thresholds.iter().map(|(m, v)| (m.as_str(), *v)))
        {
            if !(value.is_finite() && value >= 0.0) {
                return Err(DriftError::InvalidThreshold {
                    metric: metric.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }

    pub fn default_threshold(&self, kind: DriftKind) -> f64 {
        match kind {
            DriftKind::Phase => self.phase_threshold,
            DriftKind::Boundary => self.boundary_threshold,
            DriftKind::Role => self.role_threshold,
        }
    }
}

#[derive(Clone, Debug)]
struct Baseline {
    kind: DriftKind,
    value: MetricValue,
}

/// Holds caller-set baselines and thresholds for named metrics.
#[derive(Clone, Debug, Default)]
pub struct DriftDetector {
    config: DriftConfig,
    baselines: BTreeMap<String, Baseline>,
}

impl DriftDetector {
    pub fn new(mut config: DriftConfig) -> Result<Self, DriftError> {
        config.validate()?;
        config.thresholds = config
            .thresholds
            .into_iter()
            .map(|(metric, value)| (metric.to_lowercase(), value))
            .collect();
        Ok(Self {
            config,
            baselines: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    pub fn set_baseline(
        &mut self,
        metric: &str,
        kind: DriftKind,
        value: MetricValue,
    ) -> Result<(), DriftError> {
        if !value.is_finite() {
            return Err(DriftError::NonFinite(metric.to_string()));
        }
        debug!(metric, %kind, "Drift baseline set");
        self.baselines
            .insert(metric.to_string(), Baseline { kind, value });
        Ok(())
    }

    pub fn baseline(&self, metric: &str) -> Option<&MetricValue> {
        self.baselines.get(metric).map(|b| &b.value)
    }

    /// Kind the baseline for `metric` was set with.
    pub fn kind(&self, metric: &str) -> Option<DriftKind> {
        self.baselines.get(metric).map(|b| b.kind)
    }

    pub fn clear_baseline(&mut self, metric: &str) -> bool {
        self.baselines.remove(metric).is_some()
    }

    pub fn set_threshold(&mut self, metric: &str, threshold: f64) -> Result<(), DriftError> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(DriftError::InvalidThreshold {
                metric: metric.to_string(),
                value: threshold,
            });
        }
        self.config.thresholds.insert(metric.to_lowercase(), threshold);
        Ok(())
    }

    /// The per-metric override, or the default for `kind`.
    pub fn threshold(&self, metric: &str, kind: DriftKind) -> f64 {
        self.config
            .thresholds
            .get(&metric.to_lowercase())
            .copied()
            .unwrap_or_else(|| self.config.default_threshold(kind))
    }

    /// Compare `current` against the stored baseline for `metric`.
    pub fn check(
        &self,
        metric: &str,
        current: &MetricValue,
    ) -> Result<Option<DriftEvent>, DriftError> {
        let baseline = self
            .baselines
            .get(metric)
            .ok_or_else(|| DriftError::MissingBaseline(metric.to_string()))?;
        check_drift(
            metric,
            baseline.kind,
            &baseline.value,
            current,
            self.threshold(metric, baseline.kind),
        )
    }
}

/// Direction of recent readings of one phase-coherence metric.
///
/// Keeps the last `window` readings and fits a least-squares slope over
/// them; slopes within 0.01 per reading are stable.
#[derive(Clone, Debug)]
pub struct CoherenceTrend {
    readings: VecDeque<f64>,
    window: usize,
}

impl Default for CoherenceTrend {
    fn default() -> Self {
        Self::new(DriftConfig::default().trend_window)
    }
}

impl CoherenceTrend {
    /// Windows shorter than two readings are widened to two.
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            readings: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Non-finite readings are skipped.
    pub fn record(&mut self, value: f64) {
        if !value.is_finite() {
            trace!(value, "Skipping non-finite coherence reading");
            return;
        }
        if self.readings.len() == self.window {
            self.readings.pop_front();
        }
        self.readings.push_back(value);
    }

    pub fn trend(&self) -> Trend {
        let recent: Vec<f64> = self.readings.iter().copied().collect();
        trend(&recent, COHERENCE_TREND_TOLERANCE)
    }

    pub fn readings(&self) -> impl Iterator<Item = f64> + '_ {
        self.readings.iter().copied()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

/// Bounded record of drift events, oldest evicted first.
#[derive(Clone, Debug)]
pub struct DriftLog {
    events: VecDeque<DriftEvent>,
    capacity: usize,
    dropped: u64,
}

impl Default for DriftLog {
    fn default() -> Self {
        Self::with_capacity(DriftConfig::default().log_capacity)
    }
}

impl DriftLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1_024)),
            capacity,
            dropped: 0,
        }
    }

    pub fn record(&mut self, event: DriftEvent) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Events matching `kind` and at or after `since`, oldest first.
    pub fn events(
        &self,
        kind: Option<DriftKind>,
        since: Option<DateTime<Utc>>,
    ) -> Vec<&DriftEvent> {
        self.events
            .iter()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .filter(|e| since.map_or(true, |t| e.at >= t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events evicted or refused because the log was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
