use harmony_metrics::{CoherenceDefinition, StressDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::InvariantError;

/// Why a verdict does not hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Mean log-coherence growth is not strictly positive.
    CoherenceNotGrowing,
    /// Stress slope is not strictly negative.
    StressNotDecreasing,
    /// Reactive power of the influence carrier is rising.
    ReactivePowerIncreasing,
    /// Slope of the stress baseline is not strictly negative.
    DcStressNotDecreasing,
    /// Too few samples in the window to evaluate.
    InsufficientHistory,
    /// Input series do not share a clock.
    SeriesAlignment,
    /// Input contains non-finite or empty data.
    InvalidSignal,
}

impl ReasonCode {
    /// Reasons that describe a computed condition failing, as opposed to a
    /// window that could not be computed at all.
    pub fn is_condition(&self) -> bool {
        matches!(
            self,
            Self::CoherenceNotGrowing
                | Self::StressNotDecreasing
                | Self::ReactivePowerIncreasing
                | Self::DcStressNotDecreasing
        )
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CoherenceNotGrowing => write!(f, "coherence_not_growing"),
            Self::StressNotDecreasing => write!(f, "stress_not_decreasing"),
            Self::ReactivePowerIncreasing => write!(f, "reactive_power_increasing"),
            Self::DcStressNotDecreasing => write!(f, "dc_stress_not_decreasing"),
            Self::InsufficientHistory => write!(f, "insufficient_history"),
            Self::SeriesAlignment => write!(f, "series_alignment"),
            Self::InvalidSignal => write!(f, "invalid_signal"),
        }
    }
}

impl From<&InvariantError> for ReasonCode {
    fn from(err: &InvariantError) -> Self {
        match err {
            InvariantError::InsufficientHistory { .. } => ReasonCode::InsufficientHistory,
            InvariantError::SeriesAlignment { .. } => ReasonCode::SeriesAlignment,
            InvariantError::InvalidSignal(_)
            | InvariantError::Metric(_)
            | InvariantError::InvalidParameter { .. } => ReasonCode::InvalidSignal,
        }
    }
}

/// Outcome of one Love's Proof evaluation over one window.
///
/// The condition is sufficient, not necessary: `holds == false` means
/// "inconclusive, flagged for review" and is never evidence of coercion on
/// its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub holds: bool,
    /// Mean growth rate of `log(C + ε)`.
    #[serde(rename = "G_mean")]
    pub g_mean: f64,
    #[serde(rename = "S_slope")]
    pub s_slope: f64,
    /// Trend of reactive power in the influence carrier.
    #[serde(rename = "P_slope")]
    pub p_slope: f64,
    /// Slope of the stress baseline, present only when that condition is
    /// enabled.
    #[serde(rename = "S_dc_slope", default, skip_serializing_if = "Option::is_none")]
    pub s_dc_slope: Option<f64>,
    /// Whether any coherence sample was raised to ε before the logarithm.
    #[serde(rename = "clamped_C")]
    pub clamped_c: bool,
    pub window_start: f64,
    pub window_end: f64,
    pub samples: usize,
    /// First failing reason; `None` when the verdict holds.
    pub reason: Option<ReasonCode>,
    #[serde(default)]
    pub violations: Vec<ReasonCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coherence_definition: Option<CoherenceDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_definition: Option<StressDefinition>,
}

impl Verdict {
    /// A `holds = false` verdict for a window that could not be evaluated.
    pub fn flagged(reason: ReasonCode, window_start: f64, window_end: f64) -> Self {
        Self {
            holds: false,
            g_mean: 0.0,
            s_slope: 0.0,
            p_slope: 0.0,
            s_dc_slope: None,
            clamped_c: false,
            window_start,
            window_end,
            samples: 0,
            reason: Some(reason),
            violations: vec![reason],
            coherence_definition: None,
            stress_definition: None,
        }
    }

    /// Every failed condition, in evaluation order.
    pub fn violations(&self) -> &[ReasonCode] {
        &self.violations
    }

    /// Whether the window could not be computed at all, as opposed to
    /// computed and failing a condition.
    pub fn is_uncomputed(&self) -> bool {
        self.violations.iter().any(|r| !r.is_condition())
    }

    /// Attach the canonical metric definitions that produced C and S.
    pub fn with_definitions(
        mut self,
        coherence: CoherenceDefinition,
        stress: StressDefinition,
    ) -> Self {
        self.coherence_definition = Some(coherence);
        self.stress_definition = Some(stress);
        self
    }

    /// Flat key/value record for logs and display.
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("holds".into(), Value::Bool(self.holds));
        record.insert("G_mean".into(), Value::from(self.g_mean));
        record.insert("S_slope".into(), Value::from(self.s_slope));
        record.insert("P_slope".into(), Value::from(self.p_slope));
        if let Some(slope) = self.s_dc_slope {
            record.insert("S_dc_slope".into(), Value::from(slope));
        }
        record.insert("clamped_C".into(), Value::Bool(self.clamped_c));
        record.insert(
            "reason".into(),
            self.reason
                .map_or(Value::Null, |r| Value::String(r.to_string())),
        );
        record.insert("window_start".into(), Value::from(self.window_start));
        record.insert("window_end".into(), Value::from(self.window_end));
        record.insert("samples".into(), Value::from(self.samples));
        if let Some(def) = self.coherence_definition {
            record.insert("coherence_definition".into(), Value::String(def.to_string()));
        }
        if let Some(def) = self.stress_definition {
            record.insert("stress_definition".into(), Value::String(def.to_string()));
        }
        record
    }
}
