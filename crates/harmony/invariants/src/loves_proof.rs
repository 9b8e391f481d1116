use std::ops::Range;

use harmony_signal::{decompose_values, least_squares_slope, reactive_power_trend};
use harmony_types::TimeSeries;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::InvariantError;
use crate::verdict::{ReasonCode, Verdict};

/// Parameters of the Love's Proof evaluator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LovesProofConfig {
    /// Floor applied to coherence before the logarithm, also added inside it.
    pub epsilon: f64,
    /// EMA smoothing factor for the influence-carrier decomposition.
    pub alpha: f64,
    /// Windows holding fewer samples than this are not evaluated.
    pub min_samples: usize,
    /// Equal-duration segments used for the reactive-power trend.
    pub power_segments: usize,
    /// Band around zero treated as zero when comparing slopes.
    pub tolerance: f64,
    /// Also require the stress baseline (DC) to be falling.
    pub require_dc_trend: bool,
}

impl Default for LovesProofConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            alpha: 0.02,
            min_samples: 4,
            power_segments: 2,
            tolerance: 1e-12,
            require_dc_trend: false,
        }
    }
}

impl LovesProofConfig {
    pub fn validate(&self) -> Result<(), InvariantError> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(param("epsilon", self.epsilon));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(param("alpha", self.alpha));
        }
        if self.min_samples < 2 {
            return Err(param("min_samples", self.min_samples as f64));
        }
        if self.power_segments < 2 {
            return Err(param("power_segments", self.power_segments as f64));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(param("tolerance", self.tolerance));
        }
        Ok(())
    }
}

fn param(name: &'static str, value: f64) -> InvariantError {
    InvariantError::InvalidParameter { name, value }
}

/// Which part of the input series a verdict covers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Window {
    /// Every sample.
    Full,
    /// Samples with `start <= t <= end`.
    Span { start: f64, end: f64 },
    /// The last `width` time units, ending at the last sample.
    Trailing(f64),
}

impl Window {
    fn bounds(&self, times: &[f64]) -> (f64, f64) {
        let first = times[0];
        let last = times[times.len() - 1];
        match *self {
            Window::Full => (first, last),
            Window::Span { start, end } => (start, end),
            Window::Trailing(width) => (last - width, last),
        }
    }
}

/// Evaluates the non-coercive growth condition
///
/// ```text
/// ⟨G⟩ > 0  ∧  ⟨dS/dt⟩ < 0  ∧  ⟨dP/dt⟩ ≤ 0
/// ```
///
/// over coherence `C`, stress `S` and influence carrier `x`. All three
/// slopes use ordinary least squares against time. `G` is the slope of
/// `log(max(C, ε) + ε)`; `P` is the AC power of the decomposed carrier,
/// trended across equal-duration segments of the window.
///
/// The condition is sufficient for non-coercion, not necessary. A verdict
/// that does not hold is inconclusive.
#[derive(Clone, Debug, Default)]
pub struct LovesProofEvaluator {
    config: LovesProofConfig,
}

impl LovesProofEvaluator {
    pub fn new(config: LovesProofConfig) -> Result<Self, InvariantError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LovesProofConfig {
        &self.config
    }

    /// Evaluate one window.
    ///
    /// Fails with `SeriesAlignment` when the three series differ in length or
    /// timestamps, and with `InsufficientHistory` when the window holds too
    /// few samples or too few populated reactive-power segments.
    pub fn evaluate(
        &self,
        c: &TimeSeries,
        s: &TimeSeries,
        x: &TimeSeries,
        window: Window,
    ) -> Result<Verdict, InvariantError> {
        check_alignment(c, s, x)?;
        let (start, end) = window.bounds(c.times());
        if !(start.is_finite() && end.is_finite()) || end < start {
            return Err(param("window", end - start));
        }
        let range = c.index_range(start, end);
        self.evaluate_range(c, s, x, range)
    }

    /// Evaluate raw aligned slices sharing `times`.
    pub fn evaluate_values(
        &self,
        times: &[f64],
        c: &[f64],
        s: &[f64],
        x: &[f64],
        window: Window,
    ) -> Result<Verdict, InvariantError> {
        let c = TimeSeries::new(times.to_vec(), c.to_vec())?;
        let s = TimeSeries::new(times.to_vec(), s.to_vec())?;
        let x = TimeSeries::new(times.to_vec(), x.to_vec())?;
        self.evaluate(&c, &s, &x, window)
    }

    /// Slide a window of `width` time units across the series in steps of
    /// `step`, starting at the first sample.
    ///
    /// Windows that cannot be computed become flagged verdicts carrying their
    /// reason code; only misaligned inputs or bad parameters abort the sweep.
    pub fn evaluate_continuous(
        &self,
        c: &TimeSeries,
        s: &TimeSeries,
        x: &TimeSeries,
        width: f64,
        step: f64,
    ) -> Result<Vec<Verdict>, InvariantError> {
        if !(width.is_finite() && width > 0.0) {
            return Err(param("width", width));
        }
        if !(step.is_finite() && step > 0.0) {
            return Err(param("step", step));
        }
        check_alignment(c, s, x)?;

        let first = c.first_time();
        let last = c.last_time();
        // Absorb rounding in `first + k * step` so the final window is kept.
        let slack = 1e-9 * width.max(1.0);
        let mut verdicts = Vec::new();
        let mut k = 0usize;
        loop {
            let start = first + k as f64 * step;
            let end = start + width;
            if end > last + slack {
                break;
            }
            let range = c.index_range(start, end);
            let verdict = match self.evaluate_range(c, s, x, range) {
                Ok(verdict) => verdict,
                Err(err) => {
                    trace!(start, end, error = %err, "window flagged");
                    Verdict::flagged(ReasonCode::from(&err), start, end)
                }
            };
            verdicts.push(verdict);
            k += 1;
        }
        debug!(
            windows = verdicts.len(),
            holding = verdicts.iter().filter(|v| v.holds).count(),
            "continuous evaluation finished"
        );
        Ok(verdicts)
    }

    fn evaluate_range(
        &self,
        c: &TimeSeries,
        s: &TimeSeries,
        x: &TimeSeries,
        range: Range<usize>,
    ) -> Result<Verdict, InvariantError> {
        let cfg = &self.config;
        let samples = range.len();
        if samples < cfg.min_samples {
            return Err(InvariantError::InsufficientHistory {
                samples,
                required: cfg.min_samples,
            });
        }

        let times = &c.times()[range.clone()];
        let c_win = &c.values()[range.clone()];
        let s_win = &s.values()[range.clone()];
        let x_win = &x.values()[range];

        // Clamped log-coherence growth.
        let clamped_c = c_win.iter().any(|&v| v < cfg.epsilon);
        if clamped_c {
            debug!(
                epsilon = cfg.epsilon,
                clamped = c_win.iter().filter(|&&v| v < cfg.epsilon).count(),
                "coherence clamped before logarithm"
            );
        }
        let log_c: Vec<f64> = c_win
            .iter()
            .map(|&v| (v.max(cfg.epsilon) + cfg.epsilon).ln())
            .collect();
        let g_mean = least_squares_slope(times, &log_c);

        // Stress slope.
        let s_slope = least_squares_slope(times, s_win);

        // Reactive power trend of the carrier.
        let carrier = decompose_values(x_win, cfg.alpha, None)?;
        let p_slope = reactive_power_trend(times, &carrier.residual, cfg.power_segments)
            .ok_or(InvariantError::InsufficientHistory {
                samples,
                required: cfg.min_samples.max(2 * cfg.power_segments),
            })?;

        let s_dc_slope = if cfg.require_dc_trend {
            let stress = decompose_values(s_win, cfg.alpha, None)?;
            Some(least_squares_slope(times, &stress.baseline))
        } else {
            None
        };

        // Strict on G and dS/dt, non-strict on dP/dt.
        let mut violations = Vec::new();
        if g_mean <= cfg.tolerance {
            violations.push(ReasonCode::CoherenceNotGrowing);
        }
        if s_slope >= -cfg.tolerance {
            violations.push(ReasonCode::StressNotDecreasing);
        }
        if p_slope > cfg.tolerance {
            violations.push(ReasonCode::ReactivePowerIncreasing);
        }
        if let Some(slope) = s_dc_slope {
            if slope >= -cfg.tolerance {
                violations.push(ReasonCode::DcStressNotDecreasing);
            }
        }

        let holds = violations.is_empty();
        debug!(
            holds,
            g_mean,
            s_slope,
            p_slope,
            clamped_c,
            samples,
            "love's proof evaluated"
        );

        Ok(Verdict {
            holds,
            g_mean,
            s_slope,
            p_slope,
            s_dc_slope,
            clamped_c,
            window_start: times[0],
            window_end: times[samples - 1],
            samples,
            reason: violations.first().copied(),
            violations,
            coherence_definition: None,
            stress_definition: None,
        })
    }
}

fn check_alignment(c: &TimeSeries, s: &TimeSeries, x: &TimeSeries) -> Result<(), InvariantError> {
    if c.len() != s.len() || c.len() != x.len() {
        return Err(InvariantError::misaligned(format!(
            "lengths differ: C={}, S={}, x={}",
            c.len(),
            s.len(),
            x.len()
        )));
    }
    if !c.is_aligned_with(s) {
        return Err(InvariantError::misaligned("C and S timestamps differ"));
    }
    if !c.is_aligned_with(x) {
        return Err(InvariantError::misaligned("C and x timestamps differ"));
    }
    Ok(())
}
