use serde::{Deserialize, Serialize};

use crate::definitions::StressDefinition;
use crate::error::{check_finite, check_same_len, MetricError};

const EPS: f64 = 1e-12;
const HR_MIN: f64 = 40.0;
const HR_MAX: f64 = 180.0;

/// A stress adapter: turns a domain signal into S(t) in [0, 1] using one
/// declared canonical definition.
pub trait StressMetric {
    type Input: ?Sized;

    fn definition(&self) -> StressDefinition;

    /// One stress value per time step of the input.
    fn stress(&self, input: &Self::Input) -> Result<Vec<f64>, MetricError>;
}

/// Physiological channels sampled on a shared clock.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PhysiologicalSignals {
    /// Beats per minute.
    pub heart_rate: Vec<f64>,
    /// Electrodermal activity, any unit.
    pub eda: Option<Vec<f64>>,
    /// Heart rate variability (e.g. RMSSD).
    pub hrv: Option<Vec<f64>>,
}

/// Mean of normalized heart rate, normalized EDA and inverted normalized
/// HRV. Heart rate is scaled over 40..180 bpm; the optional channels are
/// scaled by their own range.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompositePhysiological;

impl StressMetric for CompositePhysiological {
    type Input = PhysiologicalSignals;

    fn definition(&self) -> StressDefinition {
        StressDefinition::CompositePhysiological
    }

    fn stress(&self, input: &PhysiologicalSignals) -> Result<Vec<f64>, MetricError> {
        let n = input.heart_rate.len();
        if n == 0 {
            return Err(MetricError::Empty { what: "heart rate" });
        }
        check_finite("heart rate", &input.heart_rate)?;

        let mut components: Vec<Vec<f64>> = vec![input
            .heart_rate
            .iter()
            .map(|hr| ((hr - HR_MIN) / (HR_MAX - HR_MIN)).clamp(0.0, 1.0))
            .collect()];

        if let Some(eda) = &input.eda {
            check_same_len("heart rate", n, "eda", eda.len())?;
            check_finite("eda", eda)?;
            components.push(range_normalize(eda).unwrap_or_else(|| vec![0.0; n]));
        }
        if let Some(hrv) = &input.hrv {
            check_same_len("heart rate", n, "hrv", hrv.len())?;
            check_finite("hrv", hrv)?;
            // Lower variability means higher stress.
            components.push(
                range_normalize(hrv)
                    .map(|scaled| scaled.into_iter().map(|v| 1.0 - v).collect())
                    .unwrap_or_else(|| vec![0.0; n]),
            );
        }

        let k = components.len() as f64;
        Ok((0..n)
            .map(|i| {
                let sum: f64 = components.iter().map(|c| c[i]).sum();
                (sum / k).clamp(0.0, 1.0)
            })
            .collect())
    }
}

/// Two aligned series for prediction error stress.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Predictions {
    pub predictions: Vec<f64>,
    pub targets: Vec<f64>,
}

/// `|prediction − target|` normalized by a baseline error, or by the
/// largest observed error when none is given.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PredictionError {
    pub baseline_error: Option<f64>,
}

impl StressMetric for PredictionError {
    type Input = Predictions;

    fn definition(&self) -> StressDefinition {
        StressDefinition::PredictionError
    }

    fn stress(&self, input: &Predictions) -> Result<Vec<f64>, MetricError> {
        check_same_len(
            "predictions",
            input.predictions.len(),
            "targets",
            input.targets.len(),
        )?;
        if input.predictions.is_empty() {
            return Err(MetricError::Empty {
                what: "predictions",
            });
        }
        check_finite("predictions", &input.predictions)?;
        check_finite("targets", &input.targets)?;

        let errors: Vec<f64> = input
            .predictions
            .iter()
            .zip(&input.targets)
            .map(|(p, t)| (p - t).abs())
            .collect();
        let scale = self
            .baseline_error
            .unwrap_or_else(|| errors.iter().copied().fold(0.0, f64::max));
        if scale <= EPS {
            return Ok(vec![0.0; errors.len()]);
        }
        Ok(errors.iter().map(|e| (e / scale).clamp(0.0, 1.0)).collect())
    }
}

/// Squared first difference smoothed by a centered moving average and
/// normalized by its maximum.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VelocityEnergy {
    pub window: usize,
}

impl Default for VelocityEnergy {
    fn default() -> Self {
        Self { window: 10 }
    }
}

impl StressMetric for VelocityEnergy {
    type Input = [f64];

    fn definition(&self) -> StressDefinition {
        StressDefinition::VelocityEnergy
    }

    fn stress(&self, input: &[f64]) -> Result<Vec<f64>, MetricError> {
        check_finite("signal", input)?;
        if input.len() < 2 {
            return Ok(vec![0.0; input.len()]);
        }

        // First difference with the first sample prepended, so v[0] == 0.
        let velocity_sq: Vec<f64> = std::iter::once(0.0)
            .chain(input.windows(2).map(|w| (w[1] - w[0]).powi(2)))
            .collect();

        let energy = if self.window <= 1 {
            velocity_sq
        } else {
            centered_average(&velocity_sq, self.window)
        };

        let max = energy.iter().copied().fold(0.0, f64::max);
        if max <= EPS {
            return Ok(vec![0.0; energy.len()]);
        }
        Ok(energy.iter().map(|e| (e / max).clamp(0.0, 1.0)).collect())
    }
}

/// Scale to [0, 1] by the slice's own range; `None` when the range is flat.
fn range_normalize(values: &[f64]) -> Option<Vec<f64>> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    (max - min > EPS).then(|| values.iter().map(|v| (v - min) / (max - min)).collect())
}

/// Uniform kernel of width `window`, divided by `window`, aligned like a
/// same-length convolution. Missing neighbours at the edges count as zero.
fn centered_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len() as isize;
    let w = window as isize;
    let offset = (w - 1) / 2;
    (0..n)
        .map(|i| {
            let hi = i + offset;
            let lo = hi - (w - 1);
            let sum: f64 = (lo.max(0)..=hi.min(n - 1))
                .map(|j| values[j as usize])
                .sum();
            sum / window as f64
        })
        .collect()
}
