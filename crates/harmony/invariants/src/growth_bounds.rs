use harmony_types::TimeSeries;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::InvariantError;

const GOMPERTZ_FLOOR: f64 = 1e-6;

/// Self-limiting growth laws `dx/dt = f(x)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthLaw {
    /// `α·x·(1 − x)`
    Logistic,
    /// `α·x·ln(1/x)`, with `x` floored at 1e-6 inside the logarithm.
    Gompertz,
}

impl GrowthLaw {
    pub fn rate(&self, x: f64, alpha: f64) -> f64 {
        match self {
            GrowthLaw::Logistic => alpha * x * (1.0 - x),
            GrowthLaw::Gompertz => {
                let safe = x.clamp(GOMPERTZ_FLOOR, 1.0);
                alpha * x * (1.0 / safe).ln()
            }
        }
    }
}

/// Boundedness findings for one trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthReport {
    pub holds: bool,
    pub explosive_growth: bool,
    /// Largest `|dx/dt|` between consecutive samples.
    pub max_rate_observed: f64,
    /// Mean of the most recent samples, 0 for short trajectories.
    pub saturation_level: f64,
    pub near_saturation: bool,
}

/// Growth must stay below a rate bound.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthBounds {
    pub max_growth_rate: f64,
    /// Samples averaged for the saturation level; the level is only computed
    /// when the trajectory is longer than this.
    pub saturation_window: usize,
    pub saturation_threshold: f64,
}

impl Default for GrowthBounds {
    fn default() -> Self {
        Self {
            max_growth_rate: 1.0,
            saturation_window: 10,
            saturation_threshold: 0.9,
        }
    }
}

impl GrowthBounds {
    pub fn check(&self, x: &TimeSeries) -> Result<GrowthReport, InvariantError> {
        if x.len() < 2 {
            return Err(InvariantError::InsufficientHistory {
                samples: x.len(),
                required: 2,
            });
        }

        let max_rate_observed = x
            .times()
            .windows(2)
            .zip(x.values().windows(2))
            .map(|(t, v)| ((v[1] - v[0]) / (t[1] - t[0])).abs())
            .fold(0.0, f64::max);
        let explosive_growth = max_rate_observed > self.max_growth_rate;

        let (saturation_level, near_saturation) = if x.len() > self.saturation_window {
            let recent = &x.values()[x.len() - self.saturation_window..];
            let level = recent.iter().sum::<f64>() / recent.len().max(1) as f64;
            (level, level > self.saturation_threshold)
        } else {
            (0.0, false)
        };

        if explosive_growth {
            warn!(
                max_rate = max_rate_observed,
                bound = self.max_growth_rate,
                "growth rate exceeds bound"
            );
        }

        Ok(GrowthReport {
            holds: !explosive_growth,
            explosive_growth,
            max_rate_observed,
            saturation_level,
            near_saturation,
        })
    }

    /// Forward-Euler trajectory of `law` from `x0`, kept inside [0, 1]. The
    /// start is clamped to [0.01, 0.99] so both laws can move.
    pub fn simulate(law: GrowthLaw, x0: f64, alpha: f64, steps: usize, dt: f64) -> Vec<f64> {
        let mut x = Vec::with_capacity(steps);
        if steps == 0 {
            return x;
        }
        x.push(x0.clamp(0.01, 0.99));
        for i in 1..steps {
            let prev = x[i - 1];
            x.push((prev + law.rate(prev, alpha) * dt).clamp(0.0, 1.0));
        }
        x
    }
}
