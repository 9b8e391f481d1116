use serde::{Deserialize, Serialize};

/// Arithmetic mean. Zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Ordinary least-squares slope of `values` against `times`.
///
/// This is the only slope estimator in the workspace. Returns 0 when fewer
/// than two points are given or when the timestamps have no spread.
pub fn least_squares_slope(times: &[f64], values: &[f64]) -> f64 {
    let n = times.len().min(values.len());
    if n < 2 {
        return 0.0;
    }
    let (times, values) = (&times[..n], &values[..n]);
    let t_mean = mean(times);
    let v_mean = mean(values);

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (t, v) in times.iter().zip(values) {
        let dt = t - t_mean;
        numerator += dt * (v - v_mean);
        denominator += dt * dt;
    }

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Direction of a recorded history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Stable,
    Improving,
    Degrading,
    InsufficientData,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Improving => write!(f, "improving"),
            Self::Degrading => write!(f, "degrading"),
            Self::InsufficientData => write!(f, "insufficient_data"),
        }
    }
}

/// Classify a history by its least-squares slope against sample index.
///
/// Slopes with magnitude below `tolerance` are `Stable`.
pub fn trend(history: &[f64], tolerance: f64) -> Trend {
    if history.len() < 2 {
        return Trend::InsufficientData;
    }
    let index: Vec<f64> = (0..history.len()).map(|i| i as f64).collect();
    let slope = least_squares_slope(&index, history);
    if slope.abs() < tolerance {
        Trend::Stable
    } else if slope > 0.0 {
        Trend::Improving
    } else {
        Trend::Degrading
    }
}
