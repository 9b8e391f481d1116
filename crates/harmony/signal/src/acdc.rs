use harmony_types::{SeriesError, TimeSeries};
use serde::{Deserialize, Serialize};

use crate::error::SignalError;

/// Baseline and residual of a decomposed signal.
///
/// `baseline[i] + residual[i]` reconstructs the input sample `i` up to
/// floating-point rounding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    /// Slow component (DC).
    pub baseline: Vec<f64>,
    /// Fast component (AC).
    pub residual: Vec<f64>,
}

impl Decomposition {
    pub fn len(&self) -> usize {
        self.baseline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baseline.is_empty()
    }

    /// Sum the two components back into the original signal.
    pub fn reconstruct(&self) -> Vec<f64> {
        self.baseline
            .iter()
            .zip(&self.residual)
            .map(|(b, r)| b + r)
            .collect()
    }

    /// Reactive power of the whole residual.
    pub fn ac_power(&self) -> f64 {
        ac_power(&self.residual)
    }
}

/// Decomposition of a [`TimeSeries`], timestamps preserved on both parts.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesDecomposition {
    pub baseline: TimeSeries,
    pub residual: TimeSeries,
}

fn check_alpha(alpha: f64) -> Result<(), SignalError> {
    if alpha.is_finite() && alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(SignalError::parameter("alpha", alpha))
    }
}

/// Exponential moving-average low-pass filter.
///
/// `y[0]` is `seed` when given, otherwise the first sample. Each later step
/// moves the previous output toward the input by `alpha`, which equals
/// `alpha * x[t] + (1 - alpha) * y[t-1]` and leaves constant inputs
/// bit-exact.
pub fn ema_lowpass(
    values: &[f64],
    alpha: f64,
    seed: Option<f64>,
) -> Result<Vec<f64>, SignalError> {
    check_alpha(alpha)?;
    if values.is_empty() {
        return Err(SeriesError::Empty.into());
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(SeriesError::NonFinite {
            field: "value",
            index,
        }
        .into());
    }
    if let Some(seed) = seed {
        if !seed.is_finite() {
            return Err(SignalError::parameter("seed", seed));
        }
    }

    let mut out = Vec::with_capacity(values.len());
    let mut y = seed.unwrap_or(values[0]);
    for (i, &x) in values.iter().enumerate() {
        if i > 0 || seed.is_some() {
            y += alpha * (x - y);
        }
        out.push(y);
    }
    Ok(out)
}

/// Split raw values into baseline and residual.
pub fn decompose_values(
    values: &[f64],
    alpha: f64,
    seed: Option<f64>,
) -> Result<Decomposition, SignalError> {
    let baseline = ema_lowpass(values, alpha, seed)?;
    let residual = values.iter().zip(&baseline).map(|(x, b)| x - b).collect();
    Ok(Decomposition { baseline, residual })
}

/// Split a time series into baseline and residual series.
///
/// Linear in the input: `decompose(a·x + b·y) = a·decompose(x) + b·decompose(y)`
/// component-wise. Fails only on non-finite input or an `alpha` outside (0, 1).
pub fn decompose(series: &TimeSeries, alpha: f64) -> Result<SeriesDecomposition, SignalError> {
    let parts = decompose_values(series.values(), alpha, None)?;
    let times = series.times().to_vec();
    Ok(SeriesDecomposition {
        baseline: TimeSeries::new(times.clone(), parts.baseline)?,
        residual: TimeSeries::new(times, parts.residual)?,
    })
}

/// Mean squared residual. Zero for an empty slice.
pub fn ac_power(residual: &[f64]) -> f64 {
    if residual.is_empty() {
        return 0.0;
    }
    residual.iter().map(|r| r * r).sum::<f64>() / residual.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_starts_at_first_sample() {
        let d = decompose_values(&[4.0, 8.0, 8.0], 0.5, None).unwrap();
        assert_eq!(d.baseline, vec![4.0, 6.0, 7.0]);
        assert_eq!(d.residual, vec![0.0, 2.0, 1.0]);
    }

    #[test]
    fn seed_overrides_first_baseline() {
        let d = decompose_values(&[4.0, 8.0], 0.5, Some(0.0)).unwrap();
        assert_eq!(d.baseline, vec![2.0, 5.0]);
    }

    #[test]
    fn constant_input_has_zero_residual() {
        let d = decompose_values(&[0.7; 50], 0.02, None).unwrap();
        assert!(d.residual.iter().all(|&r| r == 0.0));
        assert_eq!(d.ac_power(), 0.0);
    }

    #[test]
    fn reconstruction_is_exact_enough() {
        let x: Vec<f64> = (0..200).map(|i| (i as f64 * 0.3).sin() * 3.0 + 1.0).collect();
        let d = decompose_values(&x, 0.1, None).unwrap();
        for (orig, back) in x.iter().zip(d.reconstruct()) {
            assert!((orig - back).abs() <= 1e-12);
        }
    }

    #[test]
    fn rejects_alpha_outside_open_interval() {
        for alpha in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            assert!(matches!(
                decompose_values(&[1.0, 2.0], alpha, None),
                Err(SignalError::InvalidParameter { name: "alpha", .. })
            ));
        }
    }

    #[test]
    fn rejects_non_finite_input() {
        let err = decompose_values(&[1.0, f64::INFINITY], 0.5, None).unwrap_err();
        assert!(matches!(
            err,
            SignalError::InvalidSignal(SeriesError::NonFinite { index: 1, .. })
        ));
    }

    #[test]
    fn rejects_empty_input() {
        let err = decompose_values(&[], 0.5, None).unwrap_err();
        assert_eq!(err, SignalError::InvalidSignal(SeriesError::Empty));
    }

    #[test]
    fn series_decomposition_keeps_timestamps() {
        let s = TimeSeries::new(vec![0.0, 0.5, 2.0], vec![1.0, 3.0, 2.0]).unwrap();
        let d = decompose(&s, 0.25).unwrap();
        assert_eq!(d.baseline.times(), s.times());
        assert_eq!(d.residual.times(), s.times());
    }

    #[test]
    fn ac_power_of_empty_is_zero() {
        assert_eq!(ac_power(&[]), 0.0);
        assert_eq!(ac_power(&[2.0, -2.0]), 4.0);
    }
}
