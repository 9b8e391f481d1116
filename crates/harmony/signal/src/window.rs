use harmony_types::TimeSeries;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::acdc::{ac_power, decompose_values};
use crate::error::SignalError;
use crate::regression::{least_squares_slope, mean};

/// Statistics of one trailing window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Timestamp of the first sample inside the window.
    pub start: f64,
    /// Timestamp the window ends at (inclusive).
    pub end: f64,
    /// Number of samples inside the window.
    pub samples: usize,
    pub mean: f64,
    /// Least-squares slope against time.
    pub slope: f64,
    /// Mean squared AC residual over the window.
    pub reactive_power: f64,
}

/// Result for one trailing window: either statistics or an explicit marker
/// that too few samples were available.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WindowOutcome {
    Ready(WindowStats),
    Insufficient { end: f64, samples: usize },
}

impl WindowOutcome {
    pub fn stats(&self) -> Option<&WindowStats> {
        match self {
            WindowOutcome::Ready(stats) => Some(stats),
            WindowOutcome::Insufficient { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, WindowOutcome::Ready(_))
    }
}

/// Rolling statistics over trailing windows of fixed elapsed time.
#[derive(Clone, Debug)]
pub struct WindowedStatistics {
    width: f64,
    min_samples: usize,
    alpha: f64,
}

impl WindowedStatistics {
    /// `width` is in the series' time units; windows holding fewer than
    /// `min_samples` samples (at least 2) produce no statistic.
    pub fn new(width: f64, min_samples: usize, alpha: f64) -> Result<Self, SignalError> {
        if !width.is_finite() || width <= 0.0 {
            return Err(SignalError::parameter("width", width));
        }
        if min_samples < 2 {
            return Err(SignalError::parameter("min_samples", min_samples as f64));
        }
        if !(alpha.is_finite() && alpha > 0.0 && alpha < 1.0) {
            return Err(SignalError::parameter("alpha", alpha));
        }
        Ok(Self {
            width,
            min_samples,
            alpha,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// One outcome per timestamp, for the window `[t - width, t]`.
    pub fn compute(&self, series: &TimeSeries) -> Result<Vec<WindowOutcome>, SignalError> {
        let parts = decompose_values(series.values(), self.alpha, None)?;
        Ok((0..series.len())
            .map(|end| self.window_at(series, &parts.residual, end))
            .collect())
    }

    /// Outcome for the trailing window ending at sample `end_index`, using a
    /// residual previously computed for the whole series.
    pub fn window_at(
        &self,
        series: &TimeSeries,
        residual: &[f64],
        end_index: usize,
    ) -> WindowOutcome {
        let end = series.times()[end_index];
        let range = series.index_range(end - self.width, end);
        let samples = range.len();
        if samples < self.min_samples {
            trace!(
                end,
                samples,
                min = self.min_samples,
                "window below minimum sample count"
            );
            return WindowOutcome::Insufficient { end, samples };
        }

        let times = &series.times()[range.clone()];
        let values = &series.values()[range.clone()];
        WindowOutcome::Ready(WindowStats {
            start: times[0],
            end,
            samples,
            mean: mean(values),
            slope: least_squares_slope(times, values),
            reactive_power: residual.get(range).map_or(0.0, ac_power),
        })
    }
}

/// Trend of reactive power across a window.
///
/// The window `[times[0], times[last]]` is cut into `segments` spans of equal
/// duration. Each span holding at least two samples contributes its AC power
/// at the mean time of its samples; the result is the least-squares slope of
/// power against time. `None` when fewer than two spans qualify.
pub fn reactive_power_trend(times: &[f64], residual: &[f64], segments: usize) -> Option<f64> {
    let n = times.len().min(residual.len());
    if n < 4 || segments < 2 {
        return None;
    }
    let t0 = times[0];
    let span = times[n - 1] - t0;
    if span <= 0.0 {
        return None;
    }
    let segment_width = span / segments as f64;

    let mut buckets: Vec<(Vec<f64>, Vec<f64>)> = vec![(Vec::new(), Vec::new()); segments];
    for (&t, &r) in times[..n].iter().zip(&residual[..n]) {
        let slot = (((t - t0) / segment_width) as usize).min(segments - 1);
        buckets[slot].0.push(t);
        buckets[slot].1.push(r);
    }

    let (mid_times, powers): (Vec<f64>, Vec<f64>) = buckets
        .iter()
        .filter(|(ts, _)| ts.len() >= 2)
        .map(|(ts, rs)| (mean(ts), ac_power(rs)))
        .unzip();

    if powers.len() < 2 {
        return None;
    }
    Some(least_squares_slope(&mid_times, &powers))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> TimeSeries {
        TimeSeries::uniform(0.0, 1.0, (0..n).map(|i| i as f64).collect()).unwrap()
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(WindowedStatistics::new(0.0, 3, 0.1).is_err());
        assert!(WindowedStatistics::new(f64::INFINITY, 3, 0.1).is_err());
        assert!(WindowedStatistics::new(5.0, 1, 0.1).is_err());
        assert!(WindowedStatistics::new(5.0, 3, 1.0).is_err());
    }

    #[test]
    fn early_windows_are_insufficient() {
        let stats = WindowedStatistics::new(3.0, 3, 0.2).unwrap();
        let out = stats.compute(&ramp(6)).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(out[0], WindowOutcome::Insufficient { end: 0.0, samples: 1 });
        assert_eq!(out[1], WindowOutcome::Insufficient { end: 1.0, samples: 2 });
        assert!(out[2].is_ready());
    }

    #[test]
    fn ramp_slope_and_mean() {
        let stats = WindowedStatistics::new(3.0, 3, 0.2).unwrap();
        let out = stats.compute(&ramp(6)).unwrap();
        let last = out[5].stats().unwrap();
        assert_eq!(last.samples, 4);
        assert_eq!(last.start, 2.0);
        assert!((last.mean - 3.5).abs() < 1e-12);
        assert!((last.slope - 1.0).abs() < 1e-12);
        assert!(last.reactive_power > 0.0);
    }

    #[test]
    fn windows_follow_elapsed_time_not_sample_count() {
        let s = TimeSeries::new(vec![0.0, 1.0, 2.0, 10.0, 10.5, 11.0], vec![1.0; 6]).unwrap();
        let stats = WindowedStatistics::new(2.0, 3, 0.2).unwrap();
        let out = stats.compute(&s).unwrap();
        // The gap leaves the window ending at t=10 with a single sample.
        assert_eq!(out[3], WindowOutcome::Insufficient { end: 10.0, samples: 1 });
        assert_eq!(out[5].stats().unwrap().samples, 3);
    }

    #[test]
    fn constant_series_has_no_reactive_power() {
        let s = TimeSeries::uniform(0.0, 1.0, vec![2.5; 10]).unwrap();
        let stats = WindowedStatistics::new(4.0, 2, 0.1).unwrap();
        for outcome in stats.compute(&s).unwrap().iter().filter_map(|o| o.stats()) {
            assert_eq!(outcome.reactive_power, 0.0);
            assert_eq!(outcome.slope, 0.0);
        }
    }

    #[test]
    fn power_trend_two_halves() {
        let t = [0.0, 1.0, 2.0, 3.0];
        let r = [1.0, -1.0, 3.0, -3.0];
        // Halves: power 1 at t=0.5, power 9 at t=2.5.
        let slope = reactive_power_trend(&t, &r, 2).unwrap();
        assert!((slope - 4.0).abs() < 1e-12);
    }

    #[test]
    fn power_trend_needs_two_populated_segments() {
        assert_eq!(reactive_power_trend(&[0.0, 1.0, 2.0], &[1.0, 1.0, 1.0], 2), None);
        // Samples bunched at the start leave the second half with one sample.
        let t = [0.0, 0.1, 0.2, 10.0];
        assert_eq!(reactive_power_trend(&t, &[1.0; 4], 2), None);
    }
}
