use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a sequence of samples is not a valid time series.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("time series is empty")]
    Empty,

    #[error("timestamps ({times}) and values ({values}) differ in length")]
    LengthMismatch { times: usize, values: usize },

    #[error("non-finite {field} at index {index}")]
    NonFinite { field: &'static str, index: usize },

    #[error("timestamps not strictly increasing at index {index}: {previous} then {current}")]
    NonMonotonic {
        index: usize,
        previous: f64,
        current: f64,
    },
}

/// A single `(timestamp, value)` observation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(t: f64, value: f64) -> Self {
        Self { t, value }
    }
}

/// An ordered, non-empty sequence of finite samples with strictly
/// increasing timestamps.
///
/// Gaps are permitted; everything downstream windows on elapsed time, not
/// on sample count. Timestamps and values are stored as parallel vectors so
/// windows can be sliced without copying per-sample structs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Sample>", into = "Vec<Sample>")]
pub struct TimeSeries {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series from parallel timestamp and value vectors.
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Result<Self, SeriesError> {
        if times.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }
        if times.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (index, (t, v)) in times.iter().zip(&values).enumerate() {
            if !t.is_finite() {
                return Err(SeriesError::NonFinite {
                    field: "timestamp",
                    index,
                });
            }
            if !v.is_finite() {
                return Err(SeriesError::NonFinite {
                    field: "value",
                    index,
                });
            }
        }
        for index in 1..times.len() {
            if times[index] <= times[index - 1] {
                return Err(SeriesError::NonMonotonic {
                    index,
                    previous: times[index - 1],
                    current: times[index],
                });
            }
        }
        Ok(Self { times, values })
    }

    /// Build a series sampled every `step` time units starting at `start`.
    pub fn uniform(start: f64, step: f64, values: Vec<f64>) -> Result<Self, SeriesError> {
        let times = (0..values.len()).map(|i| start + step * i as f64).collect();
        Self::new(times, values)
    }

    pub fn from_samples(samples: Vec<Sample>) -> Result<Self, SeriesError> {
        let (times, values) = samples.into_iter().map(|s| (s.t, s.value)).unzip();
        Self::new(times, values)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Always false for a constructed series; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.times
            .iter()
            .zip(&self.values)
            .map(|(&t, &value)| Sample { t, value })
    }

    pub fn first_time(&self) -> f64 {
        self.times[0]
    }

    pub fn last_time(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    /// Elapsed time between the first and last sample.
    pub fn duration(&self) -> f64 {
        self.last_time() - self.first_time()
    }

    /// Index range of the samples with `start <= t <= end`.
    pub fn index_range(&self, start: f64, end: f64) -> Range<usize> {
        let lo = self.times.partition_point(|&t| t < start);
        let hi = self.times.partition_point(|&t| t <= end);
        lo..hi.max(lo)
    }

    /// Copy of the samples with `start <= t <= end`, or `None` if no sample
    /// falls inside.
    pub fn slice_time(&self, start: f64, end: f64) -> Option<TimeSeries> {
        let range = self.index_range(start, end);
        if range.is_empty() {
            return None;
        }
        Some(Self {
            times: self.times[range.clone()].to_vec(),
            values: self.values[range].to_vec(),
        })
    }

    /// Same timestamps, values transformed by `f`.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Result<TimeSeries, SeriesError> {
        Self::new(
            self.times.clone(),
            self.values.iter().map(|&v| f(v)).collect(),
        )
    }

    /// Whether `other` carries exactly the same timestamps.
    pub fn is_aligned_with(&self, other: &TimeSeries) -> bool {
        self.times == other.times
    }
}

impl TryFrom<Vec<Sample>> for TimeSeries {
    type Error = SeriesError;

    fn try_from(samples: Vec<Sample>) -> Result<Self, Self::Error> {
        Self::from_samples(samples)
    }
}

impl From<TimeSeries> for Vec<Sample> {
    fn from(series: TimeSeries) -> Self {
        series.samples().collect()
    }
}
