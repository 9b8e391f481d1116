use num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use crate::definitions::CoherenceDefinition;
use crate::error::{check_finite, check_same_len, MetricError};

/// Spectral concentration needs at least this many samples to mean anything.
const MIN_SPECTRAL_SAMPLES: usize = 8;
const POWER_FLOOR: f64 = 1e-12;

/// A coherence adapter: turns a domain signal into C(t) in [0, 1] using one
/// declared canonical definition.
pub trait CoherenceMetric {
    type Input: ?Sized;

    fn definition(&self) -> CoherenceDefinition;

    /// One coherence value per time step of the input.
    fn coherence(&self, input: &Self::Input) -> Result<Vec<f64>, MetricError>;
}

/// `|mean(exp(i·φ))|` over a slice of phases, clipped to [0, 1].
pub fn phase_concentration(phases: &[f64]) -> f64 {
    if phases.is_empty() {
        return 0.0;
    }
    let n = phases.len() as f64;
    let (sum_cos, sum_sin) = phases
        .iter()
        .fold((0.0, 0.0), |(c, s), p| (c + p.cos(), s + p.sin()));
    ((sum_cos / n).hypot(sum_sin / n)).clamp(0.0, 1.0)
}

/// Kuramoto order parameter per time step for `N` oscillators given as
/// rows of equal length. A single oscillator is perfectly concentrated.
pub fn kuramoto_order(phases: &[Vec<f64>]) -> Result<Vec<f64>, MetricError> {
    let first = phases.first().ok_or(MetricError::Empty { what: "phases" })?;
    let steps = first.len();
    if steps == 0 {
        return Err(MetricError::Empty { what: "phases" });
    }
    for row in phases {
        check_same_len("oscillator 0", steps, "oscillator", row.len())?;
        check_finite("phase", row)?;
    }
    if phases.len() == 1 {
        return Ok(vec![1.0; steps]);
    }

    let mut column = Vec::with_capacity(phases.len());
    let mut out = Vec::with_capacity(steps);
    for t in 0..steps {
        column.clear();
        column.extend(phases.iter().map(|row| row[t]));
        out.push(phase_concentration(&column));
    }
    Ok(out)
}

/// Share of one-sided power within `[f0 − bandwidth, f0 + bandwidth]`.
///
/// Zero for fewer than eight samples, zero total power, or an empty band.
pub fn spectral_concentration(x: &[f64], fs: f64, f0: f64, bandwidth: f64) -> f64 {
    spectral_concentration_with(&mut FftPlanner::new(), x, fs, f0, bandwidth)
}

/// As [`spectral_concentration`], reusing `planner`'s cached plans across
/// windows of the same length.
pub fn spectral_concentration_with(
    planner: &mut FftPlanner<f64>,
    x: &[f64],
    fs: f64,
    f0: f64,
    bandwidth: f64,
) -> f64 {
    let n = x.len();
    if n < MIN_SPECTRAL_SAMPLES {
        return 0.0;
    }
    let mut buf: Vec<Complex64> = x.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut buf);

    let mut total = 0.0;
    let mut band = 0.0;
    let mut any_in_band = false;
    for (k, bin) in buf.iter().take(n / 2 + 1).enumerate() {
        let power = bin.norm_sqr();
        total += power;
        let freq = k as f64 * fs / n as f64;
        if freq >= f0 - bandwidth && freq <= f0 + bandwidth {
            band += power;
            any_in_band = true;
        }
    }
    if total <= POWER_FLOOR || !any_in_band {
        return 0.0;
    }
    (band / total).clamp(0.0, 1.0)
}

/// Kuramoto order across oscillators; input rows are per-oscillator phases.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KuramotoOrder;

impl CoherenceMetric for KuramotoOrder {
    type Input = [Vec<f64>];

    fn definition(&self) -> CoherenceDefinition {
        CoherenceDefinition::KuramotoOrder
    }

    fn coherence(&self, input: &[Vec<f64>]) -> Result<Vec<f64>, MetricError> {
        kuramoto_order(input)
    }
}

/// Phase concentration over a trailing window of `window` samples.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseConcentration {
    pub window: usize,
}

impl CoherenceMetric for PhaseConcentration {
    type Input = [f64];

    fn definition(&self) -> CoherenceDefinition {
        CoherenceDefinition::PhaseConcentration
    }

    fn coherence(&self, input: &[f64]) -> Result<Vec<f64>, MetricError> {
        if self.window == 0 {
            return Err(MetricError::InvalidParameter {
                name: "window",
                value: 0.0,
            });
        }
        if input.is_empty() {
            return Err(MetricError::Empty { what: "phase" });
        }
        check_finite("phase", input)?;
        Ok(trailing(input, self.window, phase_concentration))
    }
}

/// Spectral concentration around `f0` over a trailing window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpectralConcentration {
    /// Sampling rate in Hz.
    pub fs: f64,
    /// Fundamental frequency in Hz.
    pub f0: f64,
    pub bandwidth: f64,
    pub window: usize,
}

impl CoherenceMetric for SpectralConcentration {
    type Input = [f64];

    fn definition(&self) -> CoherenceDefinition {
        CoherenceDefinition::SpectralConcentration
    }

    fn coherence(&self, input: &[f64]) -> Result<Vec<f64>, MetricError> {
        if !(self.fs.is_finite() && self.fs > 0.0) {
            return Err(MetricError::InvalidParameter {
                name: "fs",
                value: self.fs,
            });
        }
        if self.window == 0 {
            return Err(MetricError::InvalidParameter {
                name: "window",
                value: 0.0,
            });
        }
        if input.is_empty() {
            return Err(MetricError::Empty { what: "signal" });
        }
        check_finite("signal", input)?;
        let mut planner = FftPlanner::new();
        Ok(trailing(input, self.window, |w| {
            spectral_concentration_with(&mut planner, w, self.fs, self.f0, self.bandwidth)
        }))
    }
}

/// Model and baseline losses on a comparable scale (e.g. cross-entropy per
/// token).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Losses {
    pub model: Vec<f64>,
    pub baseline: Vec<f64>,
}

/// Predictive compression gain `1 − L_model / (L_baseline + eps)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompressionGain {
    pub eps: f64,
}

impl Default for CompressionGain {
    fn default() -> Self {
        Self { eps: 1e-12 }
    }
}

impl CoherenceMetric for CompressionGain {
    type Input = Losses;

    fn definition(&self) -> CoherenceDefinition {
        CoherenceDefinition::CompressionGain
    }

    fn coherence(&self, input: &Losses) -> Result<Vec<f64>, MetricError> {
        check_same_len(
            "model loss",
            input.model.len(),
            "baseline loss",
            input.baseline.len(),
        )?;
        if input.model.is_empty() {
            return Err(MetricError::Empty { what: "losses" });
        }
        check_finite("model loss", &input.model)?;
        check_finite("baseline loss", &input.baseline)?;
        Ok(input
            .model
            .iter()
            .zip(&input.baseline)
            .map(|(m, b)| (1.0 - m / (b + self.eps)).clamp(0.0, 1.0))
            .collect())
    }
}

/// Apply `f` to the trailing window ending at every index.
fn trailing(values: &[f64], window: usize, mut f: impl FnMut(&[f64]) -> f64) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            f(&values[start..=i])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    /// Direct O(n²) one-sided power spectrum.
    fn naive_band_share(x: &[f64], fs: f64, f0: f64, bandwidth: f64) -> f64 {
        let n = x.len();
        let (mut total, mut band) = (0.0, 0.0);
        for k in 0..=n / 2 {
            let (mut re, mut im) = (0.0, 0.0);
            for (j, &v) in x.iter().enumerate() {
                let angle = -2.0 * PI * (k * j) as f64 / n as f64;
                re += v * angle.cos();
                im += v * angle.sin();
            }
            let power = re * re + im * im;
            total += power;
            let freq = k as f64 * fs / n as f64;
            if (f0 - bandwidth..=f0 + bandwidth).contains(&freq) {
                band += power;
            }
        }
        band / total
    }

    #[test]
    fn aligned_phases_are_fully_coherent() {
        assert!((phase_concentration(&[0.3; 10]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn opposite_phases_cancel() {
        assert!(phase_concentration(&[0.0, PI]) < 1e-12);
    }

    #[test]
    fn kuramoto_single_oscillator_is_one() {
        let r = kuramoto_order(&[vec![0.1, 2.0, -1.0]]).unwrap();
        assert_eq!(r, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn kuramoto_tracks_synchronization() {
        // Two oscillators drifting from anti-phase into phase.
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![PI, PI / 2.0, 0.0];
        let r = kuramoto_order(&[a, b]).unwrap();
        assert!(r[0] < 1e-12);
        assert!(r[1] > r[0] && r[2] > r[1]);
        assert!((r[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn kuramoto_rejects_ragged_rows() {
        let err = kuramoto_order(&[vec![0.0, 1.0], vec![0.0]]).unwrap_err();
        assert!(matches!(err, MetricError::ShapeMismatch { .. }));
        assert!(kuramoto_order(&[]).is_err());
    }

    #[test]
    fn spectral_concentration_of_pure_tone() {
        let fs = 32.0;
        let x: Vec<f64> = (0..64).map(|i| (2.0 * PI * 4.0 * i as f64 / fs).sin()).collect();
        let c = spectral_concentration(&x, fs, 4.0, 0.5);
        assert!(c > 0.99, "pure tone concentration {c}");
        let off = spectral_concentration(&x, fs, 10.0, 0.5);
        assert!(off < 0.01);
    }

    #[test]
    fn spectral_concentration_matches_direct_transform() {
        let fs = 20.0;
        // Odd length exercises a non power-of-two plan.
        let x: Vec<f64> = (0..45)
            .map(|i| {
                let t = i as f64 / fs;
                (2.0 * PI * 3.0 * t).sin() + 0.4 * (2.0 * PI * 7.0 * t).cos() + 0.1 * i as f64
            })
            .collect();
        let fast = spectral_concentration(&x, fs, 3.0, 1.0);
        let slow = naive_band_share(&x, fs, 3.0, 1.0);
        assert!((fast - slow).abs() < 1e-9, "{fast} vs {slow}");
    }

    #[test]
    fn trailing_windows_share_one_planner() {
        let metric = SpectralConcentration {
            fs: 16.0,
            f0: 2.0,
            bandwidth: 0.5,
            window: 32,
        };
        let x: Vec<f64> = (0..200).map(|i| (2.0 * PI * 2.0 * i as f64 / 16.0).sin()).collect();
        let c = metric.coherence(&x).unwrap();
        assert_eq!(c.len(), x.len());
        assert!(c[..7].iter().all(|&v| v == 0.0));
        for (i, &v) in c.iter().enumerate().skip(31) {
            let expected = spectral_concentration(&x[i + 1 - 32..=i], 16.0, 2.0, 0.5);
            assert!((v - expected).abs() < 1e-12);
            assert!(v > 0.9);
        }
    }

    #[test]
    fn spectral_concentration_short_or_silent_is_zero() {
        assert_eq!(spectral_concentration(&[1.0; 4], 10.0, 1.0, 0.1), 0.0);
        assert_eq!(spectral_concentration(&[0.0; 16], 10.0, 1.0, 0.1), 0.0);
    }

    #[test]
    fn compression_gain_clips() {
        let metric = CompressionGain::default();
        let c = metric
            .coherence(&Losses {
                model: vec![0.5, 2.0, 0.0],
                baseline: vec![1.0, 1.0, 1.0],
            })
            .unwrap();
        assert!((c[0] - 0.5).abs() < 1e-9);
        assert_eq!(c[1], 0.0);
        assert!((c[2] - 1.0).abs() < 1e-9);
        assert_eq!(metric.definition(), CoherenceDefinition::CompressionGain);
    }

    #[test]
    fn compression_gain_shape_mismatch() {
        let err = CompressionGain::default()
            .coherence(&Losses {
                model: vec![0.5],
                baseline: vec![1.0, 1.0],
            })
            .unwrap_err();
        assert!(matches!(err, MetricError::ShapeMismatch { .. }));
    }

    #[test]
    fn trailing_phase_concentration_per_step() {
        let metric = PhaseConcentration { window: 2 };
        let c = metric.coherence(&[0.0, PI, PI]).unwrap();
        assert_eq!(c.len(), 3);
        assert!((c[0] - 1.0).abs() < 1e-12);
        assert!(c[1] < 1e-12);
        assert!((c[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn spectral_adapter_validates_parameters() {
        let metric = SpectralConcentration {
            fs: 0.0,
            f0: 1.0,
            bandwidth: 0.1,
            window: 16,
        };
        assert!(metric.coherence(&[0.0; 16]).is_err());
    }
}
