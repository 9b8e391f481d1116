use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::SafeguardError;

const RANK_TOLERANCE: f64 = 1e-9;

/// A lossy linear map from a target's state to what one observer sees.
///
/// Always has fewer rows than columns, so it cannot be inverted to recover
/// the full state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    rows: Vec<Vec<f64>>,
    source_dim: usize,
}

impl Projection {
    /// A declared projection matrix, one row per output dimension.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, SafeguardError> {
        let source_dim = rows.first().map_or(0, Vec::len);
        if rows.is_empty() || rows.len() >= source_dim {
            return Err(SafeguardError::InvalidProjection {
                projection_dim: rows.len(),
                state_dim: source_dim,
            });
        }
        for row in &rows {
            if row.len() != source_dim {
                return Err(SafeguardError::InvalidProjection {
                    projection_dim: rows.len(),
                    state_dim: row.len(),
                });
            }
            if let Some(bad) = row.iter().find(|v| !v.is_finite()) {
                return Err(SafeguardError::InvalidParameter {
                    name: "projection",
                    value: *bad,
                });
            }
        }
        Ok(Self { rows, source_dim })
    }

    /// Gaussian random rows of unit norm, reproducible from `seed`.
    pub fn seeded(
        target_dim: usize,
        source_dim: usize,
        seed: u64,
    ) -> Result<Self, SafeguardError> {
        if target_dim == 0 || target_dim >= source_dim {
            return Err(SafeguardError::InvalidProjection {
                projection_dim: target_dim,
                state_dim: source_dim,
            });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let rows = (0..target_dim)
            .map(|_| {
                let mut row: Vec<f64> = (0..source_dim).map(|_| standard_normal(&mut rng)).collect();
                let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
                if norm > 0.0 {
                    row.iter_mut().for_each(|v| *v /= norm);
                }
                row
            })
            .collect();
        Ok(Self { rows, source_dim })
    }

    pub fn target_dim(&self) -> usize {
        self.rows.len()
    }

    pub fn source_dim(&self) -> usize {
        self.source_dim
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// `None` when the state does not have `source_dim` components.
    pub fn project(&self, state: &[f64]) -> Option<Vec<f64>> {
        if state.len() != self.source_dim {
            return None;
        }
        Some(
            self.rows
                .iter()
                .map(|row| row.iter().zip(state).map(|(a, b)| a * b).sum())
                .collect(),
        )
    }

    /// Fraction of state dimensions this projection drops.
    pub fn information_loss(&self) -> f64 {
        1.0 - self.target_dim() as f64 / self.source_dim as f64
    }

    pub fn is_invertible(&self) -> bool {
        rank(&self.rows) == self.source_dim
    }
}

/// Numerical rank of a set of row vectors by Gaussian elimination with
/// partial pivoting.
pub fn rank(rows: &[Vec<f64>]) -> usize {
    let Some(cols) = rows.first().map(Vec::len) else {
        return 0;
    };
    let mut m: Vec<Vec<f64>> = rows.to_vec();
    let scale = m
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
        .max(1.0);
    let mut rank = 0;
    for col in 0..cols {
        if rank == m.len() {
            break;
        }
        let pivot = (rank..m.len())
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(rank);
        if m[pivot][col].abs() <= RANK_TOLERANCE * scale {
            continue;
        }
        m.swap(rank, pivot);
        let pivot_row = m[rank].clone();
        for row in m.iter_mut().skip(rank + 1) {
            let factor = row[col] / pivot_row[col];
            if factor != 0.0 {
                for (v, p) in row.iter_mut().zip(&pivot_row).skip(col) {
                    *v -= factor * p;
                }
            }
        }
        rank += 1;
    }
    rank
}

/// FNV-1a over both ids, mixed with the tracker seed, so every
/// (target, observer) pair gets its own stable matrix.
pub(crate) fn pair_seed(base: u64, target: &str, observer: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET ^ base;
    for byte in target.bytes().chain([0u8]).chain(observer.bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Box-Muller transform over two uniform draws.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}
