//! Witness projections and boundary integrity per entity.
//!
//! [`BoundaryTracker::witness`] is the only sanctioned way for one entity to
//! see another's state. It asks the consent ledger first and returns `None`
//! on denial before the target's record is looked up.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use harmony_consent::ConsentCheck;
use harmony_types::{Action, EntityId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SafeguardError;
use crate::projection::{pair_seed, rank, Projection};

/// Tracker parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Weight of the leakage proxy in the boundary score, in [0, 1].
    pub leakage_weight: f64,
    /// Base seed for per-pair projection matrices.
    pub seed: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            leakage_weight: 1.0,
            seed: 0x4841_524d_4f4e_5904,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), SafeguardError> {
        if !(0.0..=1.0).contains(&self.leakage_weight) {
            return Err(SafeguardError::InvalidParameter {
                name: "leakage_weight",
                value: self.leakage_weight,
            });
        }
        Ok(())
    }
}

/// A boundary-score decrease that arrived without consent and was not
/// applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryViolation {
    pub entity: EntityId,
    pub previous: f64,
    pub attempted: f64,
    pub at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Clone, Debug)]
struct WitnessChannel {
    projection: Projection,
    declared: bool,
    /// Whether this channel has carried state yet.
    used: bool,
}

#[derive(Clone, Debug)]
struct EntityRecord {
    state: Vec<f64>,
    score: f64,
    /// Keyed by observer.
    channels: BTreeMap<EntityId, WitnessChannel>,
}

impl EntityRecord {
    /// Rank of every row any observer has received, over the state
    /// dimension.
    fn leakage(&self) -> f64 {
        let rows: Vec<Vec<f64>> = self
            .channels
            .values()
            .filter(|c| c.used)
            .flat_map(|c| c.projection.rows().iter().cloned())
            .collect();
        rank(&rows) as f64 / self.state.len() as f64
    }
}

/// Owns every registered entity's state and boundary score.
#[derive(Debug, Default)]
pub struct BoundaryTracker {
    config: TrackerConfig,
    entities: HashMap<EntityId, EntityRecord>,
    violations: Vec<BoundaryViolation>,
}

impl BoundaryTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, SafeguardError> {
        config.validate()?;
        Ok(Self {
            config,
            entities: HashMap::new(),
            violations: Vec::new(),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Start a session for `entity` with a full boundary score of 1.
    pub fn register(&mut self, entity: &EntityId, state: Vec<f64>) -> Result<(), SafeguardError> {
        if self.entities.contains_key(entity) {
            return Err(SafeguardError::AlreadyRegistered(entity.clone()));
        }
        validate_state(entity, &state)?;
        debug!(entity = %entity, dim = state.len(), "Entity registered");
        self.entities.insert(
            entity.clone(),
            EntityRecord {
                state,
                score: 1.0,
                channels: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Replace the internal state; the dimension is fixed at registration.
    pub fn update_state(&mut self, entity: &EntityId, state: Vec<f64>) -> Result<(), SafeguardError> {
        let record = self.record_mut(entity)?;
        if state.len() != record.state.len() {
            return Err(SafeguardError::DimensionMismatch {
                entity: entity.clone(),
                expected: record.state.len(),
                actual: state.len(),
            });
        }
        validate_state(entity, &state)?;
        record.state = state;
        Ok(())
    }

    /// Forget the entity's state, score and witness channels. Recorded
    /// violations stay for audit.
    pub fn end_session(&mut self, entity: &EntityId) -> bool {
        let removed = self.entities.remove(entity).is_some();
        if removed {
            info!(entity = %entity, "Session ended");
        }
        removed
    }

    pub fn is_registered(&self, entity: &EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn state_dim(&self, entity: &EntityId) -> Option<usize> {
        self.entities.get(entity).map(|r| r.state.len())
    }

    pub fn boundary_score(&self, entity: &EntityId) -> Option<f64> {
        self.entities.get(entity).map(|r| r.score)
    }

    /// Current leakage proxy in [0, 1] for `entity`.
    pub fn leakage(&self, entity: &EntityId) -> Option<f64> {
        self.entities.get(entity).map(EntityRecord::leakage)
    }

    /// Observers that have received at least one projection of `entity`.
    pub fn witnesses_of(&self, entity: &EntityId) -> Vec<EntityId> {
        self.entities
            .get(entity)
            .map(|r| {
                r.channels
                    .iter()
                    .filter(|(_, c)| c.used)
                    .map(|(observer, _)| observer.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fix the matrix `observer` will see `target` through, instead of a
    /// seeded random one.
    pub fn declare_projection(
        &mut self,
        target: &EntityId,
        observer: &EntityId,
        projection: Projection,
    ) -> Result<(), SafeguardError> {
        let record = self.record_mut(target)?;
        if projection.source_dim() != record.state.len() {
            return Err(SafeguardError::DimensionMismatch {
                entity: target.clone(),
                expected: record.state.len(),
                actual: projection.source_dim(),
            });
        }
        record.channels.insert(
            observer.clone(),
            WitnessChannel {
                projection,
                declared: true,
                used: false,
            },
        );
        Ok(())
    }

    /// Project `target`'s state into `projection_dim` dimensions for
    /// `observer`.
    ///
    /// Returns `Ok(None)` unless `target` has granted `observer` the
    /// `observe` action. A successful call recomputes the target's leakage
    /// and lowers its boundary score accordingly; that decrease is covered
    /// by the observe grant.
    pub fn witness(
        &mut self,
        consent: &dyn ConsentCheck,
        observer: &EntityId,
        target: &EntityId,
        projection_dim: usize,
    ) -> Result<Option<Vec<f64>>, SafeguardError> {
        if !consent.permits(target, observer, &Action::observe()) {
            debug!(observer = %observer, target = %target, "Witness denied: no observe consent");
            return Ok(None);
        }

        let seed = pair_seed(self.config.seed, target.as_str(), observer.as_str());
        let weight = self.config.leakage_weight;
        let record = self.record_mut(target)?;
        let state_dim = record.state.len();
        if projection_dim == 0 || projection_dim >= state_dim {
            return Err(SafeguardError::InvalidProjection {
                projection_dim,
                state_dim,
            });
        }

        let fresh = || -> Result<WitnessChannel, SafeguardError> {
            Ok(WitnessChannel {
                projection: Projection::seeded(projection_dim, state_dim, seed)?,
                declared: false,
                used: false,
            })
        };
        let channel = match record.channels.entry(observer.clone()) {
            Entry::Occupied(entry) if entry.get().projection.target_dim() == projection_dim => {
                entry.into_mut()
            }
            Entry::Occupied(entry) if entry.get().declared => {
                return Err(SafeguardError::ProjectionMismatch {
                    declared: entry.get().projection.target_dim(),
                    requested: projection_dim,
                });
            }
            Entry::Occupied(mut entry) => {
                entry.insert(fresh()?);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(fresh()?),
        };
        channel.used = true;
        let projected = channel.projection.project(&record.state).ok_or(
            SafeguardError::DimensionMismatch {
                entity: target.clone(),
                expected: channel.projection.source_dim(),
                actual: state_dim,
            },
        )?;

        let leakage = record.leakage();
        let score = (1.0 - weight * leakage).clamp(0.0, 1.0);
        if score < record.score {
            debug!(
                target = %target,
                observer = %observer,
                previous = record.score,
                score,
                leakage,
                "Boundary score lowered by consented witness"
            );
            record.score = score;
        }
        Ok(Some(projected))
    }

    /// Apply an externally measured boundary score.
    ///
    /// Increases always apply. A decrease applies only when `consented`;
    /// otherwise it is recorded as a violation, logged, and the score is
    /// left unchanged.
    pub fn record_boundary_score(
        &mut self,
        entity: &EntityId,
        score: f64,
        consented: bool,
    ) -> Result<Option<BoundaryViolation>, SafeguardError> {
        if !(0.0..=1.0).contains(&score) {
            return Err(SafeguardError::InvalidParameter {
                name: "boundary_score",
                value: score,
            });
        }
        let record = self.record_mut(entity)?;
        let previous = record.score;
        if score >= previous || consented {
            record.score = score;
            return Ok(None);
        }

        let violation = BoundaryViolation {
            entity: entity.clone(),
            previous,
            attempted: score,
            at: Utc::now(),
            reason: format!(
                "boundary degraded without consent ({previous:.4} -> {score:.4})"
            ),
        };
        warn!(
            entity = %entity,
            previous,
            attempted = score,
            "Boundary violation: unconsented decrease not applied"
        );
        self.violations.push(violation.clone());
        Ok(Some(violation))
    }

    pub fn violations(&self) -> &[BoundaryViolation] {
        &self.violations
    }

    pub fn violations_for<'a>(
        &'a self,
        entity: &'a EntityId,
    ) -> impl Iterator<Item = &'a BoundaryViolation> + 'a {
        self.violations.iter().filter(move |v| &v.entity == entity)
    }

    fn record_mut(&mut self, entity: &EntityId) -> Result<&mut EntityRecord, SafeguardError> {
        self.entities
            .get_mut(entity)
            .ok_or_else(|| SafeguardError::UnknownEntity(entity.clone()))
    }
}

fn validate_state(entity: &EntityId, state: &[f64]) -> Result<(), SafeguardError> {
    if state.is_empty() || state.iter().any(|v| !v.is_finite()) {
        return Err(SafeguardError::InvalidState(entity.clone()));
    }
    Ok(())
}
