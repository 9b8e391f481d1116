use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use harmony_consent::{ConsentCheck, ConsentLedger, SharedConsentLedger};
use harmony_invariants::{LovesProofEvaluator, Verdict};
use harmony_safeguards::{
    BoundaryEnforcer, BoundaryGuard, BoundaryTracker, BoundaryViolation, CoherenceTrend,
    DriftDetector, DriftEvent, DriftKind, DriftLog, GuardCheck, MetricValue, SafeguardError,
};
use harmony_signal::Trend;
use harmony_types::{Action, EntityId, EventId, TimeSeries};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::EngineResult;

/// Outcome of recording a measured boundary score.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryReport {
    /// Present when the reading was an unconsented decrease and was not
    /// applied.
    pub violation: Option<BoundaryViolation>,
    pub check: GuardCheck,
    /// Score held by the tracker after the reading.
    pub score: f64,
}

/// One engine per session: owns the consent ledger handle, entity
/// boundaries, the Love's Proof evaluator and drift monitoring.
///
/// Every read of one entity's data on behalf of another goes through the
/// ledger first.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    ledger: SharedConsentLedger,
    tracker: BoundaryTracker,
    guards: HashMap<EntityId, BoundaryGuard>,
    enforcer: BoundaryEnforcer,
    evaluator: LovesProofEvaluator,
    drift: DriftDetector,
    drift_log: DriftLog,
    /// Recent readings of phase metrics, by metric name.
    coherence: HashMap<String, CoherenceTrend>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let ledger =
            SharedConsentLedger::new(ConsentLedger::with_retention(config.consent.retention()));
        Self::with_ledger(config, ledger)
    }

    /// Build an engine around an existing ledger, e.g. one shared with other
    /// engines.
    pub fn with_ledger(config: EngineConfig, ledger: SharedConsentLedger) -> EngineResult<Self> {
        config.validate()?;
        let engine = Self {
            tracker: BoundaryTracker::new(config.boundary.tracker.clone())?,
            guards: HashMap::new(),
            enforcer: BoundaryEnforcer::new(config.boundary.enforcer.clone())?,
            evaluator: LovesProofEvaluator::new(config.loves_proof())?,
            drift: DriftDetector::new(config.drift.clone())?,
            drift_log: DriftLog::with_capacity(config.drift.log_capacity),
            coherence: HashMap::new(),
            ledger,
            config,
        };
        info!(
            window = ?engine.config.signal.window,
            alpha = engine.config.signal.alpha,
            "Harmony engine ready"
        );
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &SharedConsentLedger {
        &self.ledger
    }

    pub fn tracker(&self) -> &BoundaryTracker {
        &self.tracker
    }

    pub fn evaluator(&self) -> &LovesProofEvaluator {
        &self.evaluator
    }

    // ------------------------------------------------------------------
    // Consent
    // ------------------------------------------------------------------

    pub fn grant(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
    ) -> EngineResult<EventId> {
        Ok(self.ledger.grant(grantor, grantee, action)?)
    }

    pub fn revoke(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
    ) -> EngineResult<EventId> {
        Ok(self.ledger.revoke(grantor, grantee, action)?)
    }

    pub fn deny(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
    ) -> EngineResult<EventId> {
        Ok(self.ledger.deny(grantor, grantee, action)?)
    }

    pub fn check(
        &self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
    ) -> EngineResult<bool> {
        Ok(self.ledger.check(grantor, grantee, action)?)
    }

    // ------------------------------------------------------------------
    // Entities and boundaries
    // ------------------------------------------------------------------

    pub fn register(&mut self, entity: &EntityId, state: Vec<f64>) -> EngineResult<()> {
        Ok(self.tracker.register(entity, state)?)
    }

    pub fn update_state(&mut self, entity: &EntityId, state: Vec<f64>) -> EngineResult<()> {
        Ok(self.tracker.update_state(entity, state)?)
    }

    /// Reset everything held for `entity`. Consent records are kept; they
    /// belong to the ledger's audit trail.
    pub fn end_session(&mut self, entity: &EntityId) -> bool {
        self.guards.remove(entity);
        self.tracker.end_session(entity)
    }

    pub fn boundary_score(&self, entity: &EntityId) -> Option<f64> {
        self.tracker.boundary_score(entity)
    }

    /// Consent-gated lossy view of `target` for `observer`; `None` without
    /// an `observe` grant from `target`.
    pub fn witness(
        &mut self,
        observer: &EntityId,
        target: &EntityId,
        projection_dim: usize,
    ) -> EngineResult<Option<Vec<f64>>> {
        Ok(self
            .tracker
            .witness(&self.ledger, observer, target, projection_dim)?)
    }

    /// Feed a measured boundary score through the tracker and the entity's
    /// guard.
    pub fn record_boundary_score(
        &mut self,
        entity: &EntityId,
        score: f64,
        consented: bool,
    ) -> EngineResult<BoundaryReport> {
        let previous = self.tracker.boundary_score(entity);
        let violation = self.tracker.record_boundary_score(entity, score, consented)?;
        let guard = match self.guards.entry(entity.clone()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                slot.insert(BoundaryGuard::new(self.config.boundary.guard.clone())?)
            }
        };
        let check = guard.check(score, previous, consented);
        Ok(BoundaryReport {
            violation,
            check,
            score: self.tracker.boundary_score(entity).unwrap_or(score),
        })
    }

    /// Whether `entity` can take one more witness share, given its current
    /// score and the observers that already hold a channel.
    pub fn can_share_state(&self, entity: &EntityId) -> EngineResult<GuardCheck> {
        let score = self.known_score(entity)?;
        let shares = self.tracker.witnesses_of(entity).len();
        Ok(self.enforcer.can_share_state(score, shares)?)
    }

    /// Whether `entity` can accept a coupling of `strength`.
    pub fn can_accept_coupling(&self, entity: &EntityId, strength: f64) -> EngineResult<GuardCheck> {
        let score = self.known_score(entity)?;
        Ok(self.enforcer.can_accept_coupling(score, strength)?)
    }

    fn known_score(&self, entity: &EntityId) -> Result<f64, SafeguardError> {
        self.tracker
            .boundary_score(entity)
            .ok_or_else(|| SafeguardError::UnknownEntity(entity.clone()))
    }

    /// Direction of the last `window` measured scores for `entity`.
    pub fn boundary_trend(&self, entity: &EntityId, window: usize) -> Trend {
        self.guards
            .get(entity)
            .map_or(Trend::InsufficientData, |g| g.trend(window))
    }

    // ------------------------------------------------------------------
    // Invariants
    // ------------------------------------------------------------------

    /// Evaluate Love's Proof over the configured window.
    pub fn evaluate(
        &self,
        c: &TimeSeries,
        s: &TimeSeries,
        x: &TimeSeries,
    ) -> EngineResult<Verdict> {
        let verdict = self
            .evaluator
            .evaluate(c, s, x, self.config.signal.window())?;
        log_verdict(&verdict);
        Ok(verdict)
    }

    /// Evaluate `subject`'s series on behalf of `observer`.
    ///
    /// Returns `Ok(None)` before touching any series unless `subject` has
    /// granted `observer` the `analyze` action.
    pub fn evaluate_for(
        &self,
        observer: &EntityId,
        subject: &EntityId,
        c: &TimeSeries,
        s: &TimeSeries,
        x: &TimeSeries,
    ) -> EngineResult<Option<Verdict>> {
        if !self.analysis_permitted(observer, subject) {
            return Ok(None);
        }
        self.evaluate(c, s, x).map(Some)
    }

    /// Sliding evaluation of `subject`'s series on behalf of `observer`.
    ///
    /// Windows default to the whole series and steps to the window width.
    pub fn evaluate_continuous_for(
        &self,
        observer: &EntityId,
        subject: &EntityId,
        c: &TimeSeries,
        s: &TimeSeries,
        x: &TimeSeries,
    ) -> EngineResult<Option<Vec<Verdict>>> {
        if !self.analysis_permitted(observer, subject) {
            return Ok(None);
        }
        let width = self.config.signal.window.unwrap_or_else(|| c.duration());
        let step = self.config.signal.step.unwrap_or(width);
        let verdicts = self.evaluator.evaluate_continuous(c, s, x, width, step)?;
        verdicts.iter().for_each(log_verdict);
        Ok(Some(verdicts))
    }

    fn analysis_permitted(&self, observer: &EntityId, subject: &EntityId) -> bool {
        let permitted = self.ledger.permits(subject, observer, &Action::analyze());
        if !permitted {
            debug!(observer = %observer, subject = %subject, "Evaluation denied: no analyze consent");
        }
        permitted
    }

    // ------------------------------------------------------------------
    // Drift
    // ------------------------------------------------------------------

    pub fn set_baseline(
        &mut self,
        metric: &str,
        kind: DriftKind,
        value: impl Into<MetricValue>,
    ) -> EngineResult<()> {
        Ok(self.drift.set_baseline(metric, kind, value.into())?)
    }

    pub fn set_drift_threshold(&mut self, metric: &str, threshold: f64) -> EngineResult<()> {
        Ok(self.drift.set_threshold(metric, threshold)?)
    }

    /// Compare against the metric's baseline; a crossing is also appended
    /// to the drift log and phase readings feed the metric's coherence
    /// trend. Nothing else changes.
    pub fn check_drift(
        &mut self,
        metric: &str,
        current: impl Into<MetricValue>,
    ) -> EngineResult<Option<DriftEvent>> {
        let current = current.into();
        let event = self.drift.check(metric, &current)?;
        if let (Some(DriftKind::Phase), MetricValue::Scalar(value)) =
            (self.drift.kind(metric), &current)
        {
            let window = self.config.drift.trend_window;
            self.coherence
                .entry(metric.to_string())
                .or_insert_with(|| CoherenceTrend::new(window))
                .record(*value);
        }
        if let Some(event) = &event {
            self.drift_log.record(event.clone());
        }
        Ok(event)
    }

    /// Direction of the phase readings checked for `metric`.
    pub fn coherence_trend(&self, metric: &str) -> Trend {
        self.coherence
            .get(metric)
            .map_or(Trend::InsufficientData, CoherenceTrend::trend)
    }

    pub fn drift_events(
        &self,
        kind: Option<DriftKind>,
        since: Option<DateTime<Utc>>,
    ) -> Vec<&DriftEvent> {
        self.drift_log.events(kind, since)
    }

    pub fn drift_log(&self) -> &DriftLog {
        &self.drift_log
    }
}

fn log_verdict(verdict: &Verdict) {
    if verdict.holds {
        debug!(
            g_mean = verdict.g_mean,
            s_slope = verdict.s_slope,
            p_slope = verdict.p_slope,
            "Love's Proof holds"
        );
    } else {
        info!(
            reason = ?verdict.reason,
            g_mean = verdict.g_mean,
            s_slope = verdict.s_slope,
            p_slope = verdict.p_slope,
            clamped_c = verdict.clamped_c,
            "Love's Proof inconclusive, flagged for review"
        );
    }
}
