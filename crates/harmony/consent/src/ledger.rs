use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use harmony_types::{Action, EntityId, EventId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::record::{ConsentEvent, ConsentStatus, Transition};
use crate::sink::AuditSink;

/// How much of the audit trail stays in memory.
///
/// Eviction only trims the log. The current status of every triple is held
/// separately, so evicting history never changes what is authorized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditRetention {
    Unbounded,
    /// Keep the newest `n` events, dropping the oldest first.
    KeepLatest(usize),
}

impl Default for AuditRetention {
    fn default() -> Self {
        AuditRetention::KeepLatest(10_000)
    }
}

/// Anything that can answer "has `grantor` granted `grantee` this action".
pub trait ConsentCheck {
    fn permits(&self, grantor: &EntityId, grantee: &EntityId, action: &Action) -> bool;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TripleKey {
    grantor: EntityId,
    grantee: EntityId,
    action: Action,
}

#[derive(Clone, Copy, Debug)]
struct Current {
    status: ConsentStatus,
    at: DateTime<Utc>,
}

/// Consent state machine over (grantor, grantee, action) triples.
///
/// - Every triple starts `Unset`, which authorizes nothing.
/// - `grant` moves to `Granted`; `deny` and `revoke` move to `Denied` from
///   any state. Nothing is irreversible.
/// - Among events for one triple the latest timestamp wins; equal
///   timestamps resolve by arrival order.
/// - Calls without an explicit timestamp are stamped no earlier than the
///   triple's current decision, so a wall-clock `revoke` or `deny` always
///   takes effect, even against a future-dated grant or a clock step back.
/// - Consent never chains: grants A→B and B→C say nothing about A→C.
/// - Every call appends an audit event; no operation deletes history
///   except the configured retention bound.
pub struct ConsentLedger {
    current: HashMap<TripleKey, Current>,
    log: VecDeque<ConsentEvent>,
    retention: AuditRetention,
    evicted: u64,
    next_sequence: u64,
    entities: BTreeSet<EntityId>,
    sink: Option<Box<dyn AuditSink>>,
}

impl ConsentLedger {
    pub fn new() -> Self {
        Self::with_retention(AuditRetention::default())
    }

    pub fn with_retention(retention: AuditRetention) -> Self {
        Self {
            current: HashMap::new(),
            log: VecDeque::new(),
            retention,
            evicted: 0,
            next_sequence: 0,
            entities: BTreeSet::new(),
            sink: None,
        }
    }

    /// Forward every event to `sink` before it can be evicted.
    pub fn with_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    pub fn grant(&mut self, grantor: &EntityId, grantee: &EntityId, action: &Action) -> EventId {
        let at = self.wall_clock(grantor, grantee, action);
        self.grant_at(grantor, grantee, action, at)
    }

    pub fn grant_at(
        &mut self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
        at: DateTime<Utc>,
    ) -> EventId {
        self.record(grantor, grantee, action, Transition::Grant, at, None)
    }

    /// Grant limited to a caller-defined scope. The scope is recorded for
    /// audit; authorization is still per triple.
    pub fn grant_scoped(
        &mut self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
        scope: impl Into<String>,
    ) -> EventId {
        let at = self.wall_clock(grantor, grantee, action);
        self.record(
            grantor,
            grantee,
            action,
            Transition::Grant,
            at,
            Some(scope.into()),
        )
    }

    pub fn deny(&mut self, grantor: &EntityId, grantee: &EntityId, action: &Action) -> EventId {
        let at = self.wall_clock(grantor, grantee, action);
        self.deny_at(grantor, grantee, action, at)
    }

    pub fn deny_at(
        &mut self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
        at: DateTime<Utc>,
    ) -> EventId {
        self.record(grantor, grantee, action, Transition::Deny, at, None)
    }

    pub fn revoke(&mut self, grantor: &EntityId, grantee: &EntityId, action: &Action) -> EventId {
        let at = self.wall_clock(grantor, grantee, action);
        self.revoke_at(grantor, grantee, action, at)
    }

    pub fn revoke_at(
        &mut self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
        at: DateTime<Utc>,
    ) -> EventId {
        self.record(grantor, grantee, action, Transition::Revoke, at, None)
    }

    /// `Utc::now()`, raised to the current decision's timestamp if that one
    /// is later.
    fn wall_clock(&self, grantor: &EntityId, grantee: &EntityId, action: &Action) -> DateTime<Utc> {
        let now = Utc::now();
        let key = TripleKey {
            grantor: grantor.clone(),
            grantee: grantee.clone(),
            action: action.clone(),
        };
        match self.current.get(&key) {
            Some(existing) if existing.at > now => {
                debug!(
                    grantor = %grantor,
                    grantee = %grantee,
                    action = %action,
                    current = %existing.at,
                    "wall clock behind current decision, stamping at its timestamp"
                );
                existing.at
            }
            _ => now,
        }
    }

    fn record(
        &mut self,
        grantor: &EntityId,
        grantee: &EntityId,
        action: &Action,
        transition: Transition,
        at: DateTime<Utc>,
        scope: Option<String>,
    ) -> EventId {
        let key = TripleKey {
            grantor: grantor.clone(),
            grantee: grantee.clone(),
            action: action.clone(),
        };
        let status = transition.resulting_status();

        // Later arrivals win ties, so only a strictly newer decision blocks.
        let applied = match self.current.get(&key) {
            Some(existing) => at >= existing.at,
            None => true,
        };
        if applied {
            self.current.insert(key, Current { status, at });
        }

        let event = ConsentEvent {
            id: EventId::new(),
            sequence: self.next_sequence,
            grantor: grantor.clone(),
            grantee: grantee.clone(),
            action: action.clone(),
            transition,
            at,
            scope,
            applied,
        };
        self.next_sequence += 1;
        self.entities.insert(grantor.clone());
        self.entities.insert(grantee.clone());

        if applied {
            info!(
                event = %event.id,
                grantor = %grantor,
                grantee = %grantee,
                action = %action,
                %transition,
                "consent transition"
            );
        } else {
            info!(
                event = %event.id,
                grantor = %grantor,
                grantee = %grantee,
                action = %action,
                %transition,
                "stale consent event logged without superseding newer decision"
            );
        }

        if let Some(sink) = &self.sink {
            if let Err(err) = sink.write(&event) {
                error!(event = %event.id, error = %err, "audit sink rejected consent event");
            }
        }

        let id = event.id;
        self.log.push_back(event);
        self.enforce_retention();
        id
    }

    fn enforce_retention(&mut self) {
        if let AuditRetention::KeepLatest(limit) = self.retention {
            let excess = self.log.len().saturating_sub(limit);
            if excess > 0 {
                self.log.drain(..excess);
                self.evicted += excess as u64;
                debug!(dropped = excess, total = self.evicted, limit, "consent audit log trimmed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn status(&self, grantor: &EntityId, grantee: &EntityId, action: &Action) -> ConsentStatus {
        let key = TripleKey {
            grantor: grantor.clone(),
            grantee: grantee.clone(),
            action: action.clone(),
        };
        self.current
            .get(&key)
            .map_or(ConsentStatus::Unset, |c| c.status)
    }

    /// Whether consent is currently granted. Unset and denied are both false.
    pub fn check(&self, grantor: &EntityId, grantee: &EntityId, action: &Action) -> bool {
        self.status(grantor, grantee, action).is_granted()
    }

    /// Both directions granted.
    pub fn check_mutual(&self, a: &EntityId, b: &EntityId, action: &Action) -> bool {
        self.check(a, b, action) && self.check(b, a, action)
    }

    /// Whether `action` may flow from `from` through `via` to `to`.
    ///
    /// Requires `from → via` and `via → to` for the action, plus an explicit
    /// `from → to` grant of `indirect-share`. The two direct grants alone are
    /// never enough.
    pub fn propagate_indirect(
        &self,
        from: &EntityId,
        via: &EntityId,
        to: &EntityId,
        action: &Action,
    ) -> bool {
        self.check(from, via, action)
            && self.check(via, to, action)
            && self.check(from, to, &Action::indirect_share())
    }

    /// Retained audit events, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &ConsentEvent> {
        self.log.iter()
    }

    /// Retained events where `entity` is grantor or grantee.
    pub fn audit_entity<'a>(
        &'a self,
        entity: &'a EntityId,
    ) -> impl Iterator<Item = &'a ConsentEvent> + 'a {
        self.log.iter().filter(move |e| e.involves(entity))
    }

    /// Every entity that has taken part in a consent event.
    pub fn entities(&self) -> &BTreeSet<EntityId> {
        &self.entities
    }

    /// Events dropped from memory by the retention bound.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Events recorded since creation, retained or not.
    pub fn total_events(&self) -> u64 {
        self.next_sequence
    }

    pub fn retention(&self) -> AuditRetention {
        self.retention
    }
}

impl Default for ConsentLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConsentLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentLedger")
            .field("triples", &self.current.len())
            .field("retained", &self.log.len())
            .field("evicted", &self.evicted)
            .field("retention", &self.retention)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl ConsentCheck for ConsentLedger {
    fn permits(&self, grantor: &EntityId, grantee: &EntityId, action: &Action) -> bool {
        self.check(grantor, grantee, action)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::sink::MemoryAuditSink;

    fn ids() -> (EntityId, EntityId, EntityId) {
        (
            EntityId::from("alice"),
            EntityId::from("bob"),
            EntityId::from("carol"),
        )
    }

    #[test]
    fn absence_of_consent_is_denial() {
        let ledger = ConsentLedger::new();
        let (a, b, _) = ids();
        assert_eq!(ledger.status(&a, &b, &Action::observe()), ConsentStatus::Unset);
        assert!(!ledger.check(&a, &b, &Action::observe()));
    }

    #[test]
    fn grant_then_revoke() {
        let mut ledger = ConsentLedger::new();
        let (a, b, _) = ids();
        let observe = Action::observe();
        ledger.grant(&a, &b, &observe);
        assert!(ledger.check(&a, &b, &observe));
        ledger.revoke(&a, &b, &observe);
        assert!(!ledger.check(&a, &b, &observe));
        assert_eq!(ledger.status(&a, &b, &observe), ConsentStatus::Denied);
        assert_eq!(ledger.history().count(), 2);
    }

    #[test]
    fn consent_is_directional_and_per_action() {
        let mut ledger = ConsentLedger::new();
        let (a, b, _) = ids();
        ledger.grant(&a, &b, &Action::observe());
        assert!(!ledger.check(&b, &a, &Action::observe()));
        assert!(!ledger.check(&a, &b, &Action::analyze()));
        assert!(!ledger.check_mutual(&a, &b, &Action::observe()));
        ledger.grant(&b, &a, &Action::observe());
        assert!(ledger.check_mutual(&a, &b, &Action::observe()));
    }

    #[test]
    fn indirect_flow_needs_explicit_record() {
        let mut ledger = ConsentLedger::new();
        let (a, b, c) = ids();
        let share = Action::new("share");
        ledger.grant(&a, &b, &share);
        ledger.grant(&b, &c, &share);
        assert!(!ledger.check(&a, &c, &share));
        assert!(!ledger.propagate_indirect(&a, &b, &c, &share));

        ledger.grant(&a, &c, &Action::indirect_share());
        assert!(ledger.propagate_indirect(&a, &b, &c, &share));
        // Still no direct grant.
        assert!(!ledger.check(&a, &c, &share));

        ledger.revoke(&b, &c, &share);
        assert!(!ledger.propagate_indirect(&a, &b, &c, &share));
    }

    #[test]
    fn older_event_does_not_supersede() {
        let mut ledger = ConsentLedger::new();
        let (a, b, _) = ids();
        let observe = Action::observe();
        let now = Utc::now();
        ledger.revoke_at(&a, &b, &observe, now);
        ledger.grant_at(&a, &b, &observe, now - Duration::seconds(5));
        assert!(!ledger.check(&a, &b, &observe));
        let events: Vec<_> = ledger.history().collect();
        assert!(events[0].applied);
        assert!(!events[1].applied);
    }

    #[test]
    fn wall_clock_revoke_beats_future_dated_grant() {
        let mut ledger = ConsentLedger::new();
        let (a, b, _) = ids();
        let observe = Action::observe();
        let ahead = Utc::now() + Duration::seconds(60);
        ledger.grant_at(&a, &b, &observe, ahead);
        assert!(ledger.check(&a, &b, &observe));

        ledger.revoke(&a, &b, &observe);
        assert!(!ledger.check(&a, &b, &observe));
        let revoke = ledger.history().last().unwrap();
        assert!(revoke.applied);
        assert!(revoke.at >= ahead);

        ledger.grant(&a, &b, &observe);
        assert!(ledger.check(&a, &b, &observe));
        ledger.deny(&a, &b, &observe);
        assert!(!ledger.check(&a, &b, &observe));
    }

    #[test]
    fn equal_timestamps_resolve_by_arrival() {
        let mut ledger = ConsentLedger::new();
        let (a, b, _) = ids();
        let observe = Action::observe();
        let now = Utc::now();
        ledger.grant_at(&a, &b, &observe, now);
        ledger.deny_at(&a, &b, &observe, now);
        assert!(!ledger.check(&a, &b, &observe));
        ledger.grant_at(&a, &b, &observe, now);
        assert!(ledger.check(&a, &b, &observe));
    }

    #[test]
    fn retention_evicts_history_not_authorization() {
        let mut ledger = ConsentLedger::with_retention(AuditRetention::KeepLatest(2));
        let (a, b, c) = ids();
        ledger.grant(&a, &b, &Action::observe());
        ledger.grant(&a, &c, &Action::observe());
        ledger.grant(&b, &c, &Action::observe());
        assert_eq!(ledger.history().count(), 2);
        assert_eq!(ledger.evicted(), 1);
        assert_eq!(ledger.total_events(), 3);
        // The evicted grant still authorizes.
        assert!(ledger.check(&a, &b, &Action::observe()));
    }

    #[test]
    fn sink_sees_every_event_before_eviction() {
        let sink = Arc::new(MemoryAuditSink::new());
        let mut ledger = ConsentLedger::with_retention(AuditRetention::KeepLatest(1))
            .with_sink(Box::new(Arc::clone(&sink)));
        let (a, b, _) = ids();
        for _ in 0..3 {
            ledger.grant(&a, &b, &Action::observe());
        }
        assert_eq!(sink.len(), 3);
        assert_eq!(ledger.history().count(), 1);
        let sequences: Vec<u64> = sink.entries().unwrap().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn audit_by_entity() {
        let mut ledger = ConsentLedger::with_retention(AuditRetention::Unbounded);
        let (a, b, c) = ids();
        ledger.grant(&a, &b, &Action::observe());
        ledger.grant_scoped(&b, &c, &Action::analyze(), "session-1");
        ledger.revoke(&a, &b, &Action::observe());
        assert_eq!(ledger.audit_entity(&a).count(), 2);
        assert_eq!(ledger.audit_entity(&c).count(), 1);
        let scoped = ledger.audit_entity(&c).next().unwrap();
        assert_eq!(scoped.scope.as_deref(), Some("session-1"));
        assert_eq!(ledger.entities().len(), 3);
    }
}
