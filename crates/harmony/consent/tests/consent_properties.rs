//! Property tests for consent monotonicity and non-transitivity.

use chrono::{Duration, TimeZone, Utc};
use harmony_consent::{AuditRetention, ConsentLedger, ConsentStatus};
use harmony_types::{Action, EntityId};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Grant(usize, usize),
    Revoke(usize, usize),
    Deny(usize, usize),
    Check(usize, usize),
    /// Grant stamped `secs` into the future.
    GrantAhead(usize, usize, i64),
}

fn entity(i: usize) -> EntityId {
    EntityId::new(format!("e{i}"))
}

fn arb_op(n: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..n, 0..n).prop_map(|(a, b)| Op::Grant(a, b)),
        (0..n, 0..n).prop_map(|(a, b)| Op::Revoke(a, b)),
        (0..n, 0..n).prop_map(|(a, b)| Op::Deny(a, b)),
        (0..n, 0..n).prop_map(|(a, b)| Op::Check(a, b)),
        (0..n, 0..n, 1i64..3600).prop_map(|(a, b, secs)| Op::GrantAhead(a, b, secs)),
    ]
}

// ----------------------------------------------------------------------------
// Monotonicity
// ----------------------------------------------------------------------------

proptest! {
    /// After a revoke, a triple stays denied until an explicit grant on that
    /// same triple, whatever else happens in between. Future-dated grants do
    /// not shield a triple from a later wall-clock revoke.
    #[test]
    fn revoke_holds_until_regrant(ops in prop::collection::vec(arb_op(4), 1..80)) {
        let mut ledger = ConsentLedger::with_retention(AuditRetention::KeepLatest(16));
        let observe = Action::observe();
        let target = (entity(0), entity(1));
        ledger.grant(&target.0, &target.1, &observe);
        ledger.revoke(&target.0, &target.1, &observe);

        let mut regranted = false;
        // Timestamp of the decision currently in force on the target triple.
        let mut decided = ledger.history().last().unwrap().at;
        for op in ops {
            let touches_target = match op {
                Op::Grant(a, b) => {
                    ledger.grant(&entity(a), &entity(b), &observe);
                    let hit = (a, b) == (0, 1);
                    regranted |= hit;
                    hit
                }
                Op::Revoke(a, b) | Op::Deny(a, b) => {
                    if matches!(op, Op::Revoke(..)) {
                        ledger.revoke(&entity(a), &entity(b), &observe);
                    } else {
                        ledger.deny(&entity(a), &entity(b), &observe);
                    }
                    let hit = (a, b) == (0, 1);
                    regranted &= !hit;
                    hit
                }
                Op::Check(a, b) => {
                    ledger.check(&entity(a), &entity(b), &observe);
                    false
                }
                Op::GrantAhead(a, b, secs) => {
                    let at = Utc::now() + Duration::seconds(secs);
                    ledger.grant_at(&entity(a), &entity(b), &observe, at);
                    // An explicit timestamp older than the decision in force
                    // is audit-only.
                    let hit = (a, b) == (0, 1) && at >= decided;
                    regranted |= hit;
                    hit
                }
            };
            if touches_target {
                let event = ledger.history().last().unwrap();
                prop_assert!(event.applied);
                decided = event.at;
            }
            prop_assert_eq!(ledger.check(&target.0, &target.1, &observe), regranted);
        }
    }

    /// A wall-clock revoke always lands, however far ahead the grant was
    /// stamped.
    #[test]
    fn revoke_after_future_grant(secs in 1i64..1_000_000, deny in any::<bool>()) {
        let mut ledger = ConsentLedger::new();
        let (a, b) = (entity(0), entity(1));
        let observe = Action::observe();
        ledger.grant_at(&a, &b, &observe, Utc::now() + Duration::seconds(secs));
        if deny {
            ledger.deny(&a, &b, &observe);
        } else {
            ledger.revoke(&a, &b, &observe);
        }
        prop_assert!(!ledger.check(&a, &b, &observe));
        prop_assert!(ledger.history().all(|e| e.applied));
    }

    /// Whatever order events arrive in, the status is the one carried by the
    /// newest timestamp (ties to the later arrival).
    #[test]
    fn latest_timestamp_wins(events in prop::collection::vec((0i64..50, any::<bool>()), 1..40)) {
        let mut ledger = ConsentLedger::new();
        let (a, b) = (entity(0), entity(1));
        let observe = Action::observe();
        let epoch = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut best: Option<(i64, bool)> = None;
        for (offset, grant) in events {
            let at = epoch + Duration::seconds(offset);
            if grant {
                ledger.grant_at(&a, &b, &observe, at);
            } else {
                ledger.revoke_at(&a, &b, &observe, at);
            }
            if best.map_or(true, |(t, _)| offset >= t) {
                best = Some((offset, grant));
            }
        }
        let expected = match best {
            Some((_, true)) => ConsentStatus::Granted,
            _ => ConsentStatus::Denied,
        };
        prop_assert_eq!(ledger.status(&a, &b, &observe), expected);
    }
}

// ----------------------------------------------------------------------------
// Non-transitivity
// ----------------------------------------------------------------------------

proptest! {
    /// No set of direct grants ever yields a grant for a pair that was never
    /// granted itself.
    #[test]
    fn grants_never_chain(pairs in prop::collection::vec((0usize..5, 0usize..5), 0..30)) {
        let mut ledger = ConsentLedger::new();
        let observe = Action::observe();
        for (a, b) in &pairs {
            ledger.grant(&entity(*a), &entity(*b), &observe);
        }
        for a in 0..5 {
            for b in 0..5 {
                let granted = pairs.contains(&(a, b));
                prop_assert_eq!(ledger.check(&entity(a), &entity(b), &observe), granted);
            }
        }
    }

    /// Two-hop flow is refused without the explicit indirect-share record.
    #[test]
    fn chains_need_indirect_share(a in 0usize..4, b in 0usize..4, c in 0usize..4) {
        prop_assume!(a != b && b != c && a != c);
        let mut ledger = ConsentLedger::new();
        let observe = Action::observe();
        ledger.grant(&entity(a), &entity(b), &observe);
        ledger.grant(&entity(b), &entity(c), &observe);
        prop_assert!(!ledger.check(&entity(a), &entity(c), &observe));
        prop_assert!(!ledger.propagate_indirect(&entity(a), &entity(b), &entity(c), &observe));

        ledger.grant(&entity(a), &entity(c), &Action::indirect_share());
        prop_assert!(ledger.propagate_indirect(&entity(a), &entity(b), &entity(c), &observe));
        prop_assert!(!ledger.check(&entity(a), &entity(c), &observe));
    }
}
