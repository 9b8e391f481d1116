use chrono::{DateTime, Utc};
use harmony_types::{Action, EntityId, EventId};
use serde::{Deserialize, Serialize};

/// Current state of one (grantor, grantee, action) triple.
///
/// `Unset` authorizes nothing: absence of consent is denial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    Unset,
    Granted,
    Denied,
}

impl ConsentStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, ConsentStatus::Granted)
    }
}

impl std::fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

/// What a consent event asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Grant,
    Deny,
    /// Withdrawal of an earlier grant; lands in `Denied` like `Deny`.
    Revoke,
}

impl Transition {
    pub fn resulting_status(&self) -> ConsentStatus {
        match self {
            Transition::Grant => ConsentStatus::Granted,
            Transition::Deny | Transition::Revoke => ConsentStatus::Denied,
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grant => write!(f, "grant"),
            Self::Deny => write!(f, "deny"),
            Self::Revoke => write!(f, "revoke"),
        }
    }
}

/// One immutable entry of the consent audit trail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsentEvent {
    pub id: EventId,
    /// Arrival order within the ledger, starting at 0.
    pub sequence: u64,
    pub grantor: EntityId,
    pub grantee: EntityId,
    pub action: Action,
    pub transition: Transition,
    /// When the decision was made, as stated by the caller.
    pub at: DateTime<Utc>,
    /// Optional limitation the grantor attached to the decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// False when a newer decision for the same triple was already in
    /// force; the event is kept for audit but changed nothing.
    pub applied: bool,
}

impl ConsentEvent {
    pub fn involves(&self, entity: &EntityId) -> bool {
        &self.grantor == entity || &self.grantee == entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoke_and_deny_both_deny() {
        assert_eq!(Transition::Revoke.resulting_status(), ConsentStatus::Denied);
        assert_eq!(Transition::Deny.resulting_status(), ConsentStatus::Denied);
        assert!(Transition::Grant.resulting_status().is_granted());
        assert!(!ConsentStatus::Unset.is_granted());
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = ConsentEvent {
            id: EventId::new(),
            sequence: 3,
            grantor: EntityId::from("alice"),
            grantee: EntityId::from("bob"),
            action: Action::observe(),
            transition: Transition::Revoke,
            at: Utc::now(),
            scope: None,
            applied: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"revoke\""));
        assert!(!json.contains("scope"));
        let back: ConsentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert!(back.involves(&EntityId::from("bob")));
        assert!(!back.involves(&EntityId::from("carol")));
    }
}
