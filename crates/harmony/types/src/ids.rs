use serde::{Deserialize, Serialize};

// Strong typed identifiers used throughout Harmony.

/// An identifiable participant (agent, observer, user).
///
/// The engine holds no cross-session identity beyond this identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

/// Identifier of a single consent event in the audit log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub uuid::Uuid);

/// A named action that consent is granted or denied for.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Action(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl EventId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl Action {
    /// Observing another entity's state through a witness projection.
    pub const OBSERVE: &'static str = "observe";
    /// Running invariant evaluation over another entity's series.
    pub const ANALYZE: &'static str = "analyze";
    /// Explicit permission for a grant chain to reach a third party.
    pub const INDIRECT_SHARE: &'static str = "indirect-share";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn observe() -> Self {
        Self::new(Self::OBSERVE)
    }

    pub fn analyze() -> Self {
        Self::new(Self::ANALYZE)
    }

    pub fn indirect_share() -> Self {
        Self::new(Self::INDIRECT_SHARE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ent:{}", self.0)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt:{}", self.0)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
