use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque stable identifier for a user, resolved once per session from the
/// authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The logical channel under which two participants' messages are stored
/// and streamed. Derived, never assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Derive the room id for an unordered pair of participants.
    ///
    /// The pair is sorted before joining, so both ends of a conversation
    /// converge on the same storage path regardless of who initiates:
    /// `for_pair(a, b) == for_pair(b, a)`.
    pub fn for_pair(a: &ParticipantId, b: &ParticipantId) -> Self {
        let (lo, hi) = if a.as_str() <= b.as_str() {
            (a, b)
        } else {
            (b, a)
        };
        Self(format!("{}_{}", lo.as_str(), hi.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
