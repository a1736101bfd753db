use crate::room::{ParticipantId, RoomId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    System,
}

/// A single chat message. Immutable once stored; ordered by `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub room_id: RoomId,
    pub sender: ParticipantId,
    pub receiver: ParticipantId,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn text(
        room_id: RoomId,
        sender: ParticipantId,
        receiver: ParticipantId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room_id,
            sender,
            receiver,
            content: content.into(),
            kind: MessageKind::Text,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestStatus {
    Pending,
    Accepted,
    Declined,
}

/// A one-directional interest record from one user to another. At most one
/// exists per ordered pair; the gate enforces this on the sending side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestRecord {
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: InterestStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
    Success,
}

/// A non-fatal, user-visible notification surfaced by the session, e.g. a
/// degraded history load or a transient send failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
