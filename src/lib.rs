//! Interest-gated realtime chat core for a matchmaking app.
//!
//! ## Modules
//!
//! - [`room`] – participant identity and symmetric room-id derivation
//! - [`chat`] – message and interest data model
//! - [`store`] – realtime store seam: append, bounded history, snapshot
//!   subscription; plus the in-process [`MemoryStore`]
//! - [`api`] – interest REST backend seam and the `reqwest` client
//! - [`gate`] – the interest state machine gating free-form messaging
//! - [`session`] – the session controller a UI surface consumes
//! - [`config`] – environment-driven settings
//! - [`error`] – the library error taxonomy

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod gate;
pub mod room;
pub mod session;
pub mod store;

pub use api::{AuthToken, HttpMatchApi, InterestOutcome, MatchApi, StaticTokenProvider, TokenProvider};
pub use chat::{InterestRecord, InterestStatus, Message, MessageKind, Notice, NoticeLevel};
pub use config::ChatConfig;
pub use error::{ChatError, Result};
pub use gate::{GateState, InterestGate};
pub use room::{ParticipantId, RoomId};
pub use session::{ChatSession, SessionView};
pub use store::{MemoryStore, RealtimeStore, Subscription};
