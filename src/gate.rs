use crate::api::{InterestOutcome, MatchApi, TokenProvider};
use crate::error::{ChatError, Result};
use crate::room::ParticipantId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Where the (current user, peer) pair stands with respect to the one-time
/// interest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    /// Not yet checked against the backend.
    Unknown,
    /// Checked; no interest sent yet. Free-form messaging is blocked and a
    /// send attempt is redirected into an interest request.
    CheckedNotSent,
    /// Interest exists (just created, or discovered). Messaging is open.
    Sent,
}

/// Owns the interest state for one session's (current user, peer) pair.
///
/// This is the single authority for "may this user free-form message that
/// peer"; the UI observes its state read-only and holds no flags of its own.
pub struct InterestGate {
    api: Arc<dyn MatchApi>,
    tokens: Arc<dyn TokenProvider>,
    peer: ParticipantId,
    state: Mutex<GateState>,
    sending: AtomicBool,
}

impl InterestGate {
    pub fn new(
        api: Arc<dyn MatchApi>,
        tokens: Arc<dyn TokenProvider>,
        peer: ParticipantId,
    ) -> Self {
        Self {
            api,
            tokens,
            peer,
            state: Mutex::new(GateState::Unknown),
            sending: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> GateState {
        // Poisoning requires a prior panic while holding the lock; these
        // critical sections only copy a GateState
        *self.state.lock().unwrap()
    }

    /// Whether a free-form message may go straight to the store.
    pub fn is_open(&self) -> bool {
        self.state() == GateState::Sent
    }

    fn set_state(&self, next: GateState) {
        *self.state.lock().unwrap() = next;
    }

    /// Resolve `Unknown` by querying the backend for an existing interest.
    ///
    /// Fails open: if the query cannot complete (no token, backend down),
    /// the gate lands on `CheckedNotSent` so the UI stays usable and shows
    /// the conservative send-interest affordance.
    pub async fn check(&self) -> GateState {
        let checked = match self.tokens.token() {
            Some(token) => match self.api.find_interest(&token, &self.peer).await {
                Ok(Some(record)) => {
                    info!(peer = %self.peer, status = ?record.status, "found existing interest");
                    GateState::Sent
                }
                Ok(None) => GateState::CheckedNotSent,
                Err(e) => {
                    warn!(peer = %self.peer, "interest check failed, assuming not sent: {}", e);
                    GateState::CheckedNotSent
                }
            },
            None => {
                warn!(peer = %self.peer, "no auth token for interest check, assuming not sent");
                GateState::CheckedNotSent
            }
        };

        self.set_state(checked);
        checked
    }

    /// Create the interest record, optionally carrying the user's typed text
    /// as the accompanying message.
    ///
    /// At most one request is in flight per gate: a call arriving while one
    /// is pending is coalesced into a no-op returning the current state, so
    /// rapid double-submission cannot race two records into the backend. A
    /// duplicate reported by the backend is reconciliation, not failure: the
    /// record evidently exists, so the gate still moves to `Sent`.
    pub async fn request_send_interest(&self, message: Option<&str>) -> Result<GateState> {
        if self.state() == GateState::Sent {
            return Ok(GateState::Sent);
        }
        if self.sending.swap(true, Ordering::SeqCst) {
            return Ok(self.state());
        }

        let result = self.send_once(message).await;
        self.sending.store(false, Ordering::SeqCst);
        result
    }

    async fn send_once(&self, message: Option<&str>) -> Result<GateState> {
        let token = self.tokens.token().ok_or(ChatError::Unauthenticated)?;

        match self.api.send_interest(&token, &self.peer, message).await {
            Ok(InterestOutcome::Created) => {
                info!(peer = %self.peer, "interest sent");
                self.set_state(GateState::Sent);
                Ok(GateState::Sent)
            }
            Ok(InterestOutcome::AlreadyExists) | Err(ChatError::DuplicateInterest) => {
                info!(peer = %self.peer, "interest already existed, reconciling to sent");
                self.set_state(GateState::Sent);
                Ok(GateState::Sent)
            }
            Err(e) => Err(e),
        }
    }
}
