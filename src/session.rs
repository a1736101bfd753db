use crate::api::{MatchApi, TokenProvider};
use crate::chat::{Message, Notice};
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::gate::{GateState, InterestGate};
use crate::room::{ParticipantId, RoomId};
use crate::store::RealtimeStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What a UI surface renders for one conversation. Published through a
/// `watch` channel; the UI is a read-only observer and keeps no chat state
/// of its own.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub gate: GateState,
    pub messages: Vec<Message>,
    pub notice: Option<Notice>,
    pub ready: bool,
}

impl SessionView {
    fn initial() -> Self {
        Self {
            gate: GateState::Unknown,
            messages: Vec::new(),
            notice: None,
            ready: false,
        }
    }
}

/// One mounted conversation between the current user and a peer.
///
/// Lifecycle: [`ChatSession::initialize`] resolves the room, checks the
/// interest gate, seeds history and attaches the live subscription;
/// [`ChatSession::send_message`] routes user input through the gate;
/// [`ChatSession::teardown`] cancels the subscription and is safe to call
/// any number of times. All collaborators are injected, so a session never
/// reaches for global SDK state.
pub struct ChatSession {
    config: ChatConfig,
    store: Arc<dyn RealtimeStore>,
    tokens: Arc<dyn TokenProvider>,
    gate: InterestGate,
    current_user: ParticipantId,
    peer: ParticipantId,
    room: RoomId,
    alive: Arc<AtomicBool>,
    ready: AtomicBool,
    view_tx: watch::Sender<SessionView>,
    pump: Mutex<Option<JoinHandle<()>>>,
    send_lock: tokio::sync::Mutex<()>,
}

impl ChatSession {
    pub fn new(
        config: ChatConfig,
        store: Arc<dyn RealtimeStore>,
        api: Arc<dyn MatchApi>,
        tokens: Arc<dyn TokenProvider>,
        current_user: ParticipantId,
        peer: ParticipantId,
    ) -> Self {
        let room = RoomId::for_pair(&current_user, &peer);
        let gate = InterestGate::new(api, tokens.clone(), peer.clone());
        let (view_tx, _) = watch::channel(SessionView::initial());

        Self {
            config,
            store,
            tokens,
            gate,
            current_user,
            peer,
            room,
            alive: Arc::new(AtomicBool::new(true)),
            ready: AtomicBool::new(false),
            view_tx,
            pump: Mutex::new(None),
            send_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room
    }

    pub fn peer(&self) -> &ParticipantId {
        &self.peer
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// A read-only view of the session for rendering.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn publish<F: FnOnce(&mut SessionView)>(&self, update: F) {
        // Guard against late async results touching a torn-down session
        if !self.is_alive() {
            return;
        }
        self.view_tx.send_modify(update);
    }

    /// Run the session start-up sequence: gate check, history seed, live
    /// subscription.
    ///
    /// A failed history load is non-fatal: the session comes up with an
    /// empty backlog and a user-visible notice, and sending still works.
    /// If `teardown` lands while any of the start-up round-trips is in
    /// flight, their late results are discarded.
    pub async fn initialize(&self) -> Result<()> {
        if !self.is_alive() {
            return Err(ChatError::SessionNotReady);
        }
        if self.ready.load(Ordering::SeqCst) {
            return Ok(());
        }

        info!(room = %self.room, peer = %self.peer, "initializing chat session");

        let gate_state = self.gate.check().await;
        if !self.is_alive() {
            return Ok(());
        }
        self.publish(|v| v.gate = gate_state);

        // History is only the pre-subscription seed; the first snapshot from
        // the live subscription supersedes it
        let backlog = match self
            .store
            .history(&self.room, self.config.history_limit)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(room = %self.room, "history load failed, starting empty: {}", e);
                self.publish(|v| {
                    v.notice = Some(Notice::warning("Could not load earlier messages"));
                });
                Vec::new()
            }
        };
        if !self.is_alive() {
            return Ok(());
        }
        self.publish(|v| v.messages = backlog);

        let mut subscription = self.store.subscribe(&self.room).await?;
        if !self.is_alive() {
            subscription.unsubscribe();
            return Ok(());
        }

        let alive = self.alive.clone();
        let view_tx = self.view_tx.clone();
        let room = self.room.clone();
        let handle = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next_snapshot().await {
                if !alive.load(Ordering::SeqCst) {
                    break;
                }
                debug!(room = %room, count = snapshot.len(), "applying room snapshot");
                // Full replacement: the store is authoritative on order
                view_tx.send_modify(|v| v.messages = snapshot);
            }
            debug!(room = %room, "snapshot pump finished");
        });

        {
            // Poisoning requires a prior panic while holding the lock; the
            // pump lock only swaps a JoinHandle
            let mut pump = self.pump.lock().unwrap();
            // One live subscription per session: replacing a pump tears the
            // old one down first
            if let Some(previous) = pump.take() {
                previous.abort();
            }
            *pump = Some(handle);
        }

        self.ready.store(true, Ordering::SeqCst);
        self.publish(|v| v.ready = true);
        Ok(())
    }

    /// Submit user input.
    ///
    /// While the gate is not open, the text becomes the accompanying message
    /// of an interest request and nothing is written to the store. Once
    /// open, the message is persisted fire-and-forget: confirmation comes
    /// back through the live subscription, not this call's return value.
    /// Sends are serialized, so two rapid calls land in order and never
    /// interleave.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        if !self.ready.load(Ordering::SeqCst) || !self.is_alive() {
            warn!(room = %self.room, "send_message on a session that is not ready, dropping");
            return Err(ChatError::SessionNotReady);
        }

        let _guard = self.send_lock.lock().await;

        if !self.gate.is_open() {
            let state = self.gate.request_send_interest(Some(text)).await?;
            self.publish(|v| v.gate = state);
            info!(room = %self.room, "first message converted into interest");
            return Ok(());
        }

        if self.tokens.token().is_none() {
            return Err(ChatError::Unauthenticated);
        }

        let message = Message::text(
            self.room.clone(),
            self.current_user.clone(),
            self.peer.clone(),
            text,
        );
        if let Err(e) = self.store.append(&self.room, message).await {
            warn!(room = %self.room, "message write failed: {}", e);
            self.publish(|v| v.notice = Some(Notice::error("Message could not be sent")));
            return Err(e);
        }
        Ok(())
    }

    /// Cancel the live subscription and discard the session. Idempotent;
    /// any in-flight start-up result arriving after this is ignored.
    pub fn teardown(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            info!(room = %self.room, "tearing down chat session");
            // Direct send: publish() is alive-gated, and watchers still
            // attached must see the session go not-ready
            self.view_tx.send_modify(|v| v.ready = false);
        }
        self.ready.store(false, Ordering::SeqCst);
        if let Some(handle) = self.pump.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
