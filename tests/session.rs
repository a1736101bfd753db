//! Integration tests for the chat session lifecycle.
//!
//! Runs real sessions against the in-process store and a scriptable
//! interest backend: gating of the first message, duplicate reconciliation,
//! teardown safety and send ordering.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use rishta_chat::{
    AuthToken, ChatConfig, ChatError, ChatSession, GateState, InterestOutcome, InterestRecord,
    InterestStatus, MatchApi, MemoryStore, Message, ParticipantId, RealtimeStore, RoomId,
    StaticTokenProvider, Subscription,
};

struct FakeApi {
    existing: bool,
    duplicate_on_create: bool,
    send_calls: AtomicUsize,
}

impl FakeApi {
    fn fresh() -> Arc<Self> {
        Arc::new(Self {
            existing: false,
            duplicate_on_create: false,
            send_calls: AtomicUsize::new(0),
        })
    }

    fn with_existing() -> Arc<Self> {
        Arc::new(Self {
            existing: true,
            duplicate_on_create: false,
            send_calls: AtomicUsize::new(0),
        })
    }

    fn with_duplicate_on_create() -> Arc<Self> {
        Arc::new(Self {
            existing: false,
            duplicate_on_create: true,
            send_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MatchApi for FakeApi {
    async fn send_interest(
        &self,
        _token: &AuthToken,
        _to: &ParticipantId,
        _message: Option<&str>,
    ) -> rishta_chat::Result<InterestOutcome> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if self.duplicate_on_create {
            Ok(InterestOutcome::AlreadyExists)
        } else {
            Ok(InterestOutcome::Created)
        }
    }

    async fn find_interest(
        &self,
        _token: &AuthToken,
        peer: &ParticipantId,
    ) -> rishta_chat::Result<Option<InterestRecord>> {
        if !self.existing {
            return Ok(None);
        }
        Ok(Some(InterestRecord {
            from: ParticipantId::new("asha"),
            to: peer.clone(),
            message: Some("sent earlier".into()),
            created_at: chrono::Utc::now(),
            status: InterestStatus::Accepted,
        }))
    }
}

/// Store whose history call parks until released, to simulate a slow
/// backlog fetch resolving after teardown.
struct GatedHistoryStore {
    inner: MemoryStore,
    release: Arc<Notify>,
}

#[async_trait]
impl RealtimeStore for GatedHistoryStore {
    async fn append(&self, room: &RoomId, message: Message) -> rishta_chat::Result<()> {
        self.inner.append(room, message).await
    }

    async fn history(&self, room: &RoomId, limit: usize) -> rishta_chat::Result<Vec<Message>> {
        self.release.notified().await;
        self.inner.history(room, limit).await
    }

    async fn subscribe(&self, room: &RoomId) -> rishta_chat::Result<Subscription> {
        self.inner.subscribe(room).await
    }
}

/// Store whose history reads always fail, while writes and subscriptions
/// keep working.
struct NoHistoryStore {
    inner: MemoryStore,
}

#[async_trait]
impl RealtimeStore for NoHistoryStore {
    async fn append(&self, room: &RoomId, message: Message) -> rishta_chat::Result<()> {
        self.inner.append(room, message).await
    }

    async fn history(&self, _room: &RoomId, _limit: usize) -> rishta_chat::Result<Vec<Message>> {
        Err(ChatError::BackendUnavailable("history shard down".into()))
    }

    async fn subscribe(&self, room: &RoomId) -> rishta_chat::Result<Subscription> {
        self.inner.subscribe(room).await
    }
}

/// Store that makes every append take a while, to expose interleaving.
struct SlowAppendStore {
    inner: MemoryStore,
    delay: Duration,
}

#[async_trait]
impl RealtimeStore for SlowAppendStore {
    async fn append(&self, room: &RoomId, message: Message) -> rishta_chat::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.append(room, message).await
    }

    async fn history(&self, room: &RoomId, limit: usize) -> rishta_chat::Result<Vec<Message>> {
        self.inner.history(room, limit).await
    }

    async fn subscribe(&self, room: &RoomId) -> rishta_chat::Result<Subscription> {
        self.inner.subscribe(room).await
    }
}

fn session_with(
    store: Arc<dyn RealtimeStore>,
    api: Arc<dyn MatchApi>,
) -> (ChatSession, ParticipantId, ParticipantId) {
    let me = ParticipantId::new("asha");
    let peer = ParticipantId::new("vikram");
    let session = ChatSession::new(
        ChatConfig::default(),
        store,
        api,
        Arc::new(StaticTokenProvider::new("token-1")),
        me.clone(),
        peer.clone(),
    );
    (session, me, peer)
}

#[tokio::test]
async fn fresh_pair_first_submit_becomes_interest() {
    let store = Arc::new(MemoryStore::new());
    let api = FakeApi::fresh();
    let (session, _, _) = session_with(store.clone(), api.clone());

    session.initialize().await.unwrap();
    assert_eq!(session.gate_state(), GateState::CheckedNotSent);

    session.send_message("hello").await.unwrap();

    // The text went out as the interest's message, not as a room write
    assert_eq!(api.send_calls.load(Ordering::SeqCst), 1);
    assert!(store
        .history(session.room_id(), 10)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(session.gate_state(), GateState::Sent);
}

#[tokio::test]
async fn prior_interest_opens_messaging_directly() {
    let store = Arc::new(MemoryStore::new());
    let api = FakeApi::with_existing();
    let (session, me, _) = session_with(store.clone(), api.clone());

    session.initialize().await.unwrap();
    assert_eq!(session.gate_state(), GateState::Sent);

    session.send_message("hello").await.unwrap();

    assert_eq!(api.send_calls.load(Ordering::SeqCst), 0);
    let history = store.history(session.room_id(), 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "hello");
    assert_eq!(history[0].sender, me);
}

#[tokio::test]
async fn duplicate_interest_reconciles_without_error_notice() {
    let store = Arc::new(MemoryStore::new());
    let api = FakeApi::with_duplicate_on_create();
    let (session, _, _) = session_with(store, api);

    session.initialize().await.unwrap();
    session.send_message("hello").await.unwrap();

    assert_eq!(session.gate_state(), GateState::Sent);
    let view = session.watch().borrow().clone();
    assert!(view.notice.is_none(), "duplicate must not surface as error");
}

#[tokio::test]
async fn message_comes_back_through_the_subscription() {
    let store = Arc::new(MemoryStore::new());
    let api = FakeApi::with_existing();
    let (session, _, _) = session_with(store, api);
    let session = Arc::new(session);

    session.initialize().await.unwrap();
    let mut view = session.watch();

    session.send_message("are we on?").await.unwrap();

    while view.borrow_and_update().messages.is_empty() {
        view.changed().await.unwrap();
    }
    let rendered = view.borrow().clone();
    assert_eq!(rendered.messages.len(), 1);
    assert_eq!(rendered.messages[0].content, "are we on?");
}

#[tokio::test]
async fn failed_history_degrades_to_sending_without_backlog() {
    let store = Arc::new(NoHistoryStore {
        inner: MemoryStore::new(),
    });
    let api = FakeApi::with_existing();
    let (session, _, _) = session_with(store.clone(), api);

    session.initialize().await.unwrap();

    let view = session.watch().borrow().clone();
    assert!(view.ready);
    assert!(view.messages.is_empty());
    assert!(view.notice.is_some(), "degraded load surfaces a notice");

    // Sending still works without the backlog
    session.send_message("still here").await.unwrap();
    let written = store.inner.history(session.room_id(), 10).await.unwrap();
    assert_eq!(written.len(), 1);
}

#[tokio::test]
async fn send_before_initialize_is_session_not_ready() {
    let store = Arc::new(MemoryStore::new());
    let (session, _, _) = session_with(store, FakeApi::fresh());

    let err = session.send_message("too early").await.unwrap_err();
    assert!(matches!(err, ChatError::SessionNotReady));
}

#[tokio::test]
async fn late_history_resolve_after_teardown_mutates_nothing() {
    let release = Arc::new(Notify::new());
    let store = Arc::new(GatedHistoryStore {
        inner: MemoryStore::new(),
        release: release.clone(),
    });
    let (session, _, _) = session_with(store, FakeApi::fresh());
    let session = Arc::new(session);

    let init = {
        let session = session.clone();
        tokio::spawn(async move { session.initialize().await })
    };

    // Let init reach the parked history fetch, then tear down and release
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.teardown();
    release.notify_one();
    init.await.unwrap().unwrap();

    let view = session.watch().borrow().clone();
    assert!(!view.ready);
    assert!(view.messages.is_empty());
    assert!(matches!(
        session.send_message("ghost").await.unwrap_err(),
        ChatError::SessionNotReady
    ));
}

#[tokio::test]
async fn watcher_sees_session_go_not_ready_on_teardown() {
    let store = Arc::new(MemoryStore::new());
    let (session, _, _) = session_with(store, FakeApi::with_existing());

    session.initialize().await.unwrap();
    let view = session.watch();
    assert!(view.borrow().ready);

    session.teardown();
    assert!(
        !view.borrow().ready,
        "attached watcher must see the session die"
    );
}

#[tokio::test]
async fn teardown_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let (session, _, _) = session_with(store, FakeApi::fresh());

    session.initialize().await.unwrap();
    session.teardown();
    session.teardown();
    session.teardown();
}

#[tokio::test]
async fn rapid_sends_serialize_in_call_order() {
    let store = Arc::new(SlowAppendStore {
        inner: MemoryStore::new(),
        delay: Duration::from_millis(50),
    });
    let api = FakeApi::with_existing();
    let (session, _, _) = session_with(store.clone(), api);
    let session = Arc::new(session);

    session.initialize().await.unwrap();

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.send_message("first").await })
    };
    // Give the first send time to take the send lock
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = {
        let session = session.clone();
        tokio::spawn(async move { session.send_message("second").await })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let history = store.inner.history(session.room_id(), 10).await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second"]);
}

#[tokio::test]
async fn both_ends_derive_the_same_room() {
    let store = Arc::new(MemoryStore::new());
    let api = FakeApi::with_existing();

    let asha = ParticipantId::new("asha");
    let vikram = ParticipantId::new("vikram");
    let tokens = Arc::new(StaticTokenProvider::new("token-1"));

    let side_a = ChatSession::new(
        ChatConfig::default(),
        store.clone(),
        api.clone(),
        tokens.clone(),
        asha.clone(),
        vikram.clone(),
    );
    let side_b = ChatSession::new(
        ChatConfig::default(),
        store.clone(),
        api,
        tokens,
        vikram,
        asha,
    );

    assert_eq!(side_a.room_id(), side_b.room_id());

    side_a.initialize().await.unwrap();
    side_b.initialize().await.unwrap();

    side_a.send_message("hi from A").await.unwrap();

    let mut view_b = side_b.watch();
    while view_b.borrow_and_update().messages.is_empty() {
        view_b.changed().await.unwrap();
    }
    assert_eq!(view_b.borrow().messages[0].content, "hi from A");
}
