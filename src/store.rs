use crate::chat::Message;
use crate::error::{ChatError, Result};
use crate::room::RoomId;
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tracing::warn;

/// A live, cancellable stream of room snapshots.
///
/// Each item is the full current message list of the room, not a delta: the
/// underlying store may reorder or batch, so consumers must treat every
/// snapshot as an authoritative replacement of whatever they rendered before.
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// cancels delivery.
pub struct Subscription {
    snapshots: BoxStream<'static, Vec<Message>>,
}

impl Subscription {
    pub fn new(snapshots: impl Stream<Item = Vec<Message>> + Send + 'static) -> Self {
        Self {
            snapshots: snapshots.boxed(),
        }
    }

    /// Wait for the next snapshot. Returns `None` once the store closes the
    /// room channel.
    pub async fn next_snapshot(&mut self) -> Option<Vec<Message>> {
        self.snapshots.next().await
    }

    /// Explicit cancellation. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Stream for Subscription {
    type Item = Vec<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.snapshots.as_mut().poll_next_unpin(cx)
    }
}

/// The realtime message store behind a conversation.
///
/// Three primitives: append a message under a room path, read the last-N
/// messages of a room in time order, and subscribe to full-snapshot updates.
/// Any store offering these is substitutable; the session layer never sees
/// anything else.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Append a message to the room's log.
    async fn append(&self, room: &RoomId, message: Message) -> Result<()>;

    /// The most recent `limit` messages of the room, ascending by time
    /// (oldest first).
    async fn history(&self, room: &RoomId, limit: usize) -> Result<Vec<Message>>;

    /// Attach a snapshot subscription to the room. The first snapshot
    /// reflects the room's current state; one more is delivered on every
    /// subsequent change.
    async fn subscribe(&self, room: &RoomId) -> Result<Subscription>;
}

struct RoomState {
    log: Vec<Message>,
    tx: broadcast::Sender<Vec<Message>>,
}

impl RoomState {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self { log: Vec::new(), tx }
    }
}

/// In-process [`RealtimeStore`] over one broadcast channel per room.
///
/// Used by tests and local demos, and the reference semantics for snapshot
/// delivery: appends only, so the set of message ids in successive snapshots
/// is monotonically non-decreasing.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rooms: Arc<Mutex<HashMap<RoomId, RoomState>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot_locked(state: &RoomState) -> Vec<Message> {
        let mut log = state.log.clone();
        log.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        log
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn append(&self, room: &RoomId, message: Message) -> Result<()> {
        let mut rooms = self
            .rooms
            .lock()
            .map_err(|_| ChatError::Store("room map poisoned".into()))?;
        let state = rooms.entry(room.clone()).or_insert_with(RoomState::new);
        state.log.push(message);

        let snapshot = Self::snapshot_locked(state);
        // No receivers is fine; the history read still sees the write
        let _ = state.tx.send(snapshot);
        Ok(())
    }

    async fn history(&self, room: &RoomId, limit: usize) -> Result<Vec<Message>> {
        let rooms = self
            .rooms
            .lock()
            .map_err(|_| ChatError::Store("room map poisoned".into()))?;
        let Some(state) = rooms.get(room) else {
            return Ok(Vec::new());
        };
        let snapshot = Self::snapshot_locked(state);
        let skip = snapshot.len().saturating_sub(limit);
        Ok(snapshot[skip..].to_vec())
    }

    async fn subscribe(&self, room: &RoomId) -> Result<Subscription> {
        let (initial, mut rx) = {
            let mut rooms = self
                .rooms
                .lock()
                .map_err(|_| ChatError::Store("room map poisoned".into()))?;
            let state = rooms.entry(room.clone()).or_insert_with(RoomState::new);
            (Self::snapshot_locked(state), state.tx.subscribe())
        };

        let room = room.clone();
        let stream = async_stream::stream! {
            yield initial;

            loop {
                match rx.recv().await {
                    Ok(snapshot) => yield snapshot,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // The next received item is a full snapshot anyway,
                        // so lag only costs intermediate frames
                        warn!(room = %room, skipped, "subscription lagged, skipping to latest snapshot");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        Ok(Subscription::new(stream))
    }
}
