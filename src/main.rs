use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use rishta_chat::{
    AuthToken, ChatConfig, ChatSession, InterestOutcome, InterestRecord, MatchApi, MemoryStore,
    ParticipantId, StaticTokenProvider,
};

/// Stand-in backend for the demo: every interest succeeds, none pre-exist.
struct LocalMatchApi;

#[async_trait]
impl MatchApi for LocalMatchApi {
    async fn send_interest(
        &self,
        _token: &AuthToken,
        to: &ParticipantId,
        message: Option<&str>,
    ) -> rishta_chat::Result<InterestOutcome> {
        info!(to = %to, ?message, "interest accepted");
        Ok(InterestOutcome::Created)
    }

    async fn find_interest(
        &self,
        _token: &AuthToken,
        _peer: &ParticipantId,
    ) -> rishta_chat::Result<Option<InterestRecord>> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ChatConfig::from_env();
    info!("Starting rishta-chat demo against an in-process store");

    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(LocalMatchApi);

    let asha = ParticipantId::new("asha");
    let vikram = ParticipantId::new("vikram");

    // Two mounted sessions, one per end of the conversation
    let session_a = ChatSession::new(
        config.clone(),
        store.clone(),
        api.clone(),
        Arc::new(StaticTokenProvider::new("demo-token-a")),
        asha.clone(),
        vikram.clone(),
    );
    let session_b = ChatSession::new(
        config,
        store,
        api,
        Arc::new(StaticTokenProvider::new("demo-token-b")),
        vikram,
        asha,
    );

    session_a.initialize().await?;
    session_b.initialize().await?;
    info!(room = %session_a.room_id(), "both sessions attached");

    let mut view_b = session_b.watch();

    // Asha's first submit becomes the interest, not a message
    session_a.send_message("Hi, I liked your profile!").await?;
    info!(gate = ?session_a.gate_state(), "after first submit");

    // Gate is open now; these are real messages
    session_a.send_message("Would love to talk.").await?;
    session_b.send_message("Hello Asha, likewise!").await?;

    // Wait until the live subscription has delivered the backlog
    while view_b.borrow_and_update().messages.is_empty() {
        view_b.changed().await?;
    }
    let view = view_b.borrow().clone();
    for msg in &view.messages {
        info!(from = %msg.sender, "{}", msg.content);
    }

    session_a.teardown();
    session_b.teardown();
    Ok(())
}
