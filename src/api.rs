use crate::chat::{InterestRecord, InterestStatus};
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::room::ParticipantId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Structured error code the backend returns when an interest record already
/// exists for the pair. Matching on this code, never on human-readable
/// message text.
pub const CODE_INTEREST_EXISTS: &str = "interest_exists";

/// Bearer token for the profile/interest API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Source of the current user's bearer token (a cookie store in the web
/// client; injected here). `None` means any interest or send action fails
/// with `Unauthenticated`.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<AuthToken>;
}

/// A fixed token handed in at construction time.
pub struct StaticTokenProvider(Option<AuthToken>);

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(AuthToken::new(token)))
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token(&self) -> Option<AuthToken> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestOutcome {
    /// A new interest record was persisted.
    Created,
    /// The backend already had a record for this pair. Success-equivalent.
    AlreadyExists,
}

/// The profile/interest REST backend, as seen by the chat core.
#[async_trait]
pub trait MatchApi: Send + Sync {
    /// Create an interest record toward `to`, optionally carrying the text
    /// the user typed as the accompanying message.
    async fn send_interest(
        &self,
        token: &AuthToken,
        to: &ParticipantId,
        message: Option<&str>,
    ) -> Result<InterestOutcome>;

    /// The existing interest record toward `peer`, if any. Seeds the gate
    /// on session init.
    async fn find_interest(
        &self,
        token: &AuthToken,
        peer: &ParticipantId,
    ) -> Result<Option<InterestRecord>>;
}

#[derive(Debug, Serialize)]
struct InterestRequest<'a> {
    profile_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct InterestResponse {
    success: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InterestsResponse {
    #[serde(default)]
    interests: Vec<InterestWire>,
}

#[derive(Debug, Deserialize)]
struct InterestWire {
    from_user_id: String,
    to_user_id: String,
    #[serde(default)]
    message: Option<String>,
    created_at: DateTime<Utc>,
    status: InterestStatus,
}

impl From<InterestWire> for InterestRecord {
    fn from(wire: InterestWire) -> Self {
        Self {
            from: ParticipantId::new(wire.from_user_id),
            to: ParticipantId::new(wire.to_user_id),
            message: wire.message,
            created_at: wire.created_at,
            status: wire.status,
        }
    }
}

/// `reqwest`-backed [`MatchApi`] implementation.
pub struct HttpMatchApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMatchApi {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ChatError::BackendUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl MatchApi for HttpMatchApi {
    async fn send_interest(
        &self,
        token: &AuthToken,
        to: &ParticipantId,
        message: Option<&str>,
    ) -> Result<InterestOutcome> {
        let body = InterestRequest {
            profile_id: to.as_str(),
            message,
        };

        let response = self
            .client
            .post(self.url("/matches/interest"))
            .bearer_auth(token.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ChatError::Unauthenticated);
        }
        if status.is_server_error() {
            return Err(ChatError::BackendUnavailable(format!(
                "interest endpoint returned {}",
                status
            )));
        }

        // 4xx with a structured code still carries a JSON body
        let parsed: InterestResponse = response
            .json()
            .await
            .map_err(|e| ChatError::BackendUnavailable(e.to_string()))?;

        if parsed.code.as_deref() == Some(CODE_INTEREST_EXISTS) {
            debug!(to = %to, "interest already exists on backend");
            return Ok(InterestOutcome::AlreadyExists);
        }
        if parsed.success {
            return Ok(InterestOutcome::Created);
        }

        Err(ChatError::BackendUnavailable(
            parsed
                .message
                .unwrap_or_else(|| format!("interest rejected with status {}", status)),
        ))
    }

    async fn find_interest(
        &self,
        token: &AuthToken,
        peer: &ParticipantId,
    ) -> Result<Option<InterestRecord>> {
        let response = self
            .client
            .get(self.url("/matches/interests"))
            .bearer_auth(token.as_str())
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ChatError::Unauthenticated);
        }
        if !status.is_success() {
            return Err(ChatError::BackendUnavailable(format!(
                "interests endpoint returned {}",
                status
            )));
        }

        let parsed: InterestsResponse = response
            .json()
            .await
            .map_err(|e| ChatError::BackendUnavailable(e.to_string()))?;

        Ok(parsed
            .interests
            .into_iter()
            .find(|i| i.to_user_id == peer.as_str())
            .map(InterestRecord::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_code_is_matched_structurally() {
        let parsed: InterestResponse = serde_json::from_str(
            r#"{"success": false, "code": "interest_exists", "message": "Interest already sent"}"#,
        )
        .unwrap();
        assert_eq!(parsed.code.as_deref(), Some(CODE_INTEREST_EXISTS));
    }

    #[test]
    fn interest_request_omits_absent_message() {
        let body = InterestRequest {
            profile_id: "user-7",
            message: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"profile_id":"user-7"}"#);
    }

    #[test]
    fn interests_listing_parses_into_records() {
        let parsed: InterestsResponse = serde_json::from_str(
            r#"{"interests": [{
                "from_user_id": "asha",
                "to_user_id": "vikram",
                "message": "hello",
                "created_at": "2026-08-01T10:00:00Z",
                "status": "pending"
            }]}"#,
        )
        .unwrap();
        let record = InterestRecord::from(parsed.interests.into_iter().next().unwrap());
        assert_eq!(record.to.as_str(), "vikram");
        assert_eq!(record.status, InterestStatus::Pending);
        assert_eq!(record.message.as_deref(), Some("hello"));
    }
}
