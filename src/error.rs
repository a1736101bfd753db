use thiserror::Error;

/// Error taxonomy for the chat core.
///
/// Every public operation converts its failures into one of these kinds;
/// raw transport errors never cross the library boundary.
#[derive(Error, Debug)]
pub enum ChatError {
    /// No bearer token available, or the backend rejected it. Fatal to the
    /// action; never retried automatically.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The REST backend or realtime store could not be reached. Transient;
    /// callers degrade gracefully and leave retry to the user.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// An interest record already exists for this pair. Success-equivalent:
    /// the gate absorbs it and never surfaces it as a failure.
    #[error("Interest already exists")]
    DuplicateInterest,

    /// An action was attempted before the session finished initializing,
    /// or after teardown. Contract violation; logged and dropped.
    #[error("Session not ready")]
    SessionNotReady,

    /// Realtime store read/write failure not covered by the kinds above.
    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(401) {
            ChatError::Unauthenticated
        } else {
            ChatError::BackendUnavailable(err.to_string())
        }
    }
}
