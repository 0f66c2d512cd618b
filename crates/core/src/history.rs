//! History trait: the per-session turn log the autopilot replays into prompts.
//!
//! A session is an ordered, append-only, bounded list of user/assistant
//! turns. Stores create sessions lazily on first access and evict the oldest
//! turns once a session exceeds its capacity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::message::Message;

/// Opaque session identifier supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage for per-session conversation turns.
///
/// Implementations must serialize reads and appends for the same session
/// while letting unrelated sessions proceed concurrently.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// A human-readable backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Return the session's turns, oldest first, creating an empty session if needed.
    async fn get(&self, session: &SessionId) -> Result<Vec<Message>, MemoryError>;

    /// Return the session's turns if it exists, without creating it.
    async fn find(&self, session: &SessionId) -> Result<Option<Vec<Message>>, MemoryError>;

    /// Append one turn, evicting from the front past capacity.
    async fn append(&self, session: &SessionId, message: Message) -> Result<(), MemoryError>;

    /// Append a user turn and the assistant's reply.
    ///
    /// Default implementation performs two appends; backends that can hold
    /// the session lock across both should override it.
    async fn append_exchange(
        &self,
        session: &SessionId,
        user: Message,
        assistant: Message,
    ) -> Result<(), MemoryError> {
        self.append(session, user).await?;
        self.append(session, assistant).await
    }

    /// Remove a session. Returns whether it existed.
    async fn clear(&self, session: &SessionId) -> Result<bool, MemoryError>;

    /// Number of live sessions.
    async fn session_count(&self) -> Result<usize, MemoryError>;
}
