//! In-memory history store with one lock per session.

use async_trait::async_trait;
use marionette_core::error::MemoryError;
use marionette_core::history::{HistoryStore, SessionId};
use marionette_core::message::Message;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

type Turns = Arc<Mutex<VecDeque<Message>>>;

/// Bounded per-session turn logs kept in process memory.
///
/// The outer map lock is held only long enough to find or create a session;
/// reads and appends then serialize on that session's own mutex, so traffic
/// on one session never waits on another.
pub struct InMemoryHistory {
    sessions: RwLock<HashMap<SessionId, Turns>>,
    capacity: usize,
}

impl InMemoryHistory {
    /// A store keeping at most `capacity` turns per session.
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// A store keeping `max_exchanges` user/assistant pairs per session.
    pub fn with_exchanges(max_exchanges: usize) -> Self {
        Self::new(max_exchanges.saturating_mul(2))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn session(&self, id: &SessionId) -> Turns {
        if let Some(turns) = self.sessions.read().await.get(id) {
            return turns.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session = %id, "Created session");
                Arc::new(Mutex::new(VecDeque::with_capacity(self.capacity)))
            })
            .clone()
    }

    fn push_bounded(&self, turns: &mut VecDeque<Message>, message: Message) {
        turns.push_back(message);
        while turns.len() > self.capacity {
            turns.pop_front();
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, session: &SessionId) -> Result<Vec<Message>, MemoryError> {
        let turns = self.session(session).await;
        let turns = turns.lock().await;
        Ok(turns.iter().cloned().collect())
    }

    async fn find(&self, session: &SessionId) -> Result<Option<Vec<Message>>, MemoryError> {
        let Some(turns) = self.sessions.read().await.get(session).cloned() else {
            return Ok(None);
        };
        let turns = turns.lock().await;
        Ok(Some(turns.iter().cloned().collect()))
    }

    async fn append(&self, session: &SessionId, message: Message) -> Result<(), MemoryError> {
        let turns = self.session(session).await;
        let mut turns = turns.lock().await;
        self.push_bounded(&mut turns, message);
        Ok(())
    }

    async fn append_exchange(
        &self,
        session: &SessionId,
        user: Message,
        assistant: Message,
    ) -> Result<(), MemoryError> {
        let turns = self.session(session).await;
        let mut turns = turns.lock().await;
        self.push_bounded(&mut turns, user);
        self.push_bounded(&mut turns, assistant);
        Ok(())
    }

    async fn clear(&self, session: &SessionId) -> Result<bool, MemoryError> {
        let removed = self.sessions.write().await.remove(session).is_some();
        if removed {
            debug!(session = %session, "Cleared session");
        }
        Ok(removed)
    }

    async fn session_count(&self) -> Result<usize, MemoryError> {
        Ok(self.sessions.read().await.len())
    }
}
