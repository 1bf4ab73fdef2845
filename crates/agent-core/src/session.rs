//! Session Management
//!
//! A session owns exactly one conversation plus session-scoped flags.
//! Reset and debug-toggle are simple state transitions outside the
//! orchestration state machine; no two sessions share mutable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Conversation;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One agent session: a conversation, a debug flag, and nothing shared
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentSession {
    /// Unique identifier
    pub id: SessionId,

    /// Conversation history, exclusively owned
    pub conversation: Conversation,

    /// When on, raw responses, thinking, and dispatches are surfaced to
    /// the operator; never changes control flow
    pub debug: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl AgentSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            conversation: Conversation::new(),
            debug: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create with specific ID
    pub fn with_id(id: SessionId) -> Self {
        let mut session = Self::new();
        session.id = id;
        session
    }

    /// Clear the conversation to empty
    pub fn reset(&mut self) {
        self.conversation.reset();
        self.touch();
    }

    /// Flip the debug flag, returning the new state
    pub fn toggle_debug(&mut self) -> bool {
        self.debug = !self.debug;
        self.touch();
        self.debug
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Message count
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }
}

impl Default for AgentSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Session store for hosting variants; each session keeps its own
/// isolated conversation
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &AgentSession) -> crate::Result<()>;

    fn load(&self, id: &SessionId) -> crate::Result<Option<AgentSession>>;

    fn delete(&self, id: &SessionId) -> crate::Result<()>;
}

/// In-memory session store (for development/testing)
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: std::sync::RwLock<std::collections::HashMap<SessionId, AgentSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &AgentSession) -> crate::Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| crate::AgentError::Session("session store poisoned".into()))?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> crate::Result<Option<AgentSession>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| crate::AgentError::Session("session store poisoned".into()))?;
        Ok(sessions.get(id).cloned())
    }

    fn delete(&self, id: &SessionId) -> crate::Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| crate::AgentError::Session("session store poisoned".into()))?;
        sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn test_session_starts_empty_with_debug_off() {
        let session = AgentSession::new();
        assert!(!session.debug);
        assert_eq!(session.message_count(), 0);
    }

    #[test]
    fn test_reset_clears_conversation() {
        let mut session = AgentSession::new();
        session.conversation.push(Message::user("hello"));
        session.conversation.push(Message::assistant("hi"));
        assert_eq!(session.message_count(), 2);

        session.reset();
        assert_eq!(session.message_count(), 0);
    }

    #[test]
    fn test_toggle_debug_flips_and_reports() {
        let mut session = AgentSession::new();
        assert!(session.toggle_debug());
        assert!(session.debug);
        assert!(!session.toggle_debug());
        assert!(!session.debug);
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let session = AgentSession::new();
        let id = session.id.clone();

        store.save(&session).unwrap();
        let loaded = store.load(&id).unwrap().unwrap();
        assert_eq!(loaded.id, id);

        store.delete(&id).unwrap();
        assert!(store.load(&id).unwrap().is_none());
    }
}
