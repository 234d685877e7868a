//! Conversation memory.
//!
//! Per-session ordered turns, kept in process. A session is `Empty` until
//! its first turn and returns to `Empty` on reset. Sessions idle for longer
//! than the configured TTL are dropped by [`SessionStore::evict_idle`].

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Empty,
    Active,
}

#[derive(Debug, Clone)]
struct Session {
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
    turns: Vec<ConversationTurn>,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            last_active: now,
            turns: Vec::new(),
        }
    }
}

/// Summary returned when listing or creating sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub state: SessionState,
    pub turns: usize,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new empty session and returns its id.
    pub async fn create(&self) -> SessionInfo {
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(Utc::now());
        let info = SessionInfo {
            session_id: session_id.clone(),
            state: SessionState::Empty,
            turns: 0,
            created_at: session.created_at,
            last_active: session.last_active,
        };
        self.sessions.write().await.insert(session_id, session);
        info
    }

    /// Appends a turn, creating the session if it is unknown.
    pub async fn append(&self, session_id: &str, turn: ConversationTurn) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(now));
        session.last_active = now;
        session.turns.push(turn);
    }

    /// Most recent turns, oldest first. `max_turns == None` returns all.
    pub async fn history(&self, session_id: &str, max_turns: Option<usize>) -> Vec<ConversationTurn> {
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(session_id) else {
            return Vec::new();
        };
        let limit = max_turns.unwrap_or(session.turns.len());
        let skip = session.turns.len().saturating_sub(limit);
        session.turns[skip..].to_vec()
    }

    /// Clears the turns of a session. Returns false for unknown sessions.
    pub async fn reset(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.turns.clear();
                session.last_active = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn state(&self, session_id: &str) -> SessionState {
        match self.sessions.read().await.get(session_id) {
            Some(session) if !session.turns.is_empty() => SessionState::Active,
            _ => SessionState::Empty,
        }
    }

    pub async fn info(&self, session_id: &str) -> Option<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|session| SessionInfo {
            session_id: session_id.to_string(),
            state: if session.turns.is_empty() {
                SessionState::Empty
            } else {
                SessionState::Active
            },
            turns: session.turns.len(),
            created_at: session.created_at,
            last_active: session.last_active,
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drops sessions idle for longer than `ttl`. Returns how many were dropped.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        self.evict_idle_at(Utc::now(), ttl).await
    }

    async fn evict_idle_at(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| now.signed_duration_since(session.last_active) <= ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} idle sessions", evicted);
        }
        evicted
    }
}
