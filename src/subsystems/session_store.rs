//! In-memory session table.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{CloseTransition, StateCell, Subsystem, SubsystemError, SubsystemState};

const NAME: &str = "session_store";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub expires_at: Instant,
}

impl Session {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

pub struct SessionStore {
    state: StateCell,
    ttl: Duration,
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: StateCell::new(),
            ttl,
            sessions: DashMap::new(),
        }
    }

    /// Create a session and return its id.
    pub fn create(&self, user_id: impl Into<String>) -> Result<String, SubsystemError> {
        self.state.ensure_ready(NAME)?;
        let id = Uuid::new_v4().to_string();
        self.sessions.insert(
            id.clone(),
            Session {
                user_id: user_id.into(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(id)
    }

    /// Look up a live session. Expired entries are removed on sight.
    pub fn get(&self, id: &str) -> Option<Session> {
        if !self.state.is_ready() {
            return None;
        }
        let session = self.sessions.get(id).map(|s| s.clone())?;
        if session.is_expired(Instant::now()) {
            self.sessions.remove(id);
            return None;
        }
        Some(session)
    }

    pub fn revoke(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl Subsystem for SessionStore {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> SubsystemState {
        self.state.get()
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        self.state.mark_ready(NAME)?;
        tracing::info!(ttl_secs = self.ttl.as_secs(), "Session store ready");
        Ok(())
    }

    /// Destroys every session.
    async fn close(&self) -> Result<(), SubsystemError> {
        if self.state.mark_closed() == CloseTransition::Closed {
            let dropped = self.sessions.len();
            self.sessions.clear();
            tracing::info!(dropped, "Session store destroyed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_expire() {
        let store = SessionStore::new(Duration::from_millis(20));
        store.initialize().await.unwrap();

        let id = store.create("user-1").unwrap();
        assert_eq!(store.get(&id).unwrap().user_id, "user-1");

        tokio::time::sleep(Duration::from_millis(40)).await;
        store.create("user-2").unwrap();
        assert_eq!(store.prune_expired(), 1);
        assert!(store.get(&id).is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn destroy_clears_and_stops_serving() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.initialize().await.unwrap();
        let id = store.create("user-1").unwrap();

        store.close().await.unwrap();
        store.close().await.unwrap();

        assert!(store.is_empty());
        assert!(store.get(&id).is_none());
        assert!(store.create("user-2").is_err());
    }
}
