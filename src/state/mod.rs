//! Session store
//!
//! Owned by the transport layer and handed to the conversation engine one
//! session at a time. Each session sits behind its own async mutex so turns
//! on the same session are serialized while different sessions proceed
//! independently. In-memory only; nothing survives a restart.

use crate::conversation::Session;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub type SessionHandle = Arc<Mutex<Session>>;

/// Trait for session persistence
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self) -> Result<(Uuid, SessionHandle)>;
    async fn get(&self, session_id: Uuid) -> Result<Option<SessionHandle>>;
    async fn remove(&self, session_id: Uuid) -> Result<bool>;
    async fn count(&self) -> Result<usize>;
}

/// In-memory session store
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {

    async fn create(&self) -> Result<(Uuid, SessionHandle)> {
        let session_id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(Session::new(session_id)));

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id, handle.clone());

        Ok((session_id, handle))
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<SessionHandle>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&session_id).cloned())
    }

    async fn remove(&self, session_id: Uuid) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(&session_id).is_some())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.sessions.read().await.len())
    }
}
