// src/services/session_store.rs
use crate::errors::StarcrazeError;
use crate::session::Session;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub type SharedSession = Arc<Mutex<Session>>;

/// Sessions live in process memory only; a restart forgets them.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self) -> (Uuid, SharedSession) {
        let session = Session::new();
        let id = session.id;
        let shared = Arc::new(Mutex::new(session));

        self.sessions.write().await.insert(id, shared.clone());
        info!("Created session {}", id);
        (id, shared)
    }

    pub async fn get(&self, id: &Uuid) -> Result<SharedSession, StarcrazeError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StarcrazeError::SessionNotFound(id.to_string()))
    }

    pub async fn remove(&self, id: &Uuid) -> Result<(), StarcrazeError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| info!("Removed session {}", id))
            .ok_or_else(|| StarcrazeError::SessionNotFound(id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
