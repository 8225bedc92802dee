//! In-process session store with per-session serialization.
//!
//! The map lock is only held to find or insert a session; each session has
//! its own mutex, held by a turn from start to commit. Turns on different
//! sessions never contend with each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;
use voxagent_config::BusyPolicy;
use voxagent_core::error::SessionError;
use voxagent_core::message::Message;
use voxagent_core::session::{Session, SessionId};

/// Exclusive access to one session for the duration of a turn.
pub type SessionGuard = OwnedMutexGuard<Session>;

pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    directive: String,
}

impl SessionStore {
    /// Create an empty store; new sessions start with `directive`.
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            directive: directive.into(),
        }
    }

    pub fn directive(&self) -> &str {
        &self.directive
    }

    /// The session's slot, created with `[System(directive)]` if absent.
    pub async fn get_or_create(&self, id: &SessionId) -> Arc<Mutex<Session>> {
        if let Some(slot) = self.sessions.read().await.get(id) {
            return slot.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session = %id, "Creating session");
                Arc::new(Mutex::new(Session::new(id.clone(), &self.directive)))
            })
            .clone()
    }

    /// Take exclusive access to a session for one turn.
    ///
    /// With `BusyPolicy::Wait` this queues behind any in-flight turn; with
    /// `BusyPolicy::Reject` it fails with `SessionError::Busy` instead.
    pub async fn acquire(&self, id: &SessionId, policy: BusyPolicy) -> Result<SessionGuard, SessionError> {
        let slot = self.get_or_create(id).await;
        match policy {
            BusyPolicy::Wait => Ok(slot.lock_owned().await),
            BusyPolicy::Reject => slot
                .try_lock_owned()
                .map_err(|_| SessionError::Busy(id.to_string())),
        }
    }

    /// Reset a session to just the directive, creating it if needed.
    ///
    /// Waits for any in-flight turn on the session to finish first.
    pub async fn clear(&self, id: &SessionId) {
        let slot = self.get_or_create(id).await;
        slot.lock().await.clear();
        debug!(session = %id, "Session cleared");
    }

    /// A copy of the session's committed history.
    pub async fn history(&self, id: &SessionId) -> Result<Vec<Message>, SessionError> {
        let slot = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let session = slot.lock().await;
        Ok(session.history().to_vec())
    }

    /// Drop a session entirely. Returns whether it existed.
    pub async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
