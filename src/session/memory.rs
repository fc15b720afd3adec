//! Hash-map session store for tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{RefreshSession, SessionStore, StoreError};
use crate::auth::models::ExtendedIdentity;

/// In-memory [`SessionStore`] used by unit and integration tests.
///
/// A single lock covers every call, so `replace` is naturally atomic and
/// the at-most-one-winner property holds under concurrency.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, RefreshSession>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &RefreshSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.jti) {
            return Err(StoreError::Unavailable("duplicate jti".into()));
        }
        sessions.insert(session.jti.clone(), session.clone());
        Ok(())
    }

    async fn exists(&self, jti: &str) -> Result<bool, StoreError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(jti)
            .is_some_and(|session| session.expires_at > Utc::now()))
    }

    async fn revoke(&self, jti: &str) -> Result<(), StoreError> {
        self.sessions.lock().await.remove(jti);
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn replace(&self, old_jti: &str, new: &RefreshSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(old_jti).is_none() {
            return Err(StoreError::SessionNotFound);
        }
        sessions.insert(new.jti.clone(), new.clone());
        Ok(())
    }

    async fn read_identity_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<ExtendedIdentity, StoreError> {
        let sessions = self.sessions.lock().await;
        sessions
            .values()
            .filter(|session| session.user_id == user_id && session.expires_at > Utc::now())
            .max_by_key(|session| session.created_at)
            .map(RefreshSession::identity)
            .ok_or(StoreError::SessionNotFound)
    }
}
