//! Refresh-session persistence.
//!
//! A session row is both a revocation record and a denormalized identity
//! snapshot: validation and refresh read identity from here instead of
//! re-contacting the directory, so cached role/group data can be stale until
//! the next sign-in. Expiry is enforced at this layer (reads filter on
//! `expires_at`, a background reaper deletes expired rows); callers never
//! re-check it.

mod memory;
mod postgres;

pub use memory::InMemorySessionStore;
pub use postgres::{spawn_expiry_reaper, PgSessionStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::auth::models::{ExtendedIdentity, Role};

/// Outstanding refresh session, keyed by the refresh token's `jti`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshSession {
    pub jti: String,
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
    pub academic_group: Option<String>,
    pub profile: Option<String>,
    pub subgroup: Option<String>,
    pub english_group: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshSession {
    /// Identity snapshot carried by this session.
    #[must_use]
    pub fn identity(&self) -> ExtendedIdentity {
        ExtendedIdentity {
            id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            academic_group: self.academic_group.clone(),
            profile: self.profile.clone(),
            subgroup: self.subgroup.clone(),
            english_group: self.english_group.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// No live session with the requested id.
    #[error("session not found")]
    SessionNotFound,

    /// Rotation retired the old session but the replacement may not have
    /// been persisted; the refresh chain is broken.
    #[error("refresh session lost during rotation")]
    SessionLost(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("session store unavailable")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub(crate) fn unavailable<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Unavailable(Box::new(err))
    }
}

/// Durable record of outstanding refresh sessions.
///
/// Implementations must enforce `jti` uniqueness and provide an atomic
/// [`SessionStore::replace`]; the orchestrator performs no locking of its
/// own. An implementation that cannot replace atomically must retire the
/// old session first and surface [`StoreError::SessionLost`] when the
/// second step fails, never a generic error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session.
    async fn save(&self, session: &RefreshSession) -> Result<(), StoreError>;

    /// Whether a live (unexpired) session exists for `jti`.
    async fn exists(&self, jti: &str) -> Result<bool, StoreError>;

    /// Delete the session for `jti`. Idempotent; revoking an unknown
    /// session is not an error.
    async fn revoke(&self, jti: &str) -> Result<(), StoreError>;

    /// Delete every session belonging to `user_id`, returning the count.
    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Retire `old_jti` and persist `new` in its place. Under concurrent
    /// rotation of the same `old_jti` at most one caller wins; the rest
    /// observe [`StoreError::SessionNotFound`].
    async fn replace(&self, old_jti: &str, new: &RefreshSession) -> Result<(), StoreError>;

    /// Last-known identity snapshot for `user_id`, from the newest live
    /// session.
    async fn read_identity_by_user_id(&self, user_id: &str)
        -> Result<ExtendedIdentity, StoreError>;
}
