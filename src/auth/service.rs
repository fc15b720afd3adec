//! Sign-in, rotation, validation, and sign-out flows.
//!
//! The orchestrator owns every cross-component invariant: empty input is
//! rejected before any I/O, identity is read from the session snapshot during
//! validate/refresh (the directory is only contacted at sign-in), and replay
//! of a rotated refresh token fails on the store's atomic replace.

use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use super::error::AuthError;
use super::models::{ExtendedIdentity, GroupAttributes, TokenPair};
use super::token::TokenManager;
use crate::directory::DirectoryResolver;
use crate::session::{RefreshSession, SessionStore, StoreError};

pub struct AuthService {
    tokens: TokenManager,
    directory: Arc<dyn DirectoryResolver>,
    sessions: Arc<dyn SessionStore>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        tokens: TokenManager,
        directory: Arc<dyn DirectoryResolver>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            tokens,
            directory,
            sessions,
        }
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.tokens.access_ttl_seconds()
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.tokens.refresh_ttl_seconds()
    }

    /// Authenticate against the directory, resolve identity and group
    /// attributes, issue a token pair, and persist the refresh session.
    pub async fn sign_in(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<(TokenPair, ExtendedIdentity), AuthError> {
        if user_id.is_empty() || password.is_empty() {
            return Err(AuthError::InputValidation);
        }

        self.directory.authenticate(user_id, password).await?;
        let identity = self.directory.resolve(user_id, password).await?;

        let groups = if identity.role.is_staff() {
            GroupAttributes::default()
        } else {
            match self.directory.resolve_groups(user_id, password).await {
                Ok(groups) => groups,
                Err(err) => {
                    // Sign-in still succeeds with empty attributes.
                    warn!("failed to resolve group attributes for {user_id}: {err}");
                    GroupAttributes::default()
                }
            }
        };

        let identity = ExtendedIdentity::new(identity, groups);
        let pair = self.issue_pair(&identity)?;
        let jti = self.tokens.extract_claim(&pair.refresh_token, "jti")?;
        self.sessions
            .save(&self.build_session(jti, &identity))
            .await?;

        Ok((pair, identity))
    }

    /// Rotate a refresh token: retire the presented session and issue a new
    /// pair against the cached identity. A replayed token fails with
    /// [`AuthError::SessionNotFound`].
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::InputValidation);
        }
        self.tokens.validate_refresh(refresh_token)?;
        let user_id = self.tokens.extract_claim(refresh_token, "user_id")?;
        let old_jti = self.tokens.extract_claim(refresh_token, "jti")?;

        let identity = self.sessions.read_identity_by_user_id(&user_id).await?;
        let pair = self.issue_pair(&identity)?;
        let new_jti = self.tokens.extract_claim(&pair.refresh_token, "jti")?;

        self.sessions
            .replace(&old_jti, &self.build_session(new_jti, &identity))
            .await
            .map_err(|err| {
                if matches!(err, StoreError::SessionNotFound) {
                    warn!("attempt to use non-existent refresh token: jti={old_jti}, user={user_id}");
                }
                AuthError::from(err)
            })?;

        Ok(pair)
    }

    /// Verify an access token and return the cached identity. Access tokens
    /// are self-verifying; only refresh tokens are tracked for revocation.
    pub async fn validate_access_token(
        &self,
        access_token: &str,
    ) -> Result<ExtendedIdentity, AuthError> {
        if access_token.is_empty() {
            return Err(AuthError::InputValidation);
        }
        self.tokens.validate(access_token)?;
        let user_id = self.tokens.extract_claim(access_token, "user_id")?;
        Ok(self.sessions.read_identity_by_user_id(&user_id).await?)
    }

    /// Revoke the refresh session. Revoking an already-revoked or unknown
    /// session is not an error.
    pub async fn sign_out(&self, refresh_token: &str) -> Result<(), AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::InputValidation);
        }
        let jti = self.tokens.extract_claim(refresh_token, "jti")?;
        self.sessions.revoke(&jti).await?;
        Ok(())
    }

    /// Issue a fresh access token against a live refresh session without
    /// rotating it.
    pub async fn get_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<(String, ExtendedIdentity), AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::InputValidation);
        }
        self.tokens.validate_refresh(refresh_token)?;
        let user_id = self.tokens.extract_claim(refresh_token, "user_id")?;
        let jti = self.tokens.extract_claim(refresh_token, "jti")?;

        if !self.sessions.exists(&jti).await? {
            warn!("attempt to use non-existent refresh token: jti={jti}, user={user_id}");
            return Err(AuthError::SessionNotFound);
        }

        let identity = self.sessions.read_identity_by_user_id(&user_id).await?;
        let access_token =
            self.tokens
                .issue_access(&identity.id, &identity.display_name, identity.role)?;
        Ok((access_token, identity))
    }

    fn issue_pair(&self, identity: &ExtendedIdentity) -> Result<TokenPair, AuthError> {
        let access_token =
            self.tokens
                .issue_access(&identity.id, &identity.display_name, identity.role)?;
        let refresh_token = self.tokens.issue_refresh(&identity.id)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    fn build_session(&self, jti: String, identity: &ExtendedIdentity) -> RefreshSession {
        let now = Utc::now();
        RefreshSession {
            jti,
            user_id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            role: identity.role,
            academic_group: identity.academic_group.clone(),
            profile: identity.profile.clone(),
            subgroup: identity.subgroup.clone(),
            english_group: identity.english_group.clone(),
            created_at: now,
            expires_at: now + self.tokens.refresh_ttl(),
        }
    }
}
