//! Error taxonomy for the auth core.
//!
//! Callers of the HTTP API only ever see the coarse [`AuthError::public_message`]
//! classification; full diagnostic context stays in server-side logs.

use thiserror::Error;

use crate::session::StoreError;

type Source = Box<dyn std::error::Error + Send + Sync>;

/// Classified failures across the resolver, token manager, session store,
/// and orchestrator.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Empty credentials or token, rejected before any I/O.
    #[error("empty credentials or token")]
    InputValidation,

    /// The directory could not be reached or answered abnormally.
    #[error("directory unavailable")]
    DirectoryUnavailable(#[source] Source),

    /// Bad credentials. Does not distinguish a wrong password from an
    /// unknown user.
    #[error("authentication failed")]
    AuthFailure,

    /// The subtree search for the principal returned no entry.
    #[error("user not found in directory")]
    NotFound,

    /// The subtree search matched more than one entry; never pick the first.
    #[error("multiple directory entries matched")]
    MultipleMatches,

    /// No role could be inferred from group memberships or entry location.
    #[error("role could not be determined")]
    RoleUnresolved,

    /// The matched entry lacks a required attribute.
    #[error("directory entry missing attribute {0:?}")]
    MissingAttribute(&'static str),

    #[error("claim {0:?} missing from token")]
    MissingClaim(&'static str),

    #[error("claim {0:?} has the wrong type")]
    InvalidClaim(&'static str),

    #[error("malformed token")]
    TokenMalformed,

    #[error("token expired")]
    TokenExpired,

    /// Bad signature, or an algorithm other than the accepted one.
    #[error("token signature invalid")]
    TokenSignatureInvalid,

    /// Access token presented where a refresh token is required.
    #[error("token is not a refresh token")]
    TokenWrongKind,

    /// Replay, rotation, or revocation already consumed this session.
    #[error("refresh session not found")]
    SessionNotFound,

    /// Rotation retired the old session but could not persist the new one;
    /// the refresh chain is broken and the client must sign in again.
    #[error("refresh session lost during rotation")]
    SessionLost(#[source] Source),

    #[error("session store unavailable")]
    StoreUnavailable(#[source] Source),

    #[error("failed to sign token")]
    TokenSigning(#[source] jsonwebtoken::errors::Error),
}

impl AuthError {
    /// Coarse message safe to return to API clients.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InputValidation => "empty credentials or token",
            Self::AuthFailure
            | Self::NotFound
            | Self::MultipleMatches
            | Self::RoleUnresolved
            | Self::MissingAttribute(_) => "authentication failed",
            Self::MissingClaim(_)
            | Self::InvalidClaim(_)
            | Self::TokenMalformed
            | Self::TokenExpired
            | Self::TokenSignatureInvalid
            | Self::TokenWrongKind => "invalid token",
            Self::SessionNotFound => "token not found or already used",
            Self::SessionLost(_) => "session lost, sign in again",
            Self::DirectoryUnavailable(_) | Self::StoreUnavailable(_) => {
                "authentication service unavailable"
            }
            Self::TokenSigning(_) => "internal error",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionNotFound => Self::SessionNotFound,
            StoreError::SessionLost(source) => Self::SessionLost(source),
            StoreError::Unavailable(source) => Self::StoreUnavailable(source),
        }
    }
}
