//! # Aula (Campus Identity and Access)
//!
//! `aula` authenticates institutional users (students, teachers,
//! administrators) against the campus LDAP directory, issues short-lived JWT
//! access tokens and rotating refresh tokens, and tracks refresh sessions in
//! Postgres so they can be revoked, rotated, and used as a cached identity
//! snapshot between sign-ins.
//!
//! ## Authentication
//!
//! Credentials are verified by binding directly against the directory; no
//! password ever touches the database. The bind DN is derived from the user
//! identifier: identifiers starting with the staff marker bind under the
//! teachers subtree, all others under the default people subtree.
//!
//! ## Roles
//!
//! Roles are inferred from group memberships with a fixed precedence:
//! membership in the administrators group always wins, then the staff group,
//! then an academic group (students), then staff-subtree location as a
//! fallback. An unresolvable role is an error, not a default.
//!
//! ## Sessions & rotation
//!
//! Each refresh token carries a unique `jti` which keys a row in
//! `refresh_sessions`. Refreshing rotates the session atomically; presenting
//! a rotated or revoked token fails with "token not found or already used".
//! Validation and refresh read identity from the session snapshot and never
//! re-contact the directory; cached role/group data can therefore be stale
//! until the next sign-in.

pub mod api;
pub mod auth;
pub mod cli;
pub mod directory;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
