//! Token lifecycle and sign-in orchestration.
//!
//! [`TokenManager`] mints and verifies the signed access/refresh tokens;
//! [`AuthService`] composes it with the directory resolver and the session
//! store into the sign-in, rotation, validation, and sign-out flows.

pub mod error;
pub mod models;
pub mod service;
pub mod token;

pub use error::AuthError;
pub use models::{ExtendedIdentity, GroupAttributes, Identity, Role, TokenPair};
pub use service::AuthService;
pub use token::{TokenConfig, TokenManager};
