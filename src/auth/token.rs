//! JWT issuance and verification.
//!
//! Both token kinds are signed with one symmetric key (HMAC-SHA256). Any
//! other algorithm in a presented token's header is rejected before claims
//! are read.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use uuid::Uuid;

use super::error::AuthError;
use super::models::{AccessClaims, RefreshClaims, Role};

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Signing key and credential lifetimes.
#[derive(Clone, Debug)]
pub struct TokenConfig {
    signing_key: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenConfig {
    #[must_use]
    pub fn new(signing_key: SecretString) -> Self {
        Self {
            signing_key,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }
}

/// Mints and verifies access and refresh tokens.
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenManager {
    #[must_use]
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.signing_key.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` must be strictly in the future at verification time.
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            access_ttl: Duration::seconds(config.access_ttl_seconds),
            refresh_ttl: Duration::seconds(config.refresh_ttl_seconds),
        }
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl.num_seconds()
    }

    pub(crate) fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mint an access token carrying `{user_id, username, role, iat, exp}`.
    pub fn issue_access(
        &self,
        user_id: &str,
        username: &str,
        role: Role,
    ) -> Result<String, AuthError> {
        if user_id.is_empty() || username.is_empty() {
            return Err(AuthError::InputValidation);
        }
        let now = Utc::now();
        let claims = AccessClaims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::TokenSigning)
    }

    /// Mint a refresh token carrying `{user_id, jti, iat, exp}` with a fresh
    /// random `jti`.
    pub fn issue_refresh(&self, user_id: &str) -> Result<String, AuthError> {
        if user_id.is_empty() {
            return Err(AuthError::InputValidation);
        }
        let now = Utc::now();
        let claims = RefreshClaims {
            user_id: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::TokenSigning)
    }

    /// Signature and expiry check.
    pub fn validate(&self, token: &str) -> Result<(), AuthError> {
        self.decode_claims(token).map(|_| ())
    }

    /// [`Self::validate`] plus a mandatory `jti` claim, so access tokens
    /// cannot stand in for refresh tokens.
    pub fn validate_refresh(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.decode_claims(token)?;
        match claims.get("jti") {
            Some(Value::String(_)) => Ok(()),
            Some(_) => Err(AuthError::InvalidClaim("jti")),
            None => Err(AuthError::TokenWrongKind),
        }
    }

    /// Verify the token and extract a single string claim.
    pub fn extract_claim(&self, token: &str, name: &'static str) -> Result<String, AuthError> {
        let claims = self.decode_claims(token)?;
        match claims.get(name) {
            Some(Value::String(value)) => Ok(value.clone()),
            Some(_) => Err(AuthError::InvalidClaim(name)),
            None => Err(AuthError::MissingClaim(name)),
        }
    }

    fn decode_claims(&self, token: &str) -> Result<Value, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InputValidation);
        }
        decode::<Value>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(classify_decode_error)
    }
}

fn classify_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName => AuthError::TokenSignatureInvalid,
        _ => AuthError::TokenMalformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> TokenManager {
        TokenManager::new(&TokenConfig::new(SecretString::from(
            "unit-test-signing-key".to_string(),
        )))
    }

    fn sign_with(secret: &str, algorithm: Algorithm, claims: &Value) -> String {
        encode(
            &Header::new(algorithm),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("sign test token")
    }

    #[test]
    fn access_token_round_trips() {
        let manager = manager();
        let token = manager
            .issue_access("i24s0291", "Коломацкий Иван", Role::Student)
            .expect("issue access token");

        manager.validate(&token).expect("validate access token");
        assert_eq!(
            manager.extract_claim(&token, "user_id").expect("user_id"),
            "i24s0291"
        );
        assert_eq!(
            manager.extract_claim(&token, "username").expect("username"),
            "Коломацкий Иван"
        );
        assert_eq!(
            manager.extract_claim(&token, "role").expect("role"),
            "student"
        );
    }

    #[test]
    fn refresh_tokens_carry_unique_jtis() {
        let manager = manager();
        let first = manager.issue_refresh("i24s0291").expect("first refresh");
        let second = manager.issue_refresh("i24s0291").expect("second refresh");

        manager.validate_refresh(&first).expect("validate refresh");
        let first_jti = manager.extract_claim(&first, "jti").expect("first jti");
        let second_jti = manager.extract_claim(&second, "jti").expect("second jti");
        assert_ne!(first_jti, second_jti);
    }

    #[test]
    fn access_token_is_not_a_refresh_token() {
        let manager = manager();
        let token = manager
            .issue_access("t1010", "Петров Петр", Role::Teacher)
            .expect("issue access token");
        assert!(matches!(
            manager.validate_refresh(&token),
            Err(AuthError::TokenWrongKind)
        ));
    }

    #[test]
    fn tokens_signed_with_another_key_are_rejected() {
        let manager = manager();
        let now = Utc::now().timestamp();
        let forged = sign_with(
            "some-other-key",
            Algorithm::HS256,
            &json!({"user_id": "i24s0291", "iat": now, "exp": now + 600}),
        );
        assert!(matches!(
            manager.validate(&forged),
            Err(AuthError::TokenSignatureInvalid)
        ));
    }

    #[test]
    fn non_hmac_sha256_algorithms_are_rejected() {
        let manager = manager();
        let now = Utc::now().timestamp();
        let wrong_alg = sign_with(
            "unit-test-signing-key",
            Algorithm::HS384,
            &json!({"user_id": "i24s0291", "iat": now, "exp": now + 600}),
        );
        assert!(matches!(
            manager.validate(&wrong_alg),
            Err(AuthError::TokenSignatureInvalid)
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let manager = manager();
        let now = Utc::now().timestamp();
        let expired = sign_with(
            "unit-test-signing-key",
            Algorithm::HS256,
            &json!({"user_id": "i24s0291", "iat": now - 1200, "exp": now - 600}),
        );
        assert!(matches!(
            manager.validate(&expired),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn garbage_tokens_are_malformed() {
        let manager = manager();
        assert!(matches!(
            manager.validate("not-a-jwt"),
            Err(AuthError::TokenMalformed)
        ));
    }

    #[test]
    fn empty_token_is_rejected_before_parsing() {
        let manager = manager();
        assert!(matches!(
            manager.validate(""),
            Err(AuthError::InputValidation)
        ));
    }

    #[test]
    fn missing_and_mistyped_claims_are_distinct_errors() {
        let manager = manager();
        let token = manager
            .issue_access("i24s0291", "Коломацкий Иван", Role::Student)
            .expect("issue access token");

        assert!(matches!(
            manager.extract_claim(&token, "jti"),
            Err(AuthError::MissingClaim("jti"))
        ));
        // `iat` exists but is numeric, not a string.
        assert!(matches!(
            manager.extract_claim(&token, "iat"),
            Err(AuthError::InvalidClaim("iat"))
        ));
    }

    #[test]
    fn empty_identity_fields_are_rejected_before_signing() {
        let manager = manager();
        assert!(matches!(
            manager.issue_access("", "name", Role::Student),
            Err(AuthError::InputValidation)
        ));
        assert!(matches!(
            manager.issue_access("id", "", Role::Student),
            Err(AuthError::InputValidation)
        ));
        assert!(matches!(
            manager.issue_refresh(""),
            Err(AuthError::InputValidation)
        ));
    }
}
