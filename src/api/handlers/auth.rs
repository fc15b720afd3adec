//! Auth endpoints: sign-in, refresh, sign-out, renewal, and validation.
//!
//! Tokens travel both in the JSON body and in `HttpOnly` cookies so browser
//! and non-browser clients can use the same endpoints. Clients only ever see
//! the coarse error classification; details stay in server logs.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error};

use super::types::{
    AccessTokenResponse, ErrorResponse, MessageResponse, RefreshResponse, SignInRequest,
    SignInResponse, UserResponse,
};
use crate::auth::{AuthError, AuthService};

const ACCESS_COOKIE_NAME: &str = "access_token";
const REFRESH_COOKIE_NAME: &str = "refresh_token";

#[utoipa::path(
    post,
    path = "/api/v1/auth/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SignInResponse),
        (status = 400, description = "Empty credentials", body = ErrorResponse),
        (status = 401, description = "Authentication failed", body = ErrorResponse),
        (status = 503, description = "Directory or store unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn sign_in(
    service: Extension<Arc<AuthService>>,
    Json(request): Json<SignInRequest>,
) -> Response {
    match service.sign_in(&request.username, &request.password).await {
        Ok((pair, identity)) => {
            let mut headers = HeaderMap::new();
            append_cookie(
                &mut headers,
                token_cookie(
                    ACCESS_COOKIE_NAME,
                    &pair.access_token,
                    service.access_ttl_seconds(),
                ),
            );
            append_cookie(
                &mut headers,
                token_cookie(
                    REFRESH_COOKIE_NAME,
                    &pair.refresh_token,
                    service.refresh_ttl_seconds(),
                ),
            );
            let body = SignInResponse {
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
                expires_in: service.access_ttl_seconds(),
                user: UserResponse::from(identity),
            };
            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    responses(
        (status = 200, description = "Tokens rotated", body = RefreshResponse),
        (status = 400, description = "Refresh token cookie missing", body = ErrorResponse),
        (status = 401, description = "Invalid, rotated, or revoked token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(service: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let Some(refresh_token) = extract_cookie(&headers, REFRESH_COOKIE_NAME) else {
        return missing_cookie_response();
    };

    match service.refresh(&refresh_token).await {
        Ok(pair) => {
            let mut headers = HeaderMap::new();
            append_cookie(
                &mut headers,
                token_cookie(
                    ACCESS_COOKIE_NAME,
                    &pair.access_token,
                    service.access_ttl_seconds(),
                ),
            );
            append_cookie(
                &mut headers,
                token_cookie(
                    REFRESH_COOKIE_NAME,
                    &pair.refresh_token,
                    service.refresh_ttl_seconds(),
                ),
            );
            let body = RefreshResponse {
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
                expires_in: service.access_ttl_seconds(),
            };
            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    responses(
        (status = 200, description = "New access token issued", body = AccessTokenResponse),
        (status = 400, description = "Refresh token cookie missing", body = ErrorResponse),
        (status = 401, description = "Invalid, rotated, or revoked token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn access_token(service: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let Some(refresh_token) = extract_cookie(&headers, REFRESH_COOKIE_NAME) else {
        return missing_cookie_response();
    };

    match service.get_access_token(&refresh_token).await {
        Ok((access_token, identity)) => {
            let mut headers = HeaderMap::new();
            append_cookie(
                &mut headers,
                token_cookie(
                    ACCESS_COOKIE_NAME,
                    &access_token,
                    service.access_ttl_seconds(),
                ),
            );
            let body = AccessTokenResponse {
                access_token,
                expires_in: service.access_ttl_seconds(),
                user: UserResponse::from(identity),
            };
            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Access token is valid", body = UserResponse),
        (status = 400, description = "Access token missing", body = ErrorResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn me(service: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let token = extract_bearer_token(&headers)
        .or_else(|| extract_cookie(&headers, ACCESS_COOKIE_NAME));
    let Some(token) = token else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "access token not found".to_string(),
            }),
        )
            .into_response();
    };

    match service.validate_access_token(&token).await {
        Ok(identity) => (StatusCode::OK, Json(UserResponse::from(identity))).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/signout",
    responses(
        (status = 200, description = "Session revoked, cookies cleared", body = MessageResponse),
        (status = 400, description = "Refresh token cookie missing", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn sign_out(service: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let Some(refresh_token) = extract_cookie(&headers, REFRESH_COOKIE_NAME) else {
        return missing_cookie_response();
    };

    match service.sign_out(&refresh_token).await {
        Ok(()) => {
            let mut headers = HeaderMap::new();
            append_cookie(&mut headers, clear_cookie(ACCESS_COOKIE_NAME));
            append_cookie(&mut headers, clear_cookie(REFRESH_COOKIE_NAME));
            let body = MessageResponse {
                message: "successfully signed out".to_string(),
            };
            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

/// Map a core error onto a status code and its coarse public message,
/// logging the full error server-side.
pub(super) fn error_response(err: &AuthError) -> Response {
    let status = match err {
        AuthError::InputValidation => StatusCode::BAD_REQUEST,
        AuthError::AuthFailure
        | AuthError::NotFound
        | AuthError::MultipleMatches
        | AuthError::RoleUnresolved
        | AuthError::MissingAttribute(_)
        | AuthError::MissingClaim(_)
        | AuthError::InvalidClaim(_)
        | AuthError::TokenMalformed
        | AuthError::TokenExpired
        | AuthError::TokenSignatureInvalid
        | AuthError::TokenWrongKind
        | AuthError::SessionNotFound => StatusCode::UNAUTHORIZED,
        AuthError::DirectoryUnavailable(_) | AuthError::StoreUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AuthError::SessionLost(_) | AuthError::TokenSigning(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if matches!(err, AuthError::SessionLost(_)) {
        // The refresh chain is broken; keep this distinguishable from plain
        // unavailability for alerting.
        error!("refresh session lost during rotation: {err:?}");
    } else if status.is_server_error() {
        error!("auth request failed: {err:?}");
    } else {
        debug!("auth request rejected: {err:?}");
    }

    (
        status,
        Json(ErrorResponse {
            error: err.public_message().to_string(),
        }),
    )
        .into_response()
}

fn missing_cookie_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "refresh token cookie not found".to_string(),
        }),
    )
        .into_response()
}

fn token_cookie(name: &str, token: &str, max_age: i64) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    ))
}

fn clear_cookie(name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"))
}

fn append_cookie(headers: &mut HeaderMap, cookie: Result<HeaderValue, InvalidHeaderValue>) {
    if let Ok(cookie) = cookie {
        headers.append(SET_COOKIE, cookie);
    }
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
