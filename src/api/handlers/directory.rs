//! Internal directory-search endpoints for other campus services.
//!
//! Gated by a static shared-secret header, separate from the JWT lifecycle.
//! The comparison is constant-time.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

use super::auth::error_response;
use super::types::{ErrorResponse, PersonResponse, SearchRequest, SearchResponse};
use crate::directory::DirectoryResolver;

pub(crate) const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// Shared secret expected in the internal token header.
pub struct InternalToken {
    token: SecretString,
}

impl InternalToken {
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }

    fn matches(&self, headers: &HeaderMap) -> bool {
        headers
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|provided| {
                provided
                    .as_bytes()
                    .ct_eq(self.token.expose_secret().as_bytes())
                    .into()
            })
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/internal/students/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Matching students", body = SearchResponse),
        (status = 401, description = "Missing or wrong internal token", body = ErrorResponse)
    ),
    tag = "internal"
)]
pub async fn search_students(
    directory: Extension<Arc<dyn DirectoryResolver>>,
    internal: Extension<Arc<InternalToken>>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Response {
    if !internal.matches(&headers) {
        return unauthorized();
    }

    match directory.search_students(&request.query).await {
        Ok(entries) => search_response(entries),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/internal/teachers/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Matching teachers", body = SearchResponse),
        (status = 401, description = "Missing or wrong internal token", body = ErrorResponse)
    ),
    tag = "internal"
)]
pub async fn search_teachers(
    directory: Extension<Arc<dyn DirectoryResolver>>,
    internal: Extension<Arc<InternalToken>>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Response {
    if !internal.matches(&headers) {
        return unauthorized();
    }

    match directory.search_teachers(&request.query).await {
        Ok(entries) => search_response(entries),
        Err(err) => error_response(&err),
    }
}

fn search_response(entries: Vec<crate::directory::PersonEntry>) -> Response {
    let students: Vec<PersonResponse> = entries.into_iter().map(Into::into).collect();
    let body = SearchResponse {
        total: students.len(),
        students,
    };
    (StatusCode::OK, Json(body)).into_response()
}

fn unauthorized() -> Response {
    warn!("internal search request with missing or wrong internal token");
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "unauthorized".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn token() -> InternalToken {
        InternalToken::new(SecretString::from("internal-secret".to_string()))
    }

    #[test]
    fn matching_token_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            INTERNAL_TOKEN_HEADER,
            HeaderValue::from_static("internal-secret"),
        );
        assert!(token().matches(&headers));
    }

    #[test]
    fn missing_or_wrong_token_is_rejected() {
        let headers = HeaderMap::new();
        assert!(!token().matches(&headers));

        let mut headers = HeaderMap::new();
        headers.insert(INTERNAL_TOKEN_HEADER, HeaderValue::from_static("guess"));
        assert!(!token().matches(&headers));

        let mut headers = HeaderMap::new();
        headers.insert(INTERNAL_TOKEN_HEADER, HeaderValue::from_static(""));
        assert!(!token().matches(&headers));
    }
}
