//! OpenAPI documentation for the HTTP API.

use utoipa::OpenApi;

use super::handlers;
use crate::auth::models::Role;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::ping,
        handlers::health::health,
        handlers::auth::sign_in,
        handlers::auth::refresh,
        handlers::auth::access_token,
        handlers::auth::me,
        handlers::auth::sign_out,
        handlers::directory::search_students,
        handlers::directory::search_teachers,
    ),
    components(schemas(
        Role,
        handlers::health::Health,
        handlers::types::SignInRequest,
        handlers::types::SignInResponse,
        handlers::types::RefreshResponse,
        handlers::types::AccessTokenResponse,
        handlers::types::UserResponse,
        handlers::types::MessageResponse,
        handlers::types::ErrorResponse,
        handlers::types::SearchRequest,
        handlers::types::SearchResponse,
        handlers::types::PersonResponse,
    )),
    tags(
        (name = "auth", description = "Sign-in, token rotation, and session endpoints"),
        (name = "health", description = "Service health"),
        (name = "internal", description = "Service-to-service directory search")
    )
)]
pub struct ApiDoc;
