//! HTTP handlers. Marshaling only; all protocol logic lives in the core.

pub(crate) mod auth;
pub(crate) mod directory;
pub(crate) mod health;
pub(crate) mod types;

pub use directory::InternalToken;

use axum::{http::StatusCode, response::IntoResponse, Json};

use types::MessageResponse;

#[utoipa::path(
    get,
    path = "/api/v1/ping",
    responses(
        (status = 200, description = "Service is up", body = MessageResponse)
    ),
    tag = "health"
)]
pub async fn ping() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(MessageResponse {
            message: "pong".to_string(),
        }),
    )
}
