pub mod auth;
pub mod game_sets;
pub mod health;
pub mod maps;
pub mod pawns;
pub mod users;

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::Json;

use crate::domain::entities::User;
use crate::domain::errors::AuthError;
use crate::interface_adapters::protocol::ErrorResponse;
use crate::interface_adapters::state::AppState;
use crate::use_cases::verify_token::VerifyTokenUseCase;

pub type HandlerError = (StatusCode, Json<ErrorResponse>);

// Helper to build a JSON error response.
pub(crate) fn error_response(status: StatusCode, message: &str) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            message: message.to_string(),
        }),
    )
}

pub(crate) fn storage_error() -> HandlerError {
    error_response(StatusCode::BAD_GATEWAY, "storage error")
}

fn unauthorized() -> HandlerError {
    error_response(StatusCode::UNAUTHORIZED, "could not validate credentials")
}

/// Token from an `Authorization: Bearer <token>` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolves the caller from the bearer token, or rejects with 401.
pub(crate) async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, HandlerError> {
    let token = bearer_token(headers).ok_or_else(unauthorized)?;
    let use_case = VerifyTokenUseCase {
        tokens: state.tokens.as_ref(),
        users: state.users.as_ref(),
        clock: state.clock.as_ref(),
    };

    use_case.execute(token).await.map_err(|err| match err {
        AuthError::StorageFailure => storage_error(),
        _ => unauthorized(),
    })
}

/// Game-set id behind a short URL. Undecodable URLs are reported like
/// unknown game sets.
pub(crate) fn decode_short_url(state: &AppState, short_url: &str) -> Result<i64, HandlerError> {
    state
        .short_urls
        .decode(short_url)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "game set not found"))
}
