use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Form, Json};

use crate::domain::errors::AuthError;
use crate::interface_adapters::handlers::{
    authenticate, bearer_token, error_response, storage_error, HandlerError,
};
use crate::interface_adapters::protocol::{
    DetailResponse, LoginForm, LogoutResponse, RegisterRequest, TokenResponse,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::login::LoginUseCase;
use crate::use_cases::logout::LogoutUseCase;
use crate::use_cases::register::{NewAccount, RegisterUseCase};

// Handler for opening an account.
#[tracing::instrument(name = "register", skip_all, fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<DetailResponse>), HandlerError> {
    let use_case = RegisterUseCase {
        users: state.users.as_ref(),
        hasher: state.hasher.as_ref(),
    };

    let user = use_case
        .execute(NewAccount {
            username: payload.username,
            email: payload.email,
            full_name: payload.full_name,
            password: payload.password,
        })
        .await
        .map_err(|err| map_auth_error(err, AuthErrorContext::Register))?;
    tracing::info!(user_id = user.id, "account registered");

    Ok((StatusCode::CREATED, Json(DetailResponse { detail: "Created" })))
}

// Handler for exchanging username and password for a bearer token.
#[tracing::instrument(name = "login", skip_all, fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, HandlerError> {
    let use_case = LoginUseCase {
        users: state.users.as_ref(),
        hasher: state.hasher.as_ref(),
        tokens: state.tokens.as_ref(),
        clock: state.clock.as_ref(),
        ttl_seconds: state.token_ttl_seconds,
    };

    let result = use_case
        .execute(&form.username, &form.password)
        .await
        .map_err(|err| map_auth_error(err, AuthErrorContext::Login))?;

    Ok(Json(TokenResponse {
        access_token: result.access_token,
        token_type: "bearer",
    }))
}

// Handler for revoking the caller's bearer token.
#[tracing::instrument(name = "logout", skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, HandlerError> {
    authenticate(&state, &headers).await?;
    let Some(token) = bearer_token(&headers) else {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "could not validate credentials",
        ));
    };

    let use_case = LogoutUseCase {
        tokens: state.tokens.as_ref(),
    };
    let result = use_case
        .execute(token)
        .await
        .map_err(|err| map_auth_error(err, AuthErrorContext::Logout))?;

    Ok(Json(LogoutResponse {
        revoked: result.revoked,
    }))
}

// Maps domain errors to HTTP responses by endpoint context.
enum AuthErrorContext {
    Register,
    Login,
    Logout,
}

fn map_auth_error(err: AuthError, context: AuthErrorContext) -> HandlerError {
    match context {
        AuthErrorContext::Register => match err {
            AuthError::InvalidUsername => error_response(StatusCode::BAD_REQUEST, "invalid username"),
            AuthError::InvalidEmail => error_response(StatusCode::BAD_REQUEST, "invalid email"),
            AuthError::InvalidFullName => {
                error_response(StatusCode::BAD_REQUEST, "invalid full_name")
            }
            AuthError::InvalidPassword => error_response(StatusCode::BAD_REQUEST, "invalid password"),
            AuthError::UserExists => error_response(StatusCode::CONFLICT, "user already exists"),
            AuthError::StorageFailure
            | AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::SessionExpired => storage_error(),
        },
        AuthErrorContext::Login => match err {
            AuthError::StorageFailure => storage_error(),
            _ => error_response(StatusCode::UNAUTHORIZED, "incorrect username or password"),
        },
        AuthErrorContext::Logout => match err {
            AuthError::StorageFailure => storage_error(),
            _ => error_response(StatusCode::UNAUTHORIZED, "could not validate credentials"),
        },
    }
}
