use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::domain::errors::GameSetError;
use crate::interface_adapters::handlers::{
    authenticate, decode_short_url, error_response, storage_error, HandlerError,
};
use crate::interface_adapters::protocol::{
    CreateGameSetRequest, DetailResponse, GameSetResponse, UpdateGameSetRequest,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::game_sets::{GameSetUpdate, GameSetsUseCase, MapChange};

fn use_case(state: &AppState) -> GameSetsUseCase<'_> {
    GameSetsUseCase {
        storage: state.storage.as_ref(),
        game_sets: state.game_sets.as_ref(),
        maps: state.maps.as_ref(),
    }
}

#[tracing::instrument(name = "create_game_set", skip_all)]
pub async fn create_game_set(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateGameSetRequest>,
) -> Result<(StatusCode, Json<GameSetResponse>), HandlerError> {
    let user = authenticate(&state, &headers).await?;

    let game_set = use_case(&state)
        .create(&user, &payload.name, payload.map_name.as_deref())
        .await
        .map_err(map_game_set_error)?;

    Ok((
        StatusCode::CREATED,
        Json(GameSetResponse::new(&game_set, &state.short_urls)),
    ))
}

#[tracing::instrument(name = "get_game_set", skip_all, fields(short_url = %short_url))]
pub async fn get_game_set(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(short_url): Path<String>,
) -> Result<Json<GameSetResponse>, HandlerError> {
    let user = authenticate(&state, &headers).await?;
    let id = decode_short_url(&state, &short_url)?;

    let game_set = use_case(&state)
        .get(user.id, id)
        .await
        .map_err(map_game_set_error)?;

    Ok(Json(GameSetResponse::new(&game_set, &state.short_urls)))
}

#[tracing::instrument(name = "update_game_set", skip_all, fields(short_url = %short_url))]
pub async fn update_game_set(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(short_url): Path<String>,
    Json(payload): Json<UpdateGameSetRequest>,
) -> Result<Json<GameSetResponse>, HandlerError> {
    let user = authenticate(&state, &headers).await?;
    let id = decode_short_url(&state, &short_url)?;

    let map = match payload.map_name {
        None => MapChange::Keep,
        Some(None) => MapChange::Clear,
        Some(Some(map_name)) => MapChange::Set(map_name),
    };
    let game_set = use_case(&state)
        .update(
            user.id,
            id,
            GameSetUpdate {
                name: payload.name,
                map,
            },
        )
        .await
        .map_err(map_game_set_error)?;

    Ok(Json(GameSetResponse::new(&game_set, &state.short_urls)))
}

#[tracing::instrument(name = "join_game_set", skip_all, fields(short_url = %short_url))]
pub async fn join_game_set(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(short_url): Path<String>,
) -> Result<(StatusCode, Json<DetailResponse>), HandlerError> {
    let user = authenticate(&state, &headers).await?;
    let id = decode_short_url(&state, &short_url)?;

    use_case(&state)
        .join(&user, id)
        .await
        .map_err(map_game_set_error)?;

    Ok((StatusCode::ACCEPTED, Json(DetailResponse { detail: "Accepted" })))
}

#[tracing::instrument(name = "delete_game_set", skip_all, fields(short_url = %short_url))]
pub async fn delete_game_set(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(short_url): Path<String>,
) -> Result<Json<DetailResponse>, HandlerError> {
    let user = authenticate(&state, &headers).await?;
    let id = decode_short_url(&state, &short_url)?;

    use_case(&state)
        .delete(user.id, id)
        .await
        .map_err(map_game_set_error)?;

    Ok(Json(DetailResponse { detail: "Deleted" }))
}

pub(crate) fn map_game_set_error(err: GameSetError) -> HandlerError {
    match err {
        GameSetError::NotFound => error_response(StatusCode::NOT_FOUND, "game set not found"),
        GameSetError::InvalidName => error_response(StatusCode::BAD_REQUEST, "invalid game set name"),
        GameSetError::MapNotFound => error_response(StatusCode::NOT_FOUND, "selected map not found"),
        GameSetError::NotOwner => error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "only the owner may change this game set",
        ),
        GameSetError::OwnerCannotJoin => error_response(
            StatusCode::NOT_ACCEPTABLE,
            "owner cannot join own game set",
        ),
        // 304 carries no body on the wire; the message is for logs and tests.
        GameSetError::AlreadyJoined => error_response(StatusCode::NOT_MODIFIED, "already joined"),
        GameSetError::StorageFailure => storage_error(),
    }
}
