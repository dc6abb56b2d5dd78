use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::domain::errors::MapError;
use crate::interface_adapters::handlers::game_sets::map_game_set_error;
use crate::interface_adapters::handlers::{authenticate, error_response, storage_error, HandlerError};
use crate::interface_adapters::protocol::{GameSetResponse, MapResponse, MapsResponse};
use crate::interface_adapters::state::AppState;
use crate::use_cases::game_sets::GameSetsUseCase;
use crate::use_cases::maps::MapsUseCase;

#[tracing::instrument(name = "user_maps", skip_all)]
pub async fn user_maps(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MapsResponse>, HandlerError> {
    let user = authenticate(&state, &headers).await?;
    let use_case = MapsUseCase {
        maps: state.maps.as_ref(),
        images: state.images.as_ref(),
        storage: state.storage.as_ref(),
    };

    let maps = use_case.list(user.id).await.map_err(|err| match err {
        MapError::StorageFailure => storage_error(),
        _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not list maps"),
    })?;

    Ok(Json(MapsResponse {
        maps: maps.iter().map(MapResponse::from).collect(),
    }))
}

#[tracing::instrument(name = "user_game_sets", skip_all)]
pub async fn user_game_sets(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<GameSetResponse>>, HandlerError> {
    let user = authenticate(&state, &headers).await?;

    let game_sets = game_sets_use_case(&state)
        .list_owned(user.id)
        .await
        .map_err(map_game_set_error)?;

    Ok(Json(
        game_sets
            .iter()
            .map(|game_set| GameSetResponse::new(game_set, &state.short_urls))
            .collect(),
    ))
}

#[tracing::instrument(name = "user_in_games", skip_all)]
pub async fn user_in_games(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<GameSetResponse>>, HandlerError> {
    let user = authenticate(&state, &headers).await?;

    let game_sets = game_sets_use_case(&state)
        .list_joined(user.id)
        .await
        .map_err(map_game_set_error)?;

    Ok(Json(
        game_sets
            .iter()
            .map(|game_set| GameSetResponse::new(game_set, &state.short_urls))
            .collect(),
    ))
}

fn game_sets_use_case(state: &AppState) -> GameSetsUseCase<'_> {
    GameSetsUseCase {
        storage: state.storage.as_ref(),
        game_sets: state.game_sets.as_ref(),
        maps: state.maps.as_ref(),
    }
}
