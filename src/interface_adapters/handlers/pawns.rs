use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::domain::errors::PawnError;
use crate::interface_adapters::handlers::{
    authenticate, decode_short_url, error_response, storage_error, HandlerError,
};
use crate::interface_adapters::protocol::{
    position_from_payload, CreatePawnRequest, MovePawnRequest, PawnResponse,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::pawns::{PawnRequest, PawnsUseCase};

fn use_case(state: &AppState) -> PawnsUseCase<'_> {
    PawnsUseCase {
        storage: state.storage.as_ref(),
        game_sets: state.game_sets.as_ref(),
    }
}

#[tracing::instrument(name = "create_pawn", skip_all, fields(short_url = %short_url, pawn = %pawn_name))]
pub async fn create_pawn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((short_url, pawn_name)): Path<(String, String)>,
    Json(payload): Json<CreatePawnRequest>,
) -> Result<(StatusCode, Json<PawnResponse>), HandlerError> {
    let user = authenticate(&state, &headers).await?;
    let id = decode_short_url(&state, &short_url)?;
    let position = position_from_payload(payload.position)
        .map_err(|_| map_pawn_error(PawnError::InvalidPosition))?;

    let pawn = use_case(&state)
        .create(
            &user,
            id,
            &pawn_name,
            PawnRequest {
                position,
                kind: payload.kind,
                color: payload.color,
                size: (payload.size[0], payload.size[1]),
                visibility: payload.visibility.unwrap_or(true),
            },
        )
        .await
        .map_err(map_pawn_error)?;

    Ok((StatusCode::CREATED, Json(PawnResponse::from(&pawn))))
}

#[tracing::instrument(name = "move_pawn", skip_all, fields(short_url = %short_url, pawn = %pawn_name))]
pub async fn move_pawn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((short_url, pawn_name)): Path<(String, String)>,
    Json(payload): Json<MovePawnRequest>,
) -> Result<Json<PawnResponse>, HandlerError> {
    let user = authenticate(&state, &headers).await?;
    let id = decode_short_url(&state, &short_url)?;
    let position = position_from_payload(payload.new_position)
        .map_err(|_| map_pawn_error(PawnError::InvalidPosition))?;

    let pawn = use_case(&state)
        .move_pawn(user.id, id, &pawn_name, position)
        .await
        .map_err(map_pawn_error)?;

    Ok(Json(PawnResponse::from(&pawn)))
}

fn map_pawn_error(err: PawnError) -> HandlerError {
    match err {
        PawnError::GameSetNotFound => error_response(StatusCode::NOT_FOUND, "game set not found"),
        PawnError::InvalidName => error_response(StatusCode::BAD_REQUEST, "invalid pawn name"),
        PawnError::InvalidColor => error_response(StatusCode::BAD_REQUEST, "invalid color"),
        PawnError::InvalidSize => error_response(StatusCode::BAD_REQUEST, "invalid pawn size"),
        PawnError::InvalidPosition => error_response(StatusCode::BAD_REQUEST, "invalid position"),
        PawnError::AlreadyExists => error_response(StatusCode::CONFLICT, "pawn already exists"),
        PawnError::NotFound => error_response(StatusCode::NOT_FOUND, "pawn not found"),
        PawnError::Forbidden => {
            error_response(StatusCode::FORBIDDEN, "not allowed to move this pawn")
        }
        PawnError::StorageFailure => storage_error(),
    }
}
