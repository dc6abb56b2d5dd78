use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;

use crate::domain::errors::MapError;
use crate::interface_adapters::handlers::{authenticate, error_response, storage_error, HandlerError};
use crate::interface_adapters::protocol::{CreateMapRequest, MapResponse};
use crate::interface_adapters::state::AppState;
use crate::use_cases::maps::{sniff_image, MapsUseCase};

fn use_case(state: &AppState) -> MapsUseCase<'_> {
    MapsUseCase {
        maps: state.maps.as_ref(),
        images: state.images.as_ref(),
        storage: state.storage.as_ref(),
    }
}

#[tracing::instrument(name = "create_map", skip_all, fields(map = %map_name))]
pub async fn create_map(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(map_name): Path<String>,
    Json(payload): Json<CreateMapRequest>,
) -> Result<(StatusCode, Json<MapResponse>), HandlerError> {
    let user = authenticate(&state, &headers).await?;

    let map = use_case(&state)
        .create(user.id, &map_name, payload.len_x, payload.len_y)
        .await
        .map_err(|err| map_map_error(err, MapErrorContext::Map))?;

    Ok((StatusCode::CREATED, Json(MapResponse::from(&map))))
}

#[tracing::instrument(name = "upload_map_image", skip_all, fields(map = %map_name, bytes = body.len()))]
pub async fn upload_map_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(map_name): Path<String>,
    body: Bytes,
) -> Result<Json<MapResponse>, HandlerError> {
    let user = authenticate(&state, &headers).await?;

    let map = use_case(&state)
        .upload_image(user.id, &map_name, body.to_vec())
        .await
        .map_err(|err| map_map_error(err, MapErrorContext::Map))?;

    Ok(Json(MapResponse::from(&map)))
}

// Serves stored map images without authentication, like static files.
#[tracing::instrument(name = "map_image", skip_all, fields(image = %image))]
pub async fn map_image(
    State(state): State<AppState>,
    Path(image): Path<String>,
) -> Result<([(header::HeaderName, &'static str); 1], Vec<u8>), HandlerError> {
    let bytes = use_case(&state)
        .load_image(&image)
        .await
        .map_err(|err| map_map_error(err, MapErrorContext::Image))?;
    let content_type = sniff_image(&bytes).unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

// Maps domain errors to HTTP responses by endpoint context.
enum MapErrorContext {
    Map,
    Image,
}

fn map_map_error(err: MapError, context: MapErrorContext) -> HandlerError {
    match err {
        MapError::InvalidName => error_response(StatusCode::BAD_REQUEST, "invalid map name"),
        MapError::InvalidDimensions => error_response(
            StatusCode::BAD_REQUEST,
            "map dimensions must be between 1 and 1000",
        ),
        MapError::AlreadyExists => error_response(StatusCode::CONFLICT, "map already exists"),
        MapError::NotFound => match context {
            MapErrorContext::Map => error_response(StatusCode::NOT_FOUND, "map not found"),
            MapErrorContext::Image => error_response(StatusCode::NOT_FOUND, "image not found"),
        },
        MapError::InvalidImage => error_response(
            StatusCode::BAD_REQUEST,
            "expected a non-empty png, jpeg, gif or webp image",
        ),
        MapError::StorageFailure => storage_error(),
    }
}
