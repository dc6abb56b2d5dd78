use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::entities::{GameSet, Map, Pawn, PawnKind, UserSummary};
use crate::domain::short_url::ShortUrlCodec;

/// Path under which stored map images are served.
pub const MAP_IMAGE_ROUTE_PREFIX: &str = "/storage/maps";

// Request payload for account registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub password: String,
}

// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub detail: &'static str,
}

// Form payload for password login.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

// Response payload for password login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

// Response payload for logout.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub revoked: bool,
}

// Request payload for map creation.
#[derive(Debug, Deserialize)]
pub struct CreateMapRequest {
    pub len_x: i32,
    pub len_y: i32,
}

// Request payload for game-set creation.
#[derive(Debug, Deserialize)]
pub struct CreateGameSetRequest {
    pub name: String,
    pub map_name: Option<String>,
}

// Request payload for game-set updates. `map_name` distinguishes an absent
// field (keep the map) from an explicit null (clear it).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateGameSetRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub map_name: Option<Option<String>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// `[x, y]` where both coordinates are set or both are null.
pub type PositionPayload = [Option<i32>; 2];

// Request payload for pawn placement.
#[derive(Debug, Deserialize)]
pub struct CreatePawnRequest {
    pub position: Option<PositionPayload>,
    #[serde(rename = "type", default)]
    pub kind: PawnKind,
    pub color: String,
    pub size: [i32; 2],
    pub visibility: Option<bool>,
}

// Request payload for pawn movement.
#[derive(Debug, Deserialize)]
pub struct MovePawnRequest {
    pub new_position: Option<PositionPayload>,
}

/// A position with exactly one coordinate set.
#[derive(Debug, PartialEq, Eq)]
pub struct PartialPosition;

/// Collapses a position payload: `None` when absent or `[null, null]`.
pub fn position_from_payload(
    payload: Option<PositionPayload>,
) -> Result<Option<(i32, i32)>, PartialPosition> {
    match payload {
        None | Some([None, None]) => Ok(None),
        Some([Some(x), Some(y)]) => Ok(Some((x, y))),
        Some(_) => Err(PartialPosition),
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub username: String,
    pub full_name: Option<String>,
}

impl From<&UserSummary> for UserResponse {
    fn from(user: &UserSummary) -> Self {
        Self {
            username: user.username.clone(),
            full_name: user.full_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MapMetaResponse {
    pub len_x: i32,
    pub len_y: i32,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MapResponse {
    pub name: String,
    pub meta: MapMetaResponse,
}

impl From<&Map> for MapResponse {
    fn from(map: &Map) -> Self {
        Self {
            name: map.name.clone(),
            meta: MapMetaResponse {
                len_x: map.len_x,
                len_y: map.len_y,
                image: map
                    .image
                    .as_ref()
                    .map(|image| format!("{MAP_IMAGE_ROUTE_PREFIX}/{image}")),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MapsResponse {
    pub maps: Vec<MapResponse>,
}

#[derive(Debug, Serialize)]
pub struct PawnMetaResponse {
    pub visibility: bool,
    #[serde(rename = "type")]
    pub kind: PawnKind,
    pub size_x: i32,
    pub size_y: i32,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub color: String,
}

#[derive(Debug, Serialize)]
pub struct PawnResponse {
    pub name: String,
    pub user: UserResponse,
    pub meta: PawnMetaResponse,
}

impl From<&Pawn> for PawnResponse {
    fn from(pawn: &Pawn) -> Self {
        Self {
            name: pawn.name.clone(),
            user: UserResponse::from(&pawn.owner),
            meta: PawnMetaResponse {
                visibility: pawn.meta.visibility,
                kind: pawn.meta.kind,
                size_x: pawn.meta.size_x,
                size_y: pawn.meta.size_y,
                x: pawn.meta.x,
                y: pawn.meta.y,
                color: pawn.meta.color.as_str().to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GameSetMetaResponse {
    pub map: Option<MapResponse>,
}

#[derive(Debug, Serialize)]
pub struct PlayerResponse {
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct GameSetResponse {
    pub name: String,
    pub short_url: String,
    pub owner: UserResponse,
    pub meta: GameSetMetaResponse,
    pub pawns: Vec<PawnResponse>,
    pub users_in_game: Vec<PlayerResponse>,
}

impl GameSetResponse {
    pub fn new(game_set: &GameSet, short_urls: &ShortUrlCodec) -> Self {
        Self {
            name: game_set.name.clone(),
            short_url: short_urls.encode(game_set.id),
            owner: UserResponse::from(&game_set.owner),
            meta: GameSetMetaResponse {
                map: game_set.map.as_ref().map(MapResponse::from),
            },
            pawns: game_set.pawns.iter().map(PawnResponse::from).collect(),
            users_in_game: game_set
                .players
                .iter()
                .map(|player| PlayerResponse {
                    user: UserResponse::from(player),
                })
                .collect(),
        }
    }
}

// Liveness payload including resident-store and sweeper counters.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub resident_game_sets: usize,
    pub sweeps: u64,
    pub flushed: u64,
    pub persist_failures: u64,
    pub evicted: u64,
}

// Simple error envelope for JSON responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}
