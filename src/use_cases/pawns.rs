use crate::domain::entities::{Color, Map, NewPawn, Pawn, PawnKind, PawnMeta, User};
use crate::domain::errors::{PawnError, StorageError};
use crate::domain::ports::GameSetRepository;
use crate::use_cases::game_set_storage::GameSetStorage;
use crate::use_cases::game_sets::resume_game_set;
use crate::use_cases::is_bounded_text;

pub const MAX_PAWN_NAME_LEN: usize = 30;
/// Side lengths allowed for movable pawns, which are always square.
pub const MOVABLE_PAWN_SIZES: [i32; 5] = [2, 5, 10, 15, 20];
pub const MAX_STATIC_PAWN_SIDE: i32 = 100;

// Fields a client supplies when placing a new pawn.
#[derive(Clone, Debug)]
pub struct PawnRequest {
    pub position: Option<(i32, i32)>,
    pub kind: PawnKind,
    pub color: String,
    pub size: (i32, i32),
    pub visibility: bool,
}

// Pawn workflows over resident game sets with injected dependencies.
pub struct PawnsUseCase<'a> {
    pub storage: &'a GameSetStorage,
    pub game_sets: &'a dyn GameSetRepository,
}

impl PawnsUseCase<'_> {
    pub async fn create(
        &self,
        user: &User,
        game_set_id: i64,
        name: &str,
        request: PawnRequest,
    ) -> Result<Pawn, PawnError> {
        if !is_bounded_text(name, MAX_PAWN_NAME_LEN) {
            return Err(PawnError::InvalidName);
        }
        let color = Color::parse(&request.color).ok_or(PawnError::InvalidColor)?;
        validate_size(request.kind, request.size)?;

        let handle = resume_game_set(self.storage, self.game_sets, game_set_id).await?;
        let mut entry = handle.lock().await;
        let game_set = entry.game_set();
        if !game_set.is_member(user.id) {
            return Err(PawnError::GameSetNotFound);
        }
        if game_set.pawn(name).is_some() {
            return Err(PawnError::AlreadyExists);
        }
        let (x, y) = match request.position {
            Some((x, y)) => {
                let (x, y) = place(game_set.map.as_ref(), x, y)?;
                (Some(x), Some(y))
            }
            None => (None, None),
        };

        let new_pawn = NewPawn {
            game_set_id,
            owner: user.summary(),
            name: name.to_string(),
            meta: PawnMeta {
                visibility: request.visibility,
                kind: request.kind,
                size_x: request.size.0,
                size_y: request.size.1,
                x,
                y,
                color,
            },
        };
        let pawn = self
            .game_sets
            .add_pawn(new_pawn)
            .await
            .map_err(|err| match err {
                StorageError::Conflict => PawnError::AlreadyExists,
                err => {
                    tracing::error!(error = %err, "failed to store pawn");
                    PawnError::StorageFailure
                }
            })?;
        entry.modify(|game_set| game_set.pawns.push(pawn.clone()));
        tracing::info!(game_set_id, pawn_id = pawn.id, "pawn created");

        Ok(pawn)
    }

    /// Moves a pawn on the resident copy, or takes it off the board when
    /// `new_position` is `None`. Coordinates are clamped to the map grid.
    pub async fn move_pawn(
        &self,
        user_id: i64,
        game_set_id: i64,
        name: &str,
        new_position: Option<(i32, i32)>,
    ) -> Result<Pawn, PawnError> {
        let handle = resume_game_set(self.storage, self.game_sets, game_set_id).await?;
        let mut entry = handle.lock().await;
        let game_set = entry.game_set();
        if !game_set.is_member(user_id) {
            return Err(PawnError::GameSetNotFound);
        }

        let is_owner = game_set.is_owner(user_id);
        let pawn = game_set.pawn(name).ok_or(PawnError::NotFound)?;
        if !is_owner {
            if pawn.owner.id != user_id {
                // Hidden pawns of other users do not exist for this caller.
                return Err(if pawn.meta.visibility {
                    PawnError::Forbidden
                } else {
                    PawnError::NotFound
                });
            }
            if pawn.meta.kind == PawnKind::Static {
                return Err(PawnError::Forbidden);
            }
        }

        let position = match new_position {
            Some((x, y)) => Some(place(game_set.map.as_ref(), x, y)?),
            None => None,
        };

        let moved = entry.modify(|game_set| {
            game_set.pawn_mut(name).map(|pawn| {
                pawn.meta.x = position.map(|(x, _)| x);
                pawn.meta.y = position.map(|(_, y)| y);
                pawn.clone()
            })
        });
        moved.ok_or(PawnError::NotFound)
    }
}

fn validate_size(kind: PawnKind, (size_x, size_y): (i32, i32)) -> Result<(), PawnError> {
    let valid = match kind {
        PawnKind::Movable => size_x == size_y && MOVABLE_PAWN_SIZES.contains(&size_x),
        PawnKind::Static => {
            (1..=MAX_STATIC_PAWN_SIDE).contains(&size_x)
                && (1..=MAX_STATIC_PAWN_SIDE).contains(&size_y)
        }
    };
    if valid {
        Ok(())
    } else {
        Err(PawnError::InvalidSize)
    }
}

// Clamps into [0, len] on a map; off-map coordinates only need to be
// non-negative.
fn place(map: Option<&Map>, x: i32, y: i32) -> Result<(i32, i32), PawnError> {
    match map {
        Some(map) => Ok((x.clamp(0, map.len_x), y.clamp(0, map.len_y))),
        None if x < 0 || y < 0 => Err(PawnError::InvalidPosition),
        None => Ok((x, y)),
    }
}
