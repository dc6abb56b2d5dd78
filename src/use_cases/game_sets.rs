use crate::domain::entities::{GameSet, Map, User};
use crate::domain::errors::{GameSetError, StorageError};
use crate::domain::ports::{GameSetRepository, MapRepository};
use crate::use_cases::game_set_storage::{GameSetHandle, GameSetStorage};
use crate::use_cases::is_bounded_text;

pub const MAX_GAME_SET_NAME_LEN: usize = 60;

/// What an update does to the game set's map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MapChange {
    #[default]
    Keep,
    Clear,
    Set(String),
}

#[derive(Clone, Debug, Default)]
pub struct GameSetUpdate {
    pub name: Option<String>,
    pub map: MapChange,
}

/// Returns the resident copy of game set `id`, hydrating it from durable
/// storage on a miss.
pub async fn resume_game_set(
    storage: &GameSetStorage,
    game_sets: &dyn GameSetRepository,
    id: i64,
) -> Result<GameSetHandle, GameSetError> {
    if let Some(handle) = storage.get(id).await {
        return Ok(handle);
    }

    let game_set = game_sets
        .load(id)
        .await
        .map_err(storage_failure)?
        .ok_or(GameSetError::NotFound)?;

    // Two requests may miss at once; whichever lands first stays resident.
    Ok(storage.put_if_absent(id, game_set).await)
}

// Game-set workflows over the resident store with injected dependencies.
pub struct GameSetsUseCase<'a> {
    pub storage: &'a GameSetStorage,
    pub game_sets: &'a dyn GameSetRepository,
    pub maps: &'a dyn MapRepository,
}

impl GameSetsUseCase<'_> {
    pub async fn create(
        &self,
        owner: &User,
        name: &str,
        map_name: Option<&str>,
    ) -> Result<GameSet, GameSetError> {
        if !is_bounded_text(name, MAX_GAME_SET_NAME_LEN) {
            return Err(GameSetError::InvalidName);
        }
        let map = match map_name {
            Some(map_name) => Some(self.find_map(owner.id, map_name).await?),
            None => None,
        };

        let id = self
            .game_sets
            .create(owner.id, name, map.as_ref().map(|map| map.id))
            .await
            .map_err(storage_failure)?;

        let game_set = GameSet {
            id,
            name: name.to_string(),
            owner: owner.summary(),
            map,
            pawns: Vec::new(),
            players: Vec::new(),
        };
        self.storage.put(id, game_set.clone()).await;
        tracing::info!(game_set_id = id, owner_id = owner.id, "game set created");

        Ok(game_set)
    }

    /// The game set as `user_id` is allowed to see it. Non-members get
    /// `NotFound` so ids cannot be probed.
    pub async fn get(&self, user_id: i64, id: i64) -> Result<GameSet, GameSetError> {
        let handle = resume_game_set(self.storage, self.game_sets, id).await?;
        let entry = handle.lock().await;
        let game_set = entry.game_set();
        if !game_set.is_member(user_id) {
            return Err(GameSetError::NotFound);
        }
        Ok(game_set.view_for(user_id))
    }

    /// Applies `update` to the resident copy. The change reaches durable
    /// storage on the next sweep.
    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        update: GameSetUpdate,
    ) -> Result<GameSet, GameSetError> {
        if let Some(name) = &update.name {
            if !is_bounded_text(name, MAX_GAME_SET_NAME_LEN) {
                return Err(GameSetError::InvalidName);
            }
        }

        let handle = resume_game_set(self.storage, self.game_sets, id).await?;
        let mut entry = handle.lock().await;
        if !entry.game_set().is_owner(user_id) {
            return Err(GameSetError::NotOwner);
        }

        let map = match update.map {
            MapChange::Keep => None,
            MapChange::Clear => Some(None),
            MapChange::Set(map_name) => Some(Some(self.find_map(user_id, &map_name).await?)),
        };
        if update.name.is_none() && map.is_none() {
            return Ok(entry.game_set().clone());
        }

        entry.modify(|game_set| {
            if let Some(name) = update.name {
                game_set.name = name;
            }
            if let Some(map) = map {
                game_set.map = map;
            }
        });
        tracing::debug!(game_set_id = id, revision = entry.revision(), "game set updated");

        Ok(entry.game_set().clone())
    }

    pub async fn join(&self, user: &User, id: i64) -> Result<(), GameSetError> {
        let handle = resume_game_set(self.storage, self.game_sets, id).await?;
        let mut entry = handle.lock().await;
        let game_set = entry.game_set();
        if game_set.is_owner(user.id) {
            return Err(GameSetError::OwnerCannotJoin);
        }
        if game_set.is_player(user.id) {
            return Err(GameSetError::AlreadyJoined);
        }

        // Membership is structural: written through, then mirrored in memory
        // while the entry lock is still held.
        match self.game_sets.add_player(id, user.id).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => return Err(GameSetError::AlreadyJoined),
            Err(err) => return Err(storage_failure(err)),
        }
        entry.modify(|game_set| game_set.players.push(user.summary()));
        tracing::info!(game_set_id = id, user_id = user.id, "player joined game set");

        Ok(())
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> Result<(), GameSetError> {
        let handle = resume_game_set(self.storage, self.game_sets, id).await?;
        let entry = handle.lock().await;
        if !entry.game_set().is_owner(user_id) {
            return Err(GameSetError::NotOwner);
        }

        self.game_sets.delete(id).await.map_err(storage_failure)?;
        drop(entry);
        self.storage.remove(id).await;
        tracing::info!(game_set_id = id, "game set deleted");

        Ok(())
    }

    /// Game sets owned by `user_id`, preferring resident copies since they
    /// may hold changes not yet flushed.
    pub async fn list_owned(&self, user_id: i64) -> Result<Vec<GameSet>, GameSetError> {
        let stored = self
            .game_sets
            .list_owned(user_id)
            .await
            .map_err(storage_failure)?;

        let mut listed = Vec::with_capacity(stored.len());
        for game_set in stored {
            listed.push(self.resident_or(game_set).await);
        }
        Ok(listed)
    }

    /// Game sets `user_id` joined as a player, filtered to what they may see.
    pub async fn list_joined(&self, user_id: i64) -> Result<Vec<GameSet>, GameSetError> {
        let stored = self
            .game_sets
            .list_joined(user_id)
            .await
            .map_err(storage_failure)?;

        let mut listed = Vec::with_capacity(stored.len());
        for game_set in stored {
            listed.push(self.resident_or(game_set).await.view_for(user_id));
        }
        Ok(listed)
    }

    async fn resident_or(&self, stored: GameSet) -> GameSet {
        match self.storage.peek(stored.id).await {
            Some(handle) => handle.lock().await.game_set().clone(),
            None => stored,
        }
    }

    async fn find_map(&self, user_id: i64, name: &str) -> Result<Map, GameSetError> {
        self.maps
            .find_by_name(user_id, name)
            .await
            .map_err(storage_failure)?
            .ok_or(GameSetError::MapNotFound)
    }
}

fn storage_failure(err: StorageError) -> GameSetError {
    tracing::error!(error = %err, "game set storage failure");
    GameSetError::StorageFailure
}
