// In-memory storage adapters. Used for local development without
// PostgreSQL and by the route and integration tests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::entities::{
    AccessToken, GameSet, Map, NewPawn, NewUser, Pawn, PawnMeta, User, UserSummary,
};
use crate::domain::errors::StorageError;
use crate::domain::ports::{
    AccessTokenStore, GameSetPersister, GameSetRepository, ImageStore, MapRepository,
    UserRepository,
};

#[derive(Clone, Debug)]
struct GameSetRow {
    id: i64,
    name: String,
    owner_id: i64,
    map_id: Option<i64>,
}

#[derive(Clone, Debug)]
struct PawnRow {
    id: i64,
    game_set_id: i64,
    user_id: i64,
    name: String,
    meta: PawnMeta,
}

#[derive(Default, Debug)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    maps: Vec<Map>,
    game_sets: Vec<GameSetRow>,
    players: Vec<(i64, i64)>,
    pawns: Vec<PawnRow>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn summary(&self, user_id: i64) -> Option<UserSummary> {
        self.users
            .iter()
            .find(|user| user.id == user_id)
            .map(User::summary)
    }

    fn assemble(&self, row: &GameSetRow) -> Option<GameSet> {
        let owner = self.summary(row.owner_id)?;
        let map = row
            .map_id
            .and_then(|map_id| self.maps.iter().find(|map| map.id == map_id).cloned());
        let pawns = self
            .pawns
            .iter()
            .filter(|pawn| pawn.game_set_id == row.id)
            .filter_map(|pawn| {
                Some(Pawn {
                    id: pawn.id,
                    name: pawn.name.clone(),
                    owner: self.summary(pawn.user_id)?,
                    meta: pawn.meta.clone(),
                })
            })
            .collect();
        let players = self
            .players
            .iter()
            .filter(|(game_set_id, _)| *game_set_id == row.id)
            .filter_map(|(_, user_id)| self.summary(*user_id))
            .collect();

        Some(GameSet {
            id: row.id,
            name: row.name.clone(),
            owner,
            map,
            pawns,
            players,
        })
    }
}

/// Shared backing tables for the in-memory repositories.
#[derive(Clone, Default, Debug)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryDatabase {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Backend("memory tables poisoned".to_string()))
    }
}

#[derive(Clone)]
pub struct InMemoryUserRepository {
    pub db: MemoryDatabase,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, StorageError> {
        let mut tables = self.db.lock()?;
        let taken = tables
            .users
            .iter()
            .any(|existing| existing.username == user.username || existing.email == user.email);
        if taken {
            return Err(StorageError::Conflict);
        }
        let created = User {
            id: tables.next_id(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            password_hash: user.password_hash,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let tables = self.db.lock()?;
        Ok(tables
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StorageError> {
        let tables = self.db.lock()?;
        Ok(tables.users.iter().find(|user| user.id == id).cloned())
    }
}

#[derive(Clone)]
pub struct InMemoryMapRepository {
    pub db: MemoryDatabase,
}

#[async_trait]
impl MapRepository for InMemoryMapRepository {
    async fn create(
        &self,
        user_id: i64,
        name: &str,
        len_x: i32,
        len_y: i32,
    ) -> Result<Map, StorageError> {
        let mut tables = self.db.lock()?;
        if tables
            .maps
            .iter()
            .any(|map| map.user_id == user_id && map.name == name)
        {
            return Err(StorageError::Conflict);
        }
        let map = Map {
            id: tables.next_id(),
            user_id,
            name: name.to_string(),
            len_x,
            len_y,
            image: None,
        };
        tables.maps.push(map.clone());
        Ok(map)
    }

    async fn find_by_name(&self, user_id: i64, name: &str) -> Result<Option<Map>, StorageError> {
        let tables = self.db.lock()?;
        Ok(tables
            .maps
            .iter()
            .find(|map| map.user_id == user_id && map.name == name)
            .cloned())
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Map>, StorageError> {
        let tables = self.db.lock()?;
        Ok(tables
            .maps
            .iter()
            .filter(|map| map.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn set_image(&self, map_id: i64, image: &str) -> Result<(), StorageError> {
        let mut tables = self.db.lock()?;
        if let Some(map) = tables.maps.iter_mut().find(|map| map.id == map_id) {
            map.image = Some(image.to_string());
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct InMemoryGameSetRepository {
    pub db: MemoryDatabase,
}

#[async_trait]
impl GameSetRepository for InMemoryGameSetRepository {
    async fn create(
        &self,
        owner_id: i64,
        name: &str,
        map_id: Option<i64>,
    ) -> Result<i64, StorageError> {
        let mut tables = self.db.lock()?;
        let id = tables.next_id();
        tables.game_sets.push(GameSetRow {
            id,
            name: name.to_string(),
            owner_id,
            map_id,
        });
        Ok(id)
    }

    async fn load(&self, id: i64) -> Result<Option<GameSet>, StorageError> {
        let tables = self.db.lock()?;
        Ok(tables
            .game_sets
            .iter()
            .find(|row| row.id == id)
            .and_then(|row| tables.assemble(row)))
    }

    async fn delete(&self, id: i64) -> Result<(), StorageError> {
        let mut tables = self.db.lock()?;
        tables.game_sets.retain(|row| row.id != id);
        tables.players.retain(|(game_set_id, _)| *game_set_id != id);
        tables.pawns.retain(|pawn| pawn.game_set_id != id);
        Ok(())
    }

    async fn add_player(&self, game_set_id: i64, user_id: i64) -> Result<(), StorageError> {
        let mut tables = self.db.lock()?;
        if tables.players.contains(&(game_set_id, user_id)) {
            return Err(StorageError::Conflict);
        }
        tables.players.push((game_set_id, user_id));
        Ok(())
    }

    async fn add_pawn(&self, pawn: NewPawn) -> Result<Pawn, StorageError> {
        let mut tables = self.db.lock()?;
        if tables
            .pawns
            .iter()
            .any(|row| row.game_set_id == pawn.game_set_id && row.name == pawn.name)
        {
            return Err(StorageError::Conflict);
        }
        let id = tables.next_id();
        tables.pawns.push(PawnRow {
            id,
            game_set_id: pawn.game_set_id,
            user_id: pawn.owner.id,
            name: pawn.name.clone(),
            meta: pawn.meta.clone(),
        });
        Ok(Pawn {
            id,
            name: pawn.name,
            owner: pawn.owner,
            meta: pawn.meta,
        })
    }

    async fn list_owned(&self, user_id: i64) -> Result<Vec<GameSet>, StorageError> {
        let tables = self.db.lock()?;
        Ok(tables
            .game_sets
            .iter()
            .filter(|row| row.owner_id == user_id)
            .filter_map(|row| tables.assemble(row))
            .collect())
    }

    async fn list_joined(&self, user_id: i64) -> Result<Vec<GameSet>, StorageError> {
        let tables = self.db.lock()?;
        Ok(tables
            .players
            .iter()
            .filter(|(_, player_id)| *player_id == user_id)
            .filter_map(|(game_set_id, _)| {
                tables
                    .game_sets
                    .iter()
                    .find(|row| row.id == *game_set_id)
                    .and_then(|row| tables.assemble(row))
            })
            .collect())
    }
}

#[async_trait]
impl GameSetPersister for InMemoryGameSetRepository {
    async fn persist(&self, game_set: &GameSet) -> Result<(), StorageError> {
        let mut tables = self.db.lock()?;
        let row = tables
            .game_sets
            .iter_mut()
            .find(|row| row.id == game_set.id)
            .ok_or(StorageError::NotFound)?;
        row.name = game_set.name.clone();
        row.map_id = game_set.map.as_ref().map(|map| map.id);
        for pawn in &game_set.pawns {
            if let Some(row) = tables
                .pawns
                .iter_mut()
                .find(|row| row.id == pawn.id && row.game_set_id == game_set.id)
            {
                row.meta = pawn.meta.clone();
            }
        }
        Ok(())
    }
}

// In-memory token store adapter for the auth flow.
#[derive(Clone, Default)]
pub struct InMemoryAccessTokenStore {
    pub tokens: Arc<tokio::sync::Mutex<HashMap<String, AccessToken>>>,
}

#[async_trait]
impl AccessTokenStore for InMemoryAccessTokenStore {
    async fn insert(&self, token: String, access: AccessToken) -> Result<(), StorageError> {
        let mut tokens = self.tokens.lock().await;
        tokens.insert(token, access);
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<AccessToken>, StorageError> {
        let tokens = self.tokens.lock().await;
        Ok(tokens.get(token).cloned())
    }

    async fn remove(&self, token: &str) -> Result<bool, StorageError> {
        let mut tokens = self.tokens.lock().await;
        Ok(tokens.remove(token).is_some())
    }

    async fn purge_expired(&self, now: u64) -> Result<usize, StorageError> {
        let mut tokens = self.tokens.lock().await;
        let before = tokens.len();
        tokens.retain(|_, access| access.expires_at > now);
        Ok(before - tokens.len())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryImageStore {
    images: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn save(&self, bytes: Vec<u8>) -> Result<String, StorageError> {
        let name = format!("{:x}", Sha256::digest(&bytes));
        let mut images = self
            .images
            .lock()
            .map_err(|_| StorageError::Backend("image map poisoned".to_string()))?;
        images.insert(name.clone(), bytes);
        Ok(name)
    }

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let images = self
            .images
            .lock()
            .map_err(|_| StorageError::Backend("image map poisoned".to_string()))?;
        Ok(images.get(name).cloned())
    }
}
