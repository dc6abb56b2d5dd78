use async_trait::async_trait;

use crate::domain::entities::{AccessToken, GameSet, Map, NewPawn, NewUser, Pawn, User};
use crate::domain::errors::StorageError;

// Port for bearer-token storage used by auth use cases.
#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    async fn insert(&self, token: String, access: AccessToken) -> Result<(), StorageError>;
    async fn get(&self, token: &str) -> Result<Option<AccessToken>, StorageError>;
    async fn remove(&self, token: &str) -> Result<bool, StorageError>;
    /// Drops every token with `expires_at <= now` and returns how many went.
    async fn purge_expired(&self, now: u64) -> Result<usize, StorageError>;
}

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> u64;
}

// Port for password hashing so use cases never touch the algorithm.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, String>;
    fn verify(&self, password: &str, hash: &str) -> bool;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`StorageError::Conflict`] when the username or email is taken.
    async fn create(&self, user: NewUser) -> Result<User, StorageError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StorageError>;
}

#[async_trait]
pub trait MapRepository: Send + Sync {
    /// Fails with [`StorageError::Conflict`] when the user already has a map with `name`.
    async fn create(
        &self,
        user_id: i64,
        name: &str,
        len_x: i32,
        len_y: i32,
    ) -> Result<Map, StorageError>;
    async fn find_by_name(&self, user_id: i64, name: &str) -> Result<Option<Map>, StorageError>;
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Map>, StorageError>;
    async fn set_image(&self, map_id: i64, image: &str) -> Result<(), StorageError>;
}

// Durable side of the game-set aggregate. Structural changes (creation,
// membership, new pawns) go straight to storage; field edits on resident
// game sets reach storage through `GameSetPersister`.
#[async_trait]
pub trait GameSetRepository: Send + Sync {
    async fn create(
        &self,
        owner_id: i64,
        name: &str,
        map_id: Option<i64>,
    ) -> Result<i64, StorageError>;
    async fn load(&self, id: i64) -> Result<Option<GameSet>, StorageError>;
    async fn delete(&self, id: i64) -> Result<(), StorageError>;
    async fn add_player(&self, game_set_id: i64, user_id: i64) -> Result<(), StorageError>;
    /// Fails with [`StorageError::Conflict`] when the game set already has a pawn with that name.
    async fn add_pawn(&self, pawn: NewPawn) -> Result<Pawn, StorageError>;
    async fn list_owned(&self, user_id: i64) -> Result<Vec<GameSet>, StorageError>;
    async fn list_joined(&self, user_id: i64) -> Result<Vec<GameSet>, StorageError>;
}

// Flush capability invoked by the sweeper once per resident game set per cycle.
#[async_trait]
pub trait GameSetPersister: Send + Sync {
    /// Fails with [`StorageError::NotFound`] when the game set was deleted.
    async fn persist(&self, game_set: &GameSet) -> Result<(), StorageError>;
}

// Content-addressed storage for uploaded map images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores `bytes` and returns the name they can be fetched under.
    async fn save(&self, bytes: Vec<u8>) -> Result<String, StorageError>;
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;
}
