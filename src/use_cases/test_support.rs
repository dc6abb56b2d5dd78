use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::entities::{GameSet, Map, NewUser, User, UserSummary};
use crate::domain::errors::StorageError;
use crate::domain::ports::{Clock, GameSetPersister, MapRepository, PasswordHasher, UserRepository};
use crate::interface_adapters::memory::{
    InMemoryAccessTokenStore, InMemoryGameSetRepository, InMemoryMapRepository,
    InMemoryUserRepository, MemoryDatabase,
};

// Time source tests can move forward or backward.
pub(crate) struct SettableClock(AtomicU64);

impl SettableClock {
    pub(crate) fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub(crate) fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for SettableClock {
    fn now_epoch_seconds(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// Marks passwords instead of hashing them so tests stay fast.
pub(crate) struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, String> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        hash.strip_prefix("plain:") == Some(password)
    }
}

pub(crate) fn sample_user(id: i64, username: &str) -> UserSummary {
    UserSummary {
        id,
        username: username.to_string(),
        full_name: None,
    }
}

pub(crate) fn sample_game_set(id: i64, name: &str) -> GameSet {
    GameSet {
        id,
        name: name.to_string(),
        owner: sample_user(1, "owner"),
        map: None,
        pawns: Vec::new(),
        players: Vec::new(),
    }
}

pub(crate) async fn seed_account(users: &dyn UserRepository, username: &str) -> User {
    users
        .create(NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            full_name: None,
            password_hash: "plain:secret".to_string(),
        })
        .await
        .expect("expected account to be created")
}

pub(crate) async fn seed_map(maps: &dyn MapRepository, user_id: i64, name: &str) -> Map {
    maps.create(user_id, name, 50, 40)
        .await
        .expect("expected map to be created")
}

#[derive(Default)]
struct PersisterScript {
    failing: HashSet<i64>,
    hanging: HashSet<i64>,
    missing: HashSet<i64>,
    persisted: Vec<i64>,
}

// Persister whose outcome per game-set id is scripted by the test.
#[derive(Default)]
pub(crate) struct ScriptedPersister {
    script: Mutex<PersisterScript>,
}

impl ScriptedPersister {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_for(self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .failing
            .extend(ids);
        self
    }

    pub(crate) fn hanging_for(self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .hanging
            .extend(ids);
        self
    }

    pub(crate) fn missing_for(self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .missing
            .extend(ids);
        self
    }

    pub(crate) fn clear_failures(&self) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .failing
            .clear();
    }

    pub(crate) fn persisted_ids(&self) -> Vec<i64> {
        let mut ids = self
            .script
            .lock()
            .expect("script mutex poisoned")
            .persisted
            .clone();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl GameSetPersister for ScriptedPersister {
    async fn persist(&self, game_set: &GameSet) -> Result<(), StorageError> {
        let (fail, hang, missing) = {
            let script = self.script.lock().expect("script mutex poisoned");
            (
                script.failing.contains(&game_set.id),
                script.hanging.contains(&game_set.id),
                script.missing.contains(&game_set.id),
            )
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if missing {
            return Err(StorageError::NotFound);
        }
        if fail {
            return Err(StorageError::Backend("persist failed".to_string()));
        }
        self.script
            .lock()
            .expect("script mutex poisoned")
            .persisted
            .push(game_set.id);
        Ok(())
    }
}

// In-memory adapters sharing one backing database.
pub(crate) struct MemoryFixture {
    pub(crate) users: InMemoryUserRepository,
    pub(crate) maps: InMemoryMapRepository,
    pub(crate) game_sets: InMemoryGameSetRepository,
    pub(crate) tokens: InMemoryAccessTokenStore,
}

impl MemoryFixture {
    pub(crate) fn new() -> Self {
        let db = MemoryDatabase::default();
        Self {
            users: InMemoryUserRepository { db: db.clone() },
            maps: InMemoryMapRepository { db: db.clone() },
            game_sets: InMemoryGameSetRepository { db },
            tokens: InMemoryAccessTokenStore::default(),
        }
    }
}
