use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::ports::{
    AccessTokenStore, Clock, GameSetRepository, ImageStore, MapRepository, PasswordHasher,
    UserRepository,
};
use crate::domain::short_url::ShortUrlCodec;
use crate::use_cases::game_set_storage::GameSetStorage;
use crate::use_cases::sweeper::SweepStats;

#[derive(Clone)]
pub struct AppState {
    // Ports are held as Arc<dyn Trait> so either storage backend can be wired in.
    pub users: Arc<dyn UserRepository>,
    pub maps: Arc<dyn MapRepository>,
    pub game_sets: Arc<dyn GameSetRepository>,
    pub tokens: Arc<dyn AccessTokenStore>,
    pub images: Arc<dyn ImageStore>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
    // Process-wide resident game sets, shared with the sweeper.
    pub storage: Arc<GameSetStorage>,
    pub sweep_stats: Arc<SweepStats>,
    pub short_urls: Arc<ShortUrlCodec>,
    pub token_ttl_seconds: u64,
}

// System clock adapter used by use cases and the resident store.
#[derive(Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
