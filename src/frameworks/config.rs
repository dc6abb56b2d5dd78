use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use crate::use_cases::sweeper::SweeperSettings;

/// Where durable state lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    // Process-local tables and images; everything is lost on exit.
    Memory,
}

// Runtime settings read from the environment (and `.env` when present).
#[derive(Clone, Debug)]
pub struct Settings {
    pub bind: SocketAddr,
    pub backend: StorageBackend,
    pub secret_key: String,
    pub access_token_ttl: Duration,
    pub images_dir: PathBuf,
    pub sweeper: SweeperSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backend: StorageBackend::Memory,
            secret_key: "change-me".to_string(),
            access_token_ttl: Duration::from_secs(10_000 * 60),
            images_dir: PathBuf::from("./storage/maps"),
            sweeper: SweeperSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> std::io::Result<Self> {
        let defaults = Self::default();

        let bind = match env::var("BIND") {
            Ok(value) => value.parse().map_err(|e| {
                std::io::Error::other(format!("BIND is not a socket address: {e}"))
            })?,
            Err(_) => defaults.bind,
        };

        let backend = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            Ok("postgres") | Err(_) => {
                let database_url = env::var("DATABASE_URL")
                    .map_err(|_| std::io::Error::other("DATABASE_URL must be set"))?;
                StorageBackend::Postgres { database_url }
            }
            Ok(other) => {
                return Err(std::io::Error::other(format!(
                    "unknown STORAGE_BACKEND {other:?}, expected postgres or memory"
                )));
            }
        };

        let secret_key = env::var("SECRET_KEY").unwrap_or_else(|_| {
            tracing::warn!("SECRET_KEY not set; short URLs use the development salt");
            defaults.secret_key.clone()
        });

        Ok(Self {
            bind,
            backend,
            secret_key,
            access_token_ttl: Duration::from_secs(
                60 * env_u64("ACCESS_TOKEN_EXPIRE_MINUTES", 10_000),
            ),
            images_dir: env::var("IMAGES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.images_dir),
            sweeper: SweeperSettings {
                sweep_interval: Duration::from_secs(env_u64("GAME_SET_SWEEP_INTERVAL_SECS", 60)),
                idle_threshold: Duration::from_secs(env_u64("GAME_SET_IDLE_SECS", 900)),
                persist_timeout: Duration::from_millis(env_u64(
                    "GAME_SET_PERSIST_TIMEOUT_MS",
                    5_000,
                )),
            },
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}
