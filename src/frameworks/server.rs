// Framework bootstrap for the tabletop server runtime.

use crate::domain::ports::{
    Clock, GameSetPersister, GameSetRepository, ImageStore, MapRepository, UserRepository,
};
use crate::domain::short_url::ShortUrlCodec;
use crate::frameworks::config::{Settings, StorageBackend};
use crate::frameworks::db;
use crate::interface_adapters::crypto::Argon2Hasher;
use crate::interface_adapters::images::FsImageStore;
use crate::interface_adapters::memory::{
    InMemoryAccessTokenStore, InMemoryGameSetRepository, InMemoryImageStore,
    InMemoryMapRepository, InMemoryUserRepository, MemoryDatabase,
};
use crate::interface_adapters::postgres::{
    PostgresGameSetRepository, PostgresMapRepository, PostgresUserRepository,
};
use crate::interface_adapters::routes;
use crate::interface_adapters::state::{AppState, SystemClock};
use crate::use_cases::game_set_storage::GameSetStorage;
use crate::use_cases::sweeper::GameSetSweeper;

use std::io::Result;
use std::path::Path;
use std::sync::Arc;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Wired HTTP state plus the sweeper that flushes its resident game sets.
pub struct Application {
    pub state: AppState,
    pub sweeper: Arc<GameSetSweeper>,
}

// Durable-storage ports for one backend.
struct Backend {
    users: Arc<dyn UserRepository>,
    maps: Arc<dyn MapRepository>,
    game_sets: Arc<dyn GameSetRepository>,
    persister: Arc<dyn GameSetPersister>,
    images: Arc<dyn ImageStore>,
}

async fn postgres_backend(database_url: &str, images_dir: &Path) -> Result<Backend> {
    let pool = db::connect_pool(database_url).await.map_err(|e| {
        tracing::error!(error = %e, "failed to connect to database");
        std::io::Error::other(format!("failed to connect to database: {e}"))
    })?;
    db::run_migrations(&pool).await.map_err(|e| {
        tracing::error!(error = %e, "failed to run migrations");
        std::io::Error::other(format!("failed to run migrations: {e}"))
    })?;

    let game_sets = Arc::new(PostgresGameSetRepository { db: pool.clone() });
    Ok(Backend {
        users: Arc::new(PostgresUserRepository { db: pool.clone() }),
        maps: Arc::new(PostgresMapRepository { db: pool }),
        game_sets: game_sets.clone(),
        persister: game_sets,
        images: Arc::new(FsImageStore {
            directory: images_dir.to_path_buf(),
        }),
    })
}

fn memory_backend() -> Backend {
    let db = MemoryDatabase::default();
    let game_sets = Arc::new(InMemoryGameSetRepository { db: db.clone() });
    Backend {
        users: Arc::new(InMemoryUserRepository { db: db.clone() }),
        maps: Arc::new(InMemoryMapRepository { db }),
        game_sets: game_sets.clone(),
        persister: game_sets,
        images: Arc::new(InMemoryImageStore::default()),
    }
}

pub async fn build_application(settings: &Settings) -> Result<Application> {
    let backend = match &settings.backend {
        StorageBackend::Postgres { database_url } => {
            postgres_backend(database_url, &settings.images_dir).await?
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; data is lost on exit");
            memory_backend()
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    // One resident store per process, shared by handlers and the sweeper.
    let storage = Arc::new(GameSetStorage::new(clock.clone()));
    let sweeper = Arc::new(GameSetSweeper::new(
        storage.clone(),
        backend.persister,
        settings.sweeper.clone(),
    ));

    let state = AppState {
        users: backend.users,
        maps: backend.maps,
        game_sets: backend.game_sets,
        tokens: Arc::new(InMemoryAccessTokenStore::default()),
        images: backend.images,
        hasher: Arc::new(Argon2Hasher),
        clock,
        storage,
        sweep_stats: sweeper.stats(),
        short_urls: Arc::new(ShortUrlCodec::new(&settings.secret_key)),
        token_ttl_seconds: settings.access_token_ttl.as_secs(),
    };

    Ok(Application { state, sweeper })
}

pub async fn run(listener: tokio::net::TcpListener, settings: Settings) -> Result<()> {
    let address = listener.local_addr()?;
    let application = build_application(&settings).await?;

    let sweeper = application.sweeper.start();
    let app = routes::app(application.state);

    tracing::info!(%address, "listening");

    // Serve until a shutdown signal, then let the sweeper flush once more.
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        });
    sweeper.stop().await;

    served
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let settings = Settings::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
    })?;
    let address = settings.bind;

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener, settings).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown requested");
}
