//! Binary entrypoint wiring the bus, scheduler, handlers and storage.

use std::{env, sync::Arc};

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use frolf_rounds_back::{
    bus::in_process::InProcessBus,
    config::AppConfig,
    dao::memory::{MemoryRoundStore, MemoryUserDirectory},
    handlers,
    scheduler::delay_queue::DelayQueueScheduler,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let bus: Arc<InProcessBus> = Arc::new(InProcessBus::new(256));
    let scheduler = DelayQueueScheduler::spawn(bus.clone());
    let state = AppState::new(config, bus, scheduler);

    handlers::spawn(state.clone());
    spawn_storage(state.clone()).await;

    info!("round engine running");
    shutdown_signal().await;
    info!("shutting down");
    Ok(())
}

/// Pick the storage backend: MongoDB when `MONGO_URI` is set (and the
/// feature is compiled in), otherwise the in-memory store for local runs.
async fn spawn_storage(state: SharedState) {
    #[cfg(feature = "mongo-store")]
    if env::var("MONGO_URI").is_ok() {
        tokio::spawn(frolf_rounds_back::services::storage_supervisor::run(
            state,
            connect_mongo,
        ));
        return;
    }

    if env::var("MONGO_URI").is_ok() {
        warn!("MONGO_URI is set but the mongo-store feature is disabled; using memory storage");
    } else {
        info!("MONGO_URI not set; using in-memory storage");
    }
    state
        .install_storage(
            Arc::new(MemoryRoundStore::new()),
            Arc::new(MemoryUserDirectory::new()),
        )
        .await;
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> Result<
    frolf_rounds_back::services::storage_supervisor::StorageHandles,
    frolf_rounds_back::dao::storage::StorageError,
> {
    use frolf_rounds_back::dao::mongodb::{MongoConfig, MongoRoundStore};

    let config = MongoConfig::from_env().await?;
    let store = MongoRoundStore::connect(config).await?;
    let directory = store.user_directory();
    Ok((Arc::new(store), Arc::new(directory)))
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
