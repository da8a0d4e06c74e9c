//! Shared application state and the round domain model.

pub mod lifecycle;
pub mod round;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    bus::MessageBus,
    config::AppConfig,
    dao::{round_store::RoundStore, user_directory::UserDirectory},
    error::ServiceError,
    scheduler::RoundScheduler,
};

/// Cheaply clonable handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state holding the injected collaborators.
///
/// No operation-scoped mutable state lives here: every round operation is a
/// function of (persisted state, input payload, these collaborators), so
/// concurrent handling of different rounds needs no engine-side locking.
pub struct AppState {
    round_store: RwLock<Option<Arc<dyn RoundStore>>>,
    user_directory: RwLock<Option<Arc<dyn UserDirectory>>>,
    bus: Arc<dyn MessageBus>,
    scheduler: Arc<dyn RoundScheduler>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(
        config: AppConfig,
        bus: Arc<dyn MessageBus>,
        scheduler: Arc<dyn RoundScheduler>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            round_store: RwLock::new(None),
            user_directory: RwLock::new(None),
            bus,
            scheduler,
            degraded: degraded_tx,
            config,
        })
    }

    /// Obtain a handle to the current round store, if one is installed.
    pub async fn round_store(&self) -> Option<Arc<dyn RoundStore>> {
        let guard = self.round_store.read().await;
        guard.as_ref().cloned()
    }

    /// Round store or a degraded-mode error.
    pub async fn require_round_store(&self) -> Result<Arc<dyn RoundStore>, ServiceError> {
        self.round_store().await.ok_or(ServiceError::Degraded)
    }

    /// Obtain a handle to the current user directory, if one is installed.
    pub async fn user_directory(&self) -> Option<Arc<dyn UserDirectory>> {
        let guard = self.user_directory.read().await;
        guard.as_ref().cloned()
    }

    /// User directory or a degraded-mode error.
    pub async fn require_user_directory(&self) -> Result<Arc<dyn UserDirectory>, ServiceError> {
        self.user_directory().await.ok_or(ServiceError::Degraded)
    }

    /// Install storage handles and leave degraded mode.
    pub async fn install_storage(
        &self,
        store: Arc<dyn RoundStore>,
        directory: Arc<dyn UserDirectory>,
    ) {
        {
            let mut guard = self.round_store.write().await;
            *guard = Some(store);
        }
        {
            let mut guard = self.user_directory.write().await;
            *guard = Some(directory);
        }
        self.update_degraded(false).await;
    }

    /// Remove the storage handles and enter degraded mode.
    pub async fn clear_storage(&self) {
        {
            let mut guard = self.round_store.write().await;
            guard.take();
        }
        {
            let mut guard = self.user_directory.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    ///
    /// `send_replace` stores the value even when no watcher is subscribed;
    /// `send` would drop it and leave `is_degraded` stale.
    pub async fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }
        self.degraded.send_replace(value);
    }

    /// Message bus handle.
    pub fn bus(&self) -> &Arc<dyn MessageBus> {
        &self.bus
    }

    /// Scheduler handle.
    pub fn scheduler(&self) -> &Arc<dyn RoundScheduler> {
        &self.scheduler
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
