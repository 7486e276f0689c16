//! Startup and shutdown of the background services.

use crate::config::Config;
use eventbooker_core::environment::SystemClock;
use eventbooker_core::error::StoreError;
use eventbooker_postgres::PostgresBookingStore;
use eventbooker_runtime::metrics::{MetricsError, MetricsServer};
use eventbooker_runtime::retry::{RetryPolicy, retry_linear};
use eventbooker_runtime::shutdown::{self, ShutdownTrigger};
use eventbooker_runtime::{DispatcherHandle, ExpirationSweeper, NotificationDispatcher};
use eventbooker_telegram::{AnyNotifier, LogNotifier, TelegramClient, TelegramNotifier, UpdateListener};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Attempts at reaching the database before giving up.
const CONNECT_ATTEMPTS: u32 = 5;

/// Failures that stop the process from starting.
#[derive(Error, Debug)]
pub enum StartupError {
    /// The metrics exporter could not be installed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// The database could not be reached or migrated.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Running background services.
pub struct Services {
    trigger: ShutdownTrigger,
    store: Arc<PostgresBookingStore>,
    sweeper: JoinHandle<()>,
    dispatcher: DispatcherHandle,
    listener: Option<JoinHandle<()>>,
}

impl Services {
    /// Start metrics, connect and migrate the database, then spawn the dispatcher, the
    /// sweeper and, with a bot token, the update listener.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if metrics cannot be installed or the database stays
    /// unreachable.
    pub async fn start(config: &Config) -> Result<Self, StartupError> {
        MetricsServer::new(config.metrics_addr).start()?;

        let store = Arc::new(connect(config).await?);
        store.migrate().await?;

        let (trigger, signal) = shutdown::channel();

        let (notifier, listener) = match &config.notify.telegram_token {
            Some(token) => {
                let client = TelegramClient::new(token.clone());
                let listener = UpdateListener::new(client.clone()).spawn(trigger.subscribe());
                tracing::info!("Telegram notifications enabled");
                (AnyNotifier::Telegram(TelegramNotifier::new(client)), Some(listener))
            }
            None => {
                tracing::warn!("TG_TOKEN not set, notifications will only be logged");
                (AnyNotifier::Log(LogNotifier), None)
            }
        };

        let (queue, dispatcher) =
            NotificationDispatcher::new(notifier, config.notify.dispatcher.clone()).spawn(signal.clone());

        let sweeper = ExpirationSweeper::new(Arc::clone(&store), Arc::new(SystemClock), queue, config.sweeper)
            .spawn(signal);

        Ok(Self {
            trigger,
            store,
            sweeper,
            dispatcher,
            listener,
        })
    }

    /// Signal shutdown and wait up to `timeout` for every task to finish.
    pub async fn shutdown(self, timeout: Duration) {
        self.trigger.trigger();

        let Self {
            store,
            sweeper,
            dispatcher,
            listener,
            ..
        } = self;

        let stopped = tokio::time::timeout(timeout, async move {
            if let Err(e) = sweeper.await {
                tracing::error!(error = %e, "Expiration sweeper task failed");
            }
            dispatcher.join().await;
            if let Some(listener) = listener {
                if let Err(e) = listener.await {
                    tracing::error!(error = %e, "Telegram update listener task failed");
                }
            }
        })
        .await;

        if stopped.is_err() {
            tracing::warn!(timeout_secs = timeout.as_secs(), "Background tasks did not stop in time");
        }

        store.close().await;
        tracing::info!("Database pool closed");
    }
}

async fn connect(config: &Config) -> Result<PostgresBookingStore, StoreError> {
    let url = config.database.url.as_str();
    let pool = &config.database.pool;
    let policy = RetryPolicy::builder()
        .max_attempts(CONNECT_ATTEMPTS)
        .base_delay(Duration::from_secs(1))
        .build();

    let store = retry_linear(&policy, || PostgresBookingStore::connect(url, pool)).await?;
    tracing::info!(
        max_connections = pool.max_connections,
        min_connections = pool.min_connections,
        "Connected to PostgreSQL"
    );
    Ok(store)
}
