//! Expiration sweeper: releases seats whose hold lapsed without confirmation.
//!
//! Each tick:
//!
//! 1. capture `now` once
//! 2. list pending reservations with `expires_at < now`
//! 3. push one notification per listed reservation whose owner has a chat
//! 4. delete pending reservations with `expires_at < now`, using the same `now`
//!
//! The delete re-checks the status, so a reservation confirmed or cancelled between steps 2
//! and 4 survives. Holds that lapse after step 1 are left for the next tick, which lists and
//! notifies them before deleting. No transaction spans the pushes.

use crate::dispatcher::{NotificationQueue, PushError};
use crate::metrics::SweeperMetrics;
use crate::shutdown::ShutdownSignal;
use eventbooker_core::environment::Clock;
use eventbooker_core::error::StoreError;
use eventbooker_core::notify::NotificationMessage;
use eventbooker_core::store::BookingStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Sweeper configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Time between sweeps
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Result of one completed sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Lapsed holds found
    pub listed: usize,
    /// Notifications enqueued
    pub notified: usize,
    /// Reservations deleted
    pub deleted: u64,
}

/// Why a sweep stopped before deleting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SweepError {
    /// Listing lapsed holds failed; nothing was deleted.
    #[error("failed to list expired reservations: {0}")]
    Listing(StoreError),

    /// The bulk delete failed after notifications were enqueued.
    #[error("failed to delete expired reservations: {0}")]
    Delete(StoreError),

    /// Shutdown fired while waiting for queue capacity; nothing was deleted.
    #[error("sweep interrupted by shutdown after {notified} notifications")]
    Interrupted {
        /// Notifications enqueued before the interruption
        notified: usize,
    },

    /// The dispatcher is gone; nothing was deleted.
    #[error("notification queue closed")]
    QueueClosed,
}

/// Periodic expiration sweep.
pub struct ExpirationSweeper<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
    queue: NotificationQueue,
    config: SweeperConfig,
}

impl<S, C> ExpirationSweeper<S, C>
where
    S: BookingStore + 'static,
    C: Clock + 'static,
{
    /// Create a sweeper feeding `queue`.
    #[must_use]
    pub const fn new(
        store: Arc<S>,
        clock: Arc<C>,
        queue: NotificationQueue,
        config: SweeperConfig,
    ) -> Self {
        Self {
            store,
            clock,
            queue,
            config,
        }
    }

    /// Run the sweep loop on a new task until `shutdown` fires.
    #[must_use]
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Sweep every interval until `shutdown` fires.
    ///
    /// The first sweep happens one interval after start. A sweep in progress runs to
    /// completion unless it is waiting for queue capacity when shutdown fires.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let start = tokio::time::Instant::now() + self.config.interval;
        let mut ticker = tokio::time::interval_at(start, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.config.interval.as_secs(), "Expiration sweeper started");

        loop {
            tokio::select! {
                () = shutdown.triggered() => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            match self.sweep_once(&mut shutdown).await {
                Ok(outcome) => {
                    if outcome.deleted > 0 || outcome.listed > 0 {
                        tracing::info!(
                            listed = outcome.listed,
                            notified = outcome.notified,
                            deleted = outcome.deleted,
                            "Expired reservations swept"
                        );
                    } else {
                        tracing::debug!("No expired reservations");
                    }
                    SweeperMetrics::record_run(outcome.deleted, started.elapsed());
                }
                Err(SweepError::Interrupted { notified }) => {
                    tracing::info!(notified, "Sweep interrupted by shutdown");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Sweep failed");
                    SweeperMetrics::record_failure();
                }
            }
        }

        tracing::info!("Expiration sweeper stopped");
    }

    /// Run one sweep now.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError`] if the sweep stopped early; see its variants for what was left
    /// undone.
    pub async fn sweep_once(&self, shutdown: &mut ShutdownSignal) -> Result<SweepOutcome, SweepError> {
        let now = self.clock.now();

        let expired = self
            .store
            .list_expired_reservations(now)
            .await
            .map_err(SweepError::Listing)?;

        let mut outcome = SweepOutcome {
            listed: expired.len(),
            ..SweepOutcome::default()
        };

        for reservation in &expired {
            let Some(message) = NotificationMessage::reservation_expired(reservation) else {
                tracing::debug!(
                    reservation_id = %reservation.reservation_id,
                    "Owner has no chat, skipping notification"
                );
                continue;
            };

            match self.queue.push(message, shutdown).await {
                Ok(()) => outcome.notified += 1,
                Err(PushError::Shutdown) => {
                    return Err(SweepError::Interrupted {
                        notified: outcome.notified,
                    });
                }
                Err(PushError::Closed) => return Err(SweepError::QueueClosed),
            }
        }

        outcome.deleted = self
            .store
            .delete_expired_reservations(now)
            .await
            .map_err(SweepError::Delete)?;

        Ok(outcome)
    }
}
