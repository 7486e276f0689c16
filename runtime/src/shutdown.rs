//! Process-wide shutdown signal.
//!
//! One [`ShutdownTrigger`] is held by the process wiring; every background component holds a
//! [`ShutdownSignal`] and races its blocking points against [`ShutdownSignal::triggered`].
//!
//! ```ignore
//! let (trigger, signal) = shutdown::channel();
//! let sweeper = ExpirationSweeper::new(store, clock, queue, config).spawn(signal.clone());
//!
//! wait_for_signal().await;
//! trigger.trigger();
//! sweeper.await?;
//! ```
//!
//! Dropping the trigger counts as shutdown, so components never outlive the wiring that owns
//! them.

use tokio::sync::watch;

/// Create a connected trigger and signal.
#[must_use]
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Fires the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signal every subscriber. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Create another signal observing this trigger.
    #[must_use]
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes the shutdown trigger.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once shutdown is requested.
    ///
    /// Returns immediately if it already was. Cancel-safe, so it can sit in a
    /// `tokio::select!` arm inside a loop.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
