//! Notification dispatcher: a fixed worker pool draining one bounded queue.
//!
//! ```text
//!  producers ──push──▶ [ bounded mpsc queue ] ──recv──▶ worker 1..N ──lock──▶ transport
//!                             ▲                              │
//!                             └──── retry task (n × base) ◀──┘ on failure
//! ```
//!
//! - Transport calls are serialized behind one lock shared by every worker.
//! - A failed message is re-enqueued by a detached task after `attempts × base_delay`, until
//!   the retry policy's attempt ceiling is reached; then it is dropped with a warning.
//! - On shutdown, retry tasks abandon silently and workers drain what is already buffered
//!   exactly once, without scheduling retries.

use crate::metrics::NotificationMetrics;
use crate::retry::RetryPolicy;
use crate::shutdown::ShutdownSignal;
use eventbooker_core::notify::{NotificationMessage, Notifier};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 3;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Messages the queue buffers before pushes wait
    pub queue_capacity: usize,
    /// Attempt ceiling and backoff
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Why a push did not enqueue its message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// Shutdown fired while waiting for queue capacity.
    #[error("shutdown requested while waiting for queue capacity")]
    Shutdown,

    /// Every worker is gone.
    #[error("notification queue closed")]
    Closed,
}

/// Producer side of the bounded queue.
#[derive(Clone, Debug)]
pub struct NotificationQueue {
    tx: mpsc::Sender<NotificationMessage>,
}

impl NotificationQueue {
    /// Enqueue `message`, waiting for capacity if the queue is full.
    ///
    /// Never drops the message while waiting. The wait is abandoned if `shutdown` fires.
    ///
    /// # Errors
    ///
    /// - [`PushError::Shutdown`] if shutdown fired while the queue was full
    /// - [`PushError::Closed`] if the dispatcher has stopped
    pub async fn push(
        &self,
        message: NotificationMessage,
        shutdown: &mut ShutdownSignal,
    ) -> Result<(), PushError> {
        let message = match self.tx.try_send(message) {
            Ok(()) => {
                NotificationMetrics::record_enqueued();
                return Ok(());
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return Err(PushError::Closed),
            Err(mpsc::error::TrySendError::Full(message)) => message,
        };

        tracing::debug!("Notification queue full, waiting for capacity");
        tokio::select! {
            () = shutdown.triggered() => Err(PushError::Shutdown),
            result = self.tx.send(message) => match result {
                Ok(()) => {
                    NotificationMetrics::record_enqueued();
                    Ok(())
                }
                Err(_) => Err(PushError::Closed),
            },
        }
    }

    /// Free slots in the queue right now.
    #[must_use]
    pub fn available_capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Worker pool delivering queued notifications through one transport.
pub struct NotificationDispatcher<N> {
    notifier: N,
    config: DispatcherConfig,
}

impl<N> NotificationDispatcher<N>
where
    N: Notifier + 'static,
{
    /// Create a dispatcher that will deliver through `notifier`.
    #[must_use]
    pub const fn new(notifier: N, config: DispatcherConfig) -> Self {
        Self { notifier, config }
    }

    /// Start the workers.
    ///
    /// Returns the queue producers push onto and a handle to await the workers. Workers stop
    /// when `shutdown` fires (after draining the queue once) or when every queue handle has
    /// been dropped and the queue is empty.
    #[must_use]
    pub fn spawn(self, shutdown: ShutdownSignal) -> (NotificationQueue, DispatcherHandle) {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let transport = Arc::new(Mutex::new(self.notifier));
        let worker_count = self.config.workers.max(1);

        let workers = (0..worker_count)
            .map(|id| {
                let worker = Worker {
                    id,
                    rx: Arc::clone(&rx),
                    transport: Arc::clone(&transport),
                    requeue: tx.downgrade(),
                    retry: self.config.retry.clone(),
                    shutdown: shutdown.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        tracing::info!(
            workers = worker_count,
            queue_capacity = self.config.queue_capacity,
            max_attempts = self.config.retry.max_attempts,
            "Notification dispatcher started"
        );

        (NotificationQueue { tx }, DispatcherHandle { workers })
    }
}

/// Join handle for the worker pool.
#[derive(Debug)]
pub struct DispatcherHandle {
    workers: Vec<JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Wait for every worker to exit.
    pub async fn join(self) {
        for result in futures::future::join_all(self.workers).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Notification worker terminated abnormally");
            }
        }
        tracing::info!("Notification dispatcher stopped");
    }
}

enum Next {
    Message(NotificationMessage),
    Shutdown,
    Closed,
}

struct Worker<N> {
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<NotificationMessage>>>,
    transport: Arc<Mutex<N>>,
    requeue: mpsc::WeakSender<NotificationMessage>,
    retry: RetryPolicy,
    shutdown: ShutdownSignal,
}

impl<N: Notifier + 'static> Worker<N> {
    async fn run(mut self) {
        tracing::debug!(worker = self.id, "Notification worker started");

        loop {
            let next = tokio::select! {
                () = self.shutdown.triggered() => Next::Shutdown,
                message = recv_shared(&self.rx) => message.map_or(Next::Closed, Next::Message),
            };

            match next {
                Next::Message(message) => self.deliver(message, true).await,
                Next::Shutdown => {
                    self.drain().await;
                    break;
                }
                Next::Closed => break,
            }
        }

        tracing::debug!(worker = self.id, "Notification worker stopped");
    }

    async fn drain(&self) {
        let mut drained = 0usize;
        loop {
            let next = self.rx.lock().await.try_recv();
            let Ok(message) = next else { break };
            self.deliver(message, false).await;
            drained += 1;
        }
        if drained > 0 {
            tracing::info!(worker = self.id, drained, "Drained notification queue on shutdown");
        }
    }

    async fn deliver(&self, mut message: NotificationMessage, allow_retry: bool) {
        let result = {
            let transport = self.transport.lock().await;
            transport.send_text(message.chat_id, &message.text).await
        };

        let err = match result {
            Ok(()) => {
                tracing::debug!(worker = self.id, chat_id = %message.chat_id, "Notification delivered");
                NotificationMetrics::record_delivered();
                return;
            }
            Err(err) => err,
        };

        NotificationMetrics::record_failed();
        message.attempts += 1;

        if allow_retry && self.retry.should_retry(message.attempts) {
            tracing::debug!(
                worker = self.id,
                chat_id = %message.chat_id,
                attempts = message.attempts,
                error = %err,
                "Notification failed, scheduling retry"
            );
            self.schedule_retry(message);
        } else {
            tracing::warn!(
                worker = self.id,
                chat_id = %message.chat_id,
                attempts = message.attempts,
                error = %err,
                "Dropping notification"
            );
            NotificationMetrics::record_dropped();
        }
    }

    fn schedule_retry(&self, message: NotificationMessage) {
        let Some(tx) = self.requeue.upgrade() else {
            tracing::warn!(chat_id = %message.chat_id, "Notification queue closed, dropping retry");
            NotificationMetrics::record_dropped();
            return;
        };

        NotificationMetrics::record_retry();
        let delay = self.retry.delay_for_attempt(message.attempts);
        let mut shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.triggered() => return,
                () = tokio::time::sleep(delay) => {}
            }
            tokio::select! {
                () = shutdown.triggered() => {}
                result = tx.send(message) => {
                    if result.is_err() {
                        tracing::debug!("Notification queue closed before retry");
                    }
                }
            }
        });
    }
}

async fn recv_shared<T>(rx: &Mutex<mpsc::Receiver<T>>) -> Option<T> {
    rx.lock().await.recv().await
}
