//! # EventBooker Runtime
//!
//! The moving parts of the booking engine, built on the traits in `eventbooker-core`:
//!
//! - [`booking::ReservationWorkflow`]: per-request book, confirm, cancel and listing
//! - [`catalog::EventCatalog`]: event creation and occupancy-aware reads
//! - [`sweeper::ExpirationSweeper`]: background release of lapsed holds
//! - [`dispatcher::NotificationDispatcher`]: bounded, retrying delivery of notifications
//!
//! Background components observe one [`shutdown::ShutdownSignal`].
//!
//! ## Example
//!
//! ```ignore
//! let (trigger, signal) = shutdown::channel();
//!
//! let (queue, dispatcher) =
//!     NotificationDispatcher::new(notifier, DispatcherConfig::default()).spawn(signal.clone());
//! let sweeper = ExpirationSweeper::new(Arc::clone(&store), Arc::clone(&clock), queue, SweeperConfig::default())
//!     .spawn(signal);
//!
//! let workflow = ReservationWorkflow::new(store, clock);
//! let reservation = workflow.book(user_id, event_id).await?;
//!
//! trigger.trigger();
//! sweeper.await?;
//! dispatcher.join().await;
//! ```

pub mod booking;
pub mod catalog;
pub mod dispatcher;
pub mod metrics;
pub mod retry;
pub mod shutdown;
pub mod sweeper;

pub use booking::ReservationWorkflow;
pub use catalog::EventCatalog;
pub use dispatcher::{
    DispatcherConfig, DispatcherHandle, NotificationDispatcher, NotificationQueue, PushError,
};
pub use retry::RetryPolicy;
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
pub use sweeper::{ExpirationSweeper, SweepError, SweepOutcome, SweeperConfig};
