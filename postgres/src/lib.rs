//! `PostgreSQL` booking store for `EventBooker`.
//!
//! This crate implements the `BookingStore` and `BookingTransaction` traits from
//! `eventbooker-core` on top of sqlx. It provides:
//!
//! - Row-locked booking transactions (`SELECT ... FOR UPDATE` on the event row)
//! - Status-guarded reservation updates
//! - Keyset pagination over `(created_at, id)`
//! - Expired-hold listing and deletion for the sweeper
//! - Bundled schema migrations
//!
//! # Example
//!
//! ```ignore
//! use eventbooker_postgres::{PoolSettings, PostgresBookingStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresBookingStore::connect("postgres://localhost/eventbooker", &PoolSettings::default()).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod rows;
mod store;

pub use store::{PoolSettings, PostgresBookingStore, PostgresTransaction};
