//! Prometheus metrics for the booking engine.
//!
//! Components record through the small recorder types below ([`BookingMetrics`],
//! [`SweeperMetrics`], [`NotificationMetrics`]). Without an installed recorder the calls are
//! no-ops, so library code and tests never need to set anything up.
//!
//! # Example
//!
//! ```rust,no_run
//! use eventbooker_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Scrape endpoint at http://localhost:9090/metrics
//! let server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus scrape endpoint.
#[derive(Debug, Clone, Copy)]
pub struct MetricsServer {
    addr: SocketAddr,
}

impl MetricsServer {
    /// Create a metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Address the scrape endpoint listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Install the global recorder and start the HTTP listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or a recorder is already
    /// installed.
    pub fn start(&self) -> Result<(), MetricsError> {
        register_metrics();

        PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .install()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        tracing::info!(addr = %self.addr, "Metrics server started - available at http://{}/metrics", self.addr);
        Ok(())
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Reservation workflow
    describe_counter!("bookings_created_total", "Reservations created, by initial status");
    describe_counter!("bookings_rejected_total", "Bookings refused by a business rule, by reason");
    describe_counter!("bookings_confirmed_total", "Reservations confirmed");
    describe_counter!("bookings_cancelled_total", "Reservations cancelled");
    describe_counter!("booking_storage_errors_total", "Workflow calls failed by the store");
    describe_histogram!(
        "booking_transaction_duration_seconds",
        "Time taken by one booking workflow transaction"
    );

    // Expiration sweeper
    describe_counter!("sweeper_runs_total", "Completed sweep iterations");
    describe_counter!("sweeper_failures_total", "Sweep iterations that hit a storage error");
    describe_counter!("sweeper_reservations_expired_total", "Lapsed holds deleted");
    describe_histogram!("sweeper_run_duration_seconds", "Time taken by one sweep iteration");

    // Notification dispatcher
    describe_counter!("notifications_enqueued_total", "Messages pushed onto the queue");
    describe_counter!("notifications_delivered_total", "Messages accepted by the transport");
    describe_counter!("notifications_failed_total", "Failed transport calls");
    describe_counter!("notifications_retried_total", "Retries scheduled");
    describe_counter!("notifications_dropped_total", "Messages abandoned after the last attempt");
}

/// Reservation workflow metrics recorder.
pub struct BookingMetrics;

impl BookingMetrics {
    /// Record a created reservation.
    pub fn record_created(status: &'static str, duration: Duration) {
        counter!("bookings_created_total", "status" => status).increment(1);
        histogram!("booking_transaction_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a booking refused by a business rule.
    pub fn record_rejected(reason: &'static str) {
        counter!("bookings_rejected_total", "reason" => reason).increment(1);
    }

    /// Record a confirmation.
    pub fn record_confirmed() {
        counter!("bookings_confirmed_total").increment(1);
    }

    /// Record a cancellation.
    pub fn record_cancelled() {
        counter!("bookings_cancelled_total").increment(1);
    }

    /// Record a store failure.
    pub fn record_storage_error() {
        counter!("booking_storage_errors_total").increment(1);
    }
}

/// Expiration sweeper metrics recorder.
pub struct SweeperMetrics;

impl SweeperMetrics {
    /// Record a completed iteration.
    pub fn record_run(expired: u64, duration: Duration) {
        counter!("sweeper_runs_total").increment(1);
        counter!("sweeper_reservations_expired_total").increment(expired);
        histogram!("sweeper_run_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an iteration that hit a storage error.
    pub fn record_failure() {
        counter!("sweeper_failures_total").increment(1);
    }
}

/// Notification dispatcher metrics recorder.
pub struct NotificationMetrics;

impl NotificationMetrics {
    /// Record a message entering the queue.
    pub fn record_enqueued() {
        counter!("notifications_enqueued_total").increment(1);
    }

    /// Record a delivered message.
    pub fn record_delivered() {
        counter!("notifications_delivered_total").increment(1);
    }

    /// Record a failed transport call.
    pub fn record_failed() {
        counter!("notifications_failed_total").increment(1);
    }

    /// Record a scheduled retry.
    pub fn record_retry() {
        counter!("notifications_retried_total").increment(1);
    }

    /// Record an abandoned message.
    pub fn record_dropped() {
        counter!("notifications_dropped_total").increment(1);
    }
}
