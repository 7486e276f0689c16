//! `PostgreSQL` implementation of the booking store.

use crate::rows::{
    EVENT_COLUMNS, EventRow, ExpiredRow, RESERVATION_COLUMNS, ReservationDetailsRow,
    ReservationRow, map_rows,
};
use chrono::{DateTime, Utc};
use eventbooker_core::error::{StoreError, StoreResult};
use eventbooker_core::pagination::{PageMode, PageRequest};
use eventbooker_core::store::{BookingStore, BookingTransaction};
use eventbooker_core::types::{
    Event, EventId, ExpiredReservation, NewEvent, NewReservation, Reservation, ReservationDetails,
    ReservationKey, ReservationStatus, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;

/// Seats held by these statuses count against capacity.
const OCCUPYING_STATUSES: &str = "('pending', 'confirmed')";

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Upper bound on open connections
    pub max_connections: u32,
    /// Connections kept open when idle
    pub min_connections: u32,
    /// How long to wait for a connection
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        tracing::error!(operation, error = %e, "Database operation failed");
        metrics::counter!("postgres_errors_total", "operation" => operation).increment(1);
        StoreError::Database(format!("{operation}: {e}"))
    }
}

fn tx_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        tracing::error!(operation, error = %e, "Transaction operation failed");
        metrics::counter!("postgres_errors_total", "operation" => operation).increment(1);
        StoreError::Transaction(format!("{operation}: {e}"))
    }
}

/// Comparison and ordering for a keyset page over `(created_at, id)`.
const fn keyset(mode: PageMode) -> (&'static str, &'static str) {
    match mode {
        PageMode::Next => (">", "ASC"),
        PageMode::Prev => ("<", "DESC"),
    }
}

/// Booking store backed by `PostgreSQL`.
///
/// Booking transactions lock the event row with `SELECT ... FOR UPDATE`, so concurrent
/// bookings of one event serialize on that row while bookings of different events proceed in
/// parallel.
#[derive(Clone, Debug)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if no connection can be established.
    pub async fn connect(database_url: &str, settings: &PoolSettings) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(database_url)
            .await
            .map_err(db_error("connect"))?;
        Ok(Self { pool })
    }

    /// Apply the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Open `PostgreSQL` transaction. Rolls back when dropped uncommitted.
#[derive(Debug)]
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl BookingTransaction for PostgresTransaction {
    async fn lock_event(&mut self, event_id: EventId) -> StoreResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, EventRow>(&sql)
            .bind(event_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("lock_event"))?
            .map(Event::try_from)
            .transpose()
    }

    async fn count_occupied_seats(&mut self, event_id: EventId) -> StoreResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM reservations WHERE event_id = $1 AND status IN {OCCUPYING_STATUSES}"
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(event_id.get())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error("count_occupied_seats"))
    }

    async fn insert_reservation(&mut self, reservation: NewReservation) -> StoreResult<Reservation> {
        let sql = format!(
            "INSERT INTO reservations (user_id, event_id, status, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {RESERVATION_COLUMNS}"
        );
        sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(reservation.user_id.get())
            .bind(reservation.event_id.get())
            .bind(reservation.status.as_str())
            .bind(reservation.expires_at)
            .bind(reservation.created_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error("insert_reservation"))?
            .try_into()
    }

    async fn update_reservation_status(
        &mut self,
        key: ReservationKey,
        status: ReservationStatus,
    ) -> StoreResult<bool> {
        let allowed: Vec<String> = status
            .allowed_predecessors()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let result = sqlx::query(
            "UPDATE reservations SET status = $1, expires_at = NULL \
             WHERE id = $2 AND event_id = $3 AND user_id = $4 AND status = ANY($5)",
        )
        .bind(status.as_str())
        .bind(key.reservation_id.get())
        .bind(key.event_id.get())
        .bind(key.user_id.get())
        .bind(allowed)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("update_reservation_status"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(tx_error("commit"))
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await.map_err(tx_error("rollback"))
    }
}

impl BookingStore for PostgresBookingStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> StoreResult<PostgresTransaction> {
        let tx = self.pool.begin().await.map_err(tx_error("begin"))?;
        Ok(PostgresTransaction { tx })
    }

    async fn insert_event(&self, event: NewEvent, created_at: DateTime<Utc>) -> StoreResult<Event> {
        let sql = format!(
            "INSERT INTO events (title, description, event_date, status, total_place, \
             reservation_period_secs, requires_confirmation, created_at) \
             VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7) RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, EventRow>(&sql)
            .bind(&event.title)
            .bind(&event.description)
            .bind(event.event_date)
            .bind(event.total_place)
            .bind(event.reservation_period.num_seconds())
            .bind(event.requires_confirmation)
            .bind(created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("insert_event"))?
            .try_into()
    }

    async fn get_event(&self, event_id: EventId) -> StoreResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        sqlx::query_as::<_, EventRow>(&sql)
            .bind(event_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_event"))?
            .map(Event::try_from)
            .transpose()
    }

    async fn list_events(&self, page: PageRequest) -> StoreResult<Vec<Event>> {
        let (cmp, order) = keyset(page.mode());
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE (created_at, id) {cmp} ($1, $2) \
             ORDER BY created_at {order}, id {order} LIMIT $3"
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(page.last_created_at())
            .bind(page.last_id())
            .bind(i64::from(page.page_size()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_events"))?;
        map_rows(rows)
    }

    async fn count_events(&self) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count_events"))
    }

    async fn count_occupied_seats(&self, event_id: EventId) -> StoreResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM reservations WHERE event_id = $1 AND status IN {OCCUPYING_STATUSES}"
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(event_id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count_occupied_seats"))
    }

    async fn list_user_reservations(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> StoreResult<Vec<ReservationDetails>> {
        let (cmp, order) = keyset(page.mode());
        let sql = format!(
            "SELECT r.id, r.user_id, r.event_id, r.status, r.expires_at, r.created_at, \
                    e.title AS event_title, e.description AS event_description, e.event_date \
             FROM reservations r JOIN events e ON e.id = r.event_id \
             WHERE r.user_id = $1 AND (r.created_at, r.id) {cmp} ($2, $3) \
             ORDER BY r.created_at {order}, r.id {order} LIMIT $4"
        );
        let rows = sqlx::query_as::<_, ReservationDetailsRow>(&sql)
            .bind(user_id.get())
            .bind(page.last_created_at())
            .bind(page.last_id())
            .bind(i64::from(page.page_size()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_user_reservations"))?;
        map_rows(rows)
    }

    async fn count_user_reservations(&self, user_id: UserId) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reservations WHERE user_id = $1")
            .bind(user_id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count_user_reservations"))
    }

    async fn list_expired_reservations(&self, now: DateTime<Utc>) -> StoreResult<Vec<ExpiredReservation>> {
        let rows = sqlx::query_as::<_, ExpiredRow>(
            "SELECT r.id AS reservation_id, u.tg_chat_id AS chat_id, \
                    e.title AS event_title, e.event_date \
             FROM reservations r \
             JOIN events e ON e.id = r.event_id \
             LEFT JOIN users u ON u.id = r.user_id \
             WHERE r.status = 'pending' AND r.expires_at < $1 \
             ORDER BY r.id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_expired_reservations"))?;

        Ok(rows.into_iter().map(ExpiredReservation::from).collect())
    }

    async fn delete_expired_reservations(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM reservations WHERE status = 'pending' AND expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_expired_reservations"))?;
        Ok(result.rows_affected())
    }
}
