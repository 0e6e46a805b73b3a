//! src/services/booking_service.rs
//!
//! BookingService — availability checking and rental creation with a
//! never-violated no-overlap invariant per item.
//!
//! Two rentals `(s1, e1)` and `(s2, e2)` overlap iff `s1 < e2 && s2 < e1`
//! (half-open intervals, so touching endpoints do not conflict). The naive
//! scan-then-insert is racy under concurrent requests, so `create_rental`
//! holds an async lock keyed by item id across the check and the insert;
//! that lock is the only cross-request synchronization in the service.

use crate::models::rental::Rental;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid range: start `{start}` must be before end `{end}`")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("item `{0}` not found")]
    ItemNotFound(Uuid),
    #[error("user `{0}` not found")]
    UserNotFound(Uuid),
    #[error("rental `{0}` not found")]
    RentalNotFound(Uuid),
    #[error("item is already booked between `{start}` and `{end}`")]
    Conflict {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type BookingResult<T> = Result<T, BookingError>;

/// Availability checker and booking coordinator over the rentals table.
pub struct BookingService {
    db: Arc<SqlitePool>,

    /// Per-item serialization locks. Entries are created on first booking
    /// attempt for an item and kept for the process lifetime; the map is
    /// bounded by the number of distinct items ever booked.
    item_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl BookingService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self {
            db,
            item_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `[start, end)` is free on `item_id`.
    ///
    /// Read-only; the result is advisory under concurrency. `create_rental`
    /// re-checks under the item lock before inserting.
    pub async fn is_available(
        &self,
        item_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BookingResult<bool> {
        ensure_range_valid(start, end)?;
        self.scan_is_free(item_id, start, end).await
    }

    /// Create a rental for `[start, end)` on `item_id`.
    ///
    /// Check-then-insert runs under the per-item lock, so no two concurrent
    /// calls for overlapping ranges on the same item can both succeed. On
    /// conflict nothing is written. The item's informational `is_rented`
    /// flag is deliberately left untouched.
    pub async fn create_rental(
        &self,
        item_id: Uuid,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BookingResult<Rental> {
        ensure_range_valid(start, end)?;
        self.ensure_item_exists(item_id).await?;
        self.ensure_user_exists(user_id).await?;

        let lock = self.item_lock(item_id).await;
        let _guard = lock.lock().await;

        if !self.scan_is_free(item_id, start, end).await? {
            debug!("booking conflict on item {} for [{}, {})", item_id, start, end);
            return Err(BookingError::Conflict { start, end });
        }

        let rental = Rental {
            id: Uuid::new_v4(),
            item_id,
            user_id,
            start_date: start,
            end_date: end,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO rentals (id, item_id, user_id, start_date, end_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(rental.id)
        .bind(rental.item_id)
        .bind(rental.user_id)
        .bind(rental.start_date)
        .bind(rental.end_date)
        .bind(rental.created_at)
        .execute(&*self.db)
        .await?;

        info!(
            "created rental {} on item {} for [{}, {})",
            rental.id, item_id, start, end
        );
        Ok(rental)
    }

    /// Cancel a rental, freeing its interval immediately.
    ///
    /// Cancelling an unknown rental is an error, not a no-op.
    pub async fn cancel_rental(&self, rental_id: Uuid) -> BookingResult<()> {
        let result = sqlx::query("DELETE FROM rentals WHERE id = ?")
            .bind(rental_id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BookingError::RentalNotFound(rental_id));
        }
        info!("cancelled rental {}", rental_id);
        Ok(())
    }

    /// All rentals currently booked on an item. Unbounded scan; the rental
    /// count per item stays small at expected scale.
    pub async fn rentals_for_item(&self, item_id: Uuid) -> BookingResult<Vec<Rental>> {
        let rentals = sqlx::query_as::<_, Rental>(
            "SELECT id, item_id, user_id, start_date, end_date, created_at
             FROM rentals WHERE item_id = ?",
        )
        .bind(item_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(rentals)
    }

    async fn scan_is_free(
        &self,
        item_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BookingResult<bool> {
        let rentals = self.rentals_for_item(item_id).await?;
        Ok(rentals
            .iter()
            .all(|rental| !overlaps(start, end, rental.start_date, rental.end_date)))
    }

    async fn ensure_item_exists(&self, item_id: Uuid) -> BookingResult<()> {
        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM items WHERE id = ?")
            .bind(item_id)
            .fetch_optional(&*self.db)
            .await?;
        match found {
            Some(_) => Ok(()),
            None => Err(BookingError::ItemNotFound(item_id)),
        }
    }

    async fn ensure_user_exists(&self, user_id: Uuid) -> BookingResult<()> {
        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&*self.db)
            .await?;
        match found {
            Some(_) => Ok(()),
            None => Err(BookingError::UserNotFound(user_id)),
        }
    }

    async fn item_lock(&self, item_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.item_locks.lock().await;
        locks.entry(item_id).or_default().clone()
    }
}

fn ensure_range_valid(start: DateTime<Utc>, end: DateTime<Utc>) -> BookingResult<()> {
    if start < end {
        Ok(())
    } else {
        Err(BookingError::InvalidRange { start, end })
    }
}

/// Half-open overlap: `[s1, e1)` and `[s2, e2)` intersect iff
/// `s1 < e2 && s2 < e1`.
fn overlaps(
    s1: DateTime<Utc>,
    e1: DateTime<Utc>,
    s2: DateTime<Utc>,
    e2: DateTime<Utc>,
) -> bool {
    s1 < e2 && s2 < e1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> Arc<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for stmt in include_str!("../../migrations/0001_init.sql")
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        Arc::new(pool)
    }

    async fn seed_item_and_user(db: &SqlitePool) -> (Uuid, Uuid) {
        let user_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (id, name, email, phone, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind("Ana")
        .bind(format!("{}@example.test", user_id))
        .bind("555-0100")
        .bind(now)
        .bind(now)
        .execute(db)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO items (id, name, description, user_id, is_rented, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(item_id)
        .bind("Ladder")
        .bind("6m aluminium ladder")
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(db)
        .await
        .unwrap();
        (item_id, user_id)
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn empty_item_is_always_available() {
        let db = test_pool().await;
        let (item_id, _) = seed_item_and_user(&db).await;
        let service = BookingService::new(db);

        assert!(service.is_available(item_id, day(1), day(5)).await.unwrap());
    }

    #[tokio::test]
    async fn invalid_range_is_rejected() {
        let db = test_pool().await;
        let (item_id, _) = seed_item_and_user(&db).await;
        let service = BookingService::new(db);

        assert!(matches!(
            service.is_available(item_id, day(5), day(5)).await.unwrap_err(),
            BookingError::InvalidRange { .. }
        ));
        assert!(matches!(
            service.is_available(item_id, day(6), day(5)).await.unwrap_err(),
            BookingError::InvalidRange { .. }
        ));
    }

    #[tokio::test]
    async fn adjacent_intervals_do_not_conflict() {
        let db = test_pool().await;
        let (item_id, user_id) = seed_item_and_user(&db).await;
        let service = BookingService::new(db);

        service
            .create_rental(item_id, user_id, day(10), day(15))
            .await
            .unwrap();

        // Touching endpoints on either side are free.
        assert!(service.is_available(item_id, day(15), day(20)).await.unwrap());
        assert!(service.is_available(item_id, day(5), day(10)).await.unwrap());
        // Fully contained interval is not.
        assert!(!service.is_available(item_id, day(12), day(13)).await.unwrap());
        // Straddling intervals are not.
        assert!(!service.is_available(item_id, day(8), day(11)).await.unwrap());
        assert!(!service.is_available(item_id, day(14), day(22)).await.unwrap());
    }

    #[tokio::test]
    async fn overlapping_create_fails_with_conflict() {
        let db = test_pool().await;
        let (item_id, user_id) = seed_item_and_user(&db).await;
        let service = BookingService::new(db);

        service
            .create_rental(item_id, user_id, day(10), day(15))
            .await
            .unwrap();
        let err = service
            .create_rental(item_id, user_id, day(12), day(13))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Conflict { .. }));

        // Conflict wrote nothing.
        assert_eq!(service.rentals_for_item(item_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_item_and_user_are_not_found() {
        let db = test_pool().await;
        let (item_id, user_id) = seed_item_and_user(&db).await;
        let service = BookingService::new(db);

        assert!(matches!(
            service
                .create_rental(Uuid::new_v4(), user_id, day(1), day(2))
                .await
                .unwrap_err(),
            BookingError::ItemNotFound(_)
        ));
        assert!(matches!(
            service
                .create_rental(item_id, Uuid::new_v4(), day(1), day(2))
                .await
                .unwrap_err(),
            BookingError::UserNotFound(_)
        ));
    }

    #[tokio::test]
    async fn cancel_frees_the_interval() {
        let db = test_pool().await;
        let (item_id, user_id) = seed_item_and_user(&db).await;
        let service = BookingService::new(db);

        let rental = service
            .create_rental(item_id, user_id, day(10), day(15))
            .await
            .unwrap();
        assert!(!service.is_available(item_id, day(12), day(13)).await.unwrap());

        service.cancel_rental(rental.id).await.unwrap();
        assert!(service.is_available(item_id, day(12), day(13)).await.unwrap());

        // Second cancel is an error, not a no-op.
        assert!(matches!(
            service.cancel_rental(rental.id).await.unwrap_err(),
            BookingError::RentalNotFound(_)
        ));
    }

    #[tokio::test]
    async fn concurrent_overlapping_creates_admit_exactly_one() {
        let db = test_pool().await;
        let (item_id, user_id) = seed_item_and_user(&db).await;
        let service = Arc::new(BookingService::new(db));

        let mut handles = Vec::new();
        for offset in 0..8 {
            let service = service.clone();
            // All ranges overlap day 12.
            let start = day(10 + (offset % 3));
            let end = day(13 + (offset % 4));
            handles.push(tokio::spawn(async move {
                service.create_rental(item_id, user_id, start, end).await
            }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(BookingError::Conflict { .. }) => conflicts += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);

        // Invariant holds over whatever was persisted.
        let rentals = service.rentals_for_item(item_id).await.unwrap();
        for a in &rentals {
            for b in &rentals {
                if a.id != b.id {
                    assert!(!overlaps(a.start_date, a.end_date, b.start_date, b.end_date));
                }
            }
        }
    }

    #[tokio::test]
    async fn bookings_on_different_items_do_not_interfere() {
        let db = test_pool().await;
        let (item_a, user_id) = seed_item_and_user(&db).await;
        let (item_b, _) = seed_item_and_user(&db).await;
        let service = BookingService::new(db);

        service
            .create_rental(item_a, user_id, day(10), day(15))
            .await
            .unwrap();
        // Same range on another item is free.
        service
            .create_rental(item_b, user_id, day(10), day(15))
            .await
            .unwrap();
    }
}
