//! Represents a booking of one item for a date range.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A rental of an item by a user over a half-open interval
/// `[start_date, end_date)`.
///
/// Invariant: for a fixed item, all persisted rentals are pairwise
/// non-overlapping. Rows are only ever inserted through
/// `BookingService::create_rental`, which enforces this under a
/// per-item lock; direct inserts would void the invariant.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Rental {
    /// Unique identifier (UUID).
    pub id: Uuid,

    /// The booked item.
    pub item_id: Uuid,

    /// The renting user.
    pub user_id: Uuid,

    /// Inclusive start instant.
    pub start_date: DateTime<Utc>,

    /// Exclusive end instant.
    pub end_date: DateTime<Utc>,

    /// When this booking was created.
    pub created_at: DateTime<Utc>,
}
