//! Represents a photo attached to an item listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An uploaded item photo. The `url` points into the object store and is
/// the durable reference; the underlying object is never mutated.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Image {
    /// Unique identifier (UUID).
    pub id: Uuid,

    /// Public URL of the stored object.
    pub url: String,

    /// The item this photo belongs to.
    pub item_id: Uuid,

    /// When this photo was attached.
    pub created_at: DateTime<Utc>,
}
