//! Represents an item listed for rent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An item listed on the marketplace by its owner.
///
/// The `is_rented` flag is informational only. The source of truth for
/// booking conflicts is the set of rental intervals on this item; nothing
/// in the booking path reads or writes this flag.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Item {
    /// Unique identifier (UUID).
    pub id: Uuid,

    /// Short display name.
    pub name: String,

    /// Free-form description.
    pub description: String,

    /// Owning user.
    pub user_id: Uuid,

    /// Informational "currently rented" marker, never authoritative.
    pub is_rented: bool,

    /// When this listing was created.
    pub created_at: DateTime<Utc>,

    /// When this listing was last modified.
    pub updated_at: DateTime<Utc>,
}
