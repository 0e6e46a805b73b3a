//! Represents a registered marketplace user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user account. Users both list items and rent items from each other.
///
/// Credential material is deliberately not modelled here; authentication
/// lives outside this service.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct User {
    /// Unique identifier (UUID).
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Contact email, unique across the system.
    pub email: String,

    /// Optional street address.
    pub address: Option<String>,

    /// Contact phone number.
    pub phone: String,

    /// Optional postal code.
    pub postal_code: Option<String>,

    /// When this account was created.
    pub created_at: DateTime<Utc>,

    /// When this account was last modified.
    pub updated_at: DateTime<Utc>,
}
