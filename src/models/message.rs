//! Represents a direct message between two users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single message from one user to another, typically negotiating a
/// rental.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Message {
    /// Unique identifier (UUID).
    pub id: Uuid,

    /// Sending user.
    pub sender_id: Uuid,

    /// Receiving user.
    pub receiver_id: Uuid,

    /// Message body.
    pub content: String,

    /// When the message was sent.
    pub created_at: DateTime<Utc>,
}
