//! Core data models for the rental marketplace.
//!
//! These entities represent users, the items they list, bookings against
//! those items, and the photos attached to them. They map cleanly to
//! database tables via `sqlx::FromRow` and serialize naturally as JSON
//! via `serde`.

pub mod image;
pub mod item;
pub mod message;
pub mod rental;
pub mod user;
