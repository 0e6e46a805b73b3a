//! Defines routes for the rental marketplace API.
//!
//! ## Structure
//! - **Health endpoints**
//!   - `GET    /healthz` — liveness
//!   - `GET    /readyz`  — readiness (DB + object store probes)
//!
//! - **Users**
//!   - `POST   /users`, `GET /users`
//!   - `GET    /users/{id}`, `PATCH /users/{id}`
//!
//! - **Items & photos**
//!   - `POST   /items`, `GET /items`
//!   - `GET    /items/{id}`, `PATCH /items/{id}`, `DELETE /items/{id}`
//!   - `POST   /items/{id}/images` — multipart upload, body-limited
//!   - `GET    /items/{id}/availability?start=&end=`
//!
//! - **Rentals**
//!   - `POST   /rentals`, `DELETE /rentals/{id}`
//!
//! - **Messages**
//!   - `POST   /messages`, `GET /messages?user_a=&user_b=&page=&limit=`
//!
//! - **Stored objects**
//!   - `GET    /{bucket}/{*key}` — serves the public URLs the gateway hands out

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        image_handlers::attach_images,
        item_handlers::{create_item, delete_item, get_item, list_items, update_item},
        message_handlers::{list_conversation, send_message},
        object_handlers::get_object,
        rental_handlers::{cancel_rental, check_availability, create_rental},
        user_handlers::{create_user, get_user, list_users, update_user},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Upper bound on a multipart upload request. The storage gateway buffers
/// each file whole and relies on this transport-level cap.
const UPLOAD_BODY_LIMIT: usize = 25 * 1024 * 1024;

/// Build and return the router for the whole API.
///
/// The router carries shared state (`AppState`) to all handlers. The object
/// download route is registered last so the fixed-prefix routes win.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // users
        .route("/users", post(create_user).get(list_users))
        .route("/users/{id}", get(get_user).patch(update_user))
        // items and their photos
        .route("/items", post(create_item).get(list_items))
        .route(
            "/items/{id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route(
            "/items/{id}/images",
            post(attach_images).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/items/{id}/availability", get(check_availability))
        // rentals
        .route("/rentals", post(create_rental))
        .route("/rentals/{id}", delete(cancel_rental))
        // messages
        .route("/messages", post(send_message).get(list_conversation))
        // stored objects
        .route("/{bucket}/{*key}", get(get_object))
}
