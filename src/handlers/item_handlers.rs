//! HTTP handlers for item listings. CRUD over the items table; item photos
//! ride along on reads so a single fetch renders a listing.

use crate::{
    errors::AppError,
    models::{image::Image, item::Item},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateItemReq {
    pub name: String,
    pub description: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemReq {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_rented: Option<bool>,
}

/// An item together with its attached photos.
#[derive(Serialize, Debug)]
pub struct ItemWithImages {
    #[serde(flatten)]
    pub item: Item,
    pub images: Vec<Image>,
}

/// POST `/items` — create a listing.
pub async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let owner: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(payload.user_id)
        .fetch_optional(&*state.db)
        .await?;
    if owner.is_none() {
        return Err(AppError::not_found(format!(
            "user `{}` not found",
            payload.user_id
        )));
    }

    let now = Utc::now();
    let item = Item {
        id: Uuid::new_v4(),
        name: payload.name,
        description: payload.description,
        user_id: payload.user_id,
        is_rented: false,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO items (id, name, description, user_id, is_rented, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(item.id)
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.user_id)
    .bind(item.is_rented)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(&*state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// GET `/items` — list all listings.
pub async fn list_items(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let items = sqlx::query_as::<_, Item>(
        "SELECT id, name, description, user_id, is_rented, created_at, updated_at
         FROM items ORDER BY created_at",
    )
    .fetch_all(&*state.db)
    .await?;
    Ok(Json(items))
}

/// GET `/items/{id}` — fetch one listing with its photos.
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let item = fetch_item(&state, id).await?;
    let images = sqlx::query_as::<_, Image>(
        "SELECT id, url, item_id, created_at FROM images WHERE item_id = ? ORDER BY created_at",
    )
    .bind(id)
    .fetch_all(&*state.db)
    .await?;

    Ok(Json(ItemWithImages { item, images }))
}

/// PATCH `/items/{id}` — partial update.
///
/// `is_rented` is exposed here as a plain informational marker for owners;
/// booking conflicts never consult it.
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let mut item = fetch_item(&state, id).await?;

    if let Some(name) = payload.name {
        item.name = name;
    }
    if let Some(description) = payload.description {
        item.description = description;
    }
    if let Some(is_rented) = payload.is_rented {
        item.is_rented = is_rented;
    }
    item.updated_at = Utc::now();

    sqlx::query(
        "UPDATE items SET name = ?, description = ?, is_rented = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.is_rented)
    .bind(item.updated_at)
    .bind(id)
    .execute(&*state.db)
    .await?;

    Ok(Json(item))
}

/// DELETE `/items/{id}` — remove a listing and its image rows.
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("DELETE FROM images WHERE item_id = ?")
        .bind(id)
        .execute(&*state.db)
        .await?;

    let result = sqlx::query("DELETE FROM items WHERE id = ?")
        .bind(id)
        .execute(&*state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("item `{}` not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_item(state: &AppState, id: Uuid) -> Result<Item, AppError> {
    sqlx::query_as::<_, Item>(
        "SELECT id, name, description, user_id, is_rented, created_at, updated_at
         FROM items WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&*state.db)
    .await?
    .ok_or_else(|| AppError::not_found(format!("item `{}` not found", id)))
}
