//! HTTP handlers for user accounts. Thin wrappers over the users table;
//! the only interesting semantics are "not found" and the unique email.

use crate::{errors::AppError, models::user::User, state::AppState};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateUserReq {
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub phone: String,
    pub postal_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserReq {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub postal_code: Option<String>,
}

/// POST `/users` — register a user.
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserReq>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: payload.name,
        email: payload.email,
        address: payload.address,
        phone: payload.phone,
        postal_code: payload.postal_code,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO users (id, name, email, address, phone, postal_code, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.address)
    .bind(&user.phone)
    .bind(&user.postal_code)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&*state.db)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::new(
                StatusCode::CONFLICT,
                format!("email `{}` is already registered", user.email),
            )
        } else {
            AppError::from(err)
        }
    })?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// PATCH `/users/{id}` — partial update of profile fields.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserReq>,
) -> Result<Json<User>, AppError> {
    let mut user = fetch_user(&state, id).await?;

    if let Some(name) = payload.name {
        user.name = name;
    }
    if let Some(email) = payload.email {
        user.email = email;
    }
    if let Some(address) = payload.address {
        user.address = Some(address);
    }
    if let Some(phone) = payload.phone {
        user.phone = phone;
    }
    if let Some(postal_code) = payload.postal_code {
        user.postal_code = Some(postal_code);
    }
    user.updated_at = Utc::now();

    sqlx::query(
        "UPDATE users SET name = ?, email = ?, address = ?, phone = ?, postal_code = ?,
         updated_at = ? WHERE id = ?",
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.address)
    .bind(&user.phone)
    .bind(&user.postal_code)
    .bind(user.updated_at)
    .bind(id)
    .execute(&*state.db)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::new(
                StatusCode::CONFLICT,
                format!("email `{}` is already registered", user.email),
            )
        } else {
            AppError::from(err)
        }
    })?;

    Ok(Json(user))
}

/// GET `/users` — list all users.
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, name, email, address, phone, postal_code, created_at, updated_at
         FROM users ORDER BY created_at",
    )
    .fetch_all(&*state.db)
    .await?;
    Ok(Json(users))
}

/// GET `/users/{id}` — fetch one user.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = fetch_user(&state, id).await?;
    Ok(Json(user))
}

async fn fetch_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT id, name, email, address, phone, postal_code, created_at, updated_at
         FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&*state.db)
    .await?
    .ok_or_else(|| AppError::not_found(format!("user `{}` not found", id)))
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::app_state;
    use tempfile::tempdir;

    async fn seed_user(state: &AppState, name: &str, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (id, name, email, phone, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind("555-0100")
        .bind(now)
        .bind(now)
        .execute(&*state.db)
        .await
        .unwrap();
        id
    }

    fn patch() -> UpdateUserReq {
        UpdateUserReq {
            name: None,
            email: None,
            address: None,
            phone: None,
            postal_code: None,
        }
    }

    #[tokio::test]
    async fn update_user_applies_partial_changes() {
        let dir = tempdir().unwrap();
        let state = app_state(&dir).await;
        let id = seed_user(&state, "Ana", "ana@example.test").await;

        update_user(
            State(state.clone()),
            Path(id),
            Json(UpdateUserReq {
                name: Some("Ana Maria".into()),
                address: Some("Calle 5".into()),
                ..patch()
            }),
        )
        .await
        .unwrap();

        let user = fetch_user(&state, id).await.unwrap();
        assert_eq!(user.name, "Ana Maria");
        assert_eq!(user.address.as_deref(), Some("Calle 5"));
        // Untouched fields survive.
        assert_eq!(user.email, "ana@example.test");
        assert_eq!(user.phone, "555-0100");
    }

    #[tokio::test]
    async fn update_user_rejects_taken_email() {
        let dir = tempdir().unwrap();
        let state = app_state(&dir).await;
        let id = seed_user(&state, "Ana", "ana@example.test").await;
        seed_user(&state, "Berta", "berta@example.test").await;

        let err = update_user(
            State(state.clone()),
            Path(id),
            Json(UpdateUserReq {
                email: Some("berta@example.test".into()),
                ..patch()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);

        // Nothing was written.
        let user = fetch_user(&state, id).await.unwrap();
        assert_eq!(user.email, "ana@example.test");
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let dir = tempdir().unwrap();
        let state = app_state(&dir).await;

        let err = update_user(State(state), Path(Uuid::new_v4()), Json(patch()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
