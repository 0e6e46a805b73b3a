//! HTTP handlers for direct messages between users.

use crate::{errors::AppError, models::message::Message, state::AppState};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SendMessageReq {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub user_a: Uuid,
    pub user_b: Uuid,
    /// 1-based page number, default 1.
    pub page: Option<u32>,
    /// Page size, default 50, clamped to 1..=200.
    pub limit: Option<u32>,
}

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;

/// POST `/messages` — send a message.
pub async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SendMessageReq>,
) -> Result<impl IntoResponse, AppError> {
    for user_id in [payload.sender_id, payload.receiver_id] {
        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&*state.db)
            .await?;
        if found.is_none() {
            return Err(AppError::not_found(format!("user `{}` not found", user_id)));
        }
    }

    let message = Message {
        id: Uuid::new_v4(),
        sender_id: payload.sender_id,
        receiver_id: payload.receiver_id,
        content: payload.content,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO messages (id, sender_id, receiver_id, content, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(message.id)
    .bind(message.sender_id)
    .bind(message.receiver_id)
    .bind(&message.content)
    .bind(message.created_at)
    .execute(&*state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET `/messages?user_a=&user_b=&page=&limit=` — both directions of a
/// conversation, oldest first, paginated.
pub async fn list_conversation(
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) as i64 * limit as i64;

    let messages = sqlx::query_as::<_, Message>(
        "SELECT id, sender_id, receiver_id, content, created_at
         FROM messages
         WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
         ORDER BY created_at LIMIT ? OFFSET ?",
    )
    .bind(query.user_a)
    .bind(query.user_b)
    .bind(query.user_b)
    .bind(query.user_a)
    .bind(limit as i64)
    .bind(offset)
    .fetch_all(&*state.db)
    .await?;

    Ok(Json(messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::app_state;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    async fn seed_user(state: &AppState, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (id, name, email, phone, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind("someone")
        .bind(email)
        .bind("555-0100")
        .bind(now)
        .bind(now)
        .execute(&*state.db)
        .await
        .unwrap();
        id
    }

    async fn seed_message(state: &AppState, from: Uuid, to: Uuid, content: &str, minute: u32) {
        sqlx::query(
            "INSERT INTO messages (id, sender_id, receiver_id, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(from)
        .bind(to)
        .bind(content)
        .bind(Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap())
        .execute(&*state.db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn conversation_pages_are_ordered_and_bounded() {
        let dir = tempdir().unwrap();
        let state = app_state(&dir).await;
        let ana = seed_user(&state, "ana@example.test").await;
        let berta = seed_user(&state, "berta@example.test").await;
        let carol = seed_user(&state, "carol@example.test").await;

        for (minute, content) in ["m1", "m2", "m3", "m4", "m5"].iter().enumerate() {
            let (from, to) = if minute % 2 == 0 { (ana, berta) } else { (berta, ana) };
            seed_message(&state, from, to, content, minute as u32).await;
        }
        // Unrelated conversation never leaks in.
        seed_message(&state, ana, carol, "other", 0).await;

        let query = |page, limit| ConversationQuery {
            user_a: ana,
            user_b: berta,
            page,
            limit,
        };

        let Json(page1) = list_conversation(State(state.clone()), Query(query(Some(1), Some(2))))
            .await
            .unwrap();
        let contents: Vec<&str> = page1.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m1", "m2"]);

        let Json(page3) = list_conversation(State(state.clone()), Query(query(Some(3), Some(2))))
            .await
            .unwrap();
        let contents: Vec<&str> = page3.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m5"]);

        // Defaults return the whole short conversation, both directions.
        let Json(all) = list_conversation(State(state.clone()), Query(query(None, None)))
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
    }
}
