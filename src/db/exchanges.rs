use sqlx::types::Json;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;
use crate::db::models::{ContextItem, Exchange, Rating};
use crate::db::now_millis;
use crate::error::AppError;

pub struct ExchangeRepository;

impl ExchangeRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        chat_id: &str,
        user_message: &str,
        ai_response: &str,
        context: Vec<ContextItem>,
    ) -> Result<Exchange, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = now_millis();

        let exchange = sqlx::query_as::<_, Exchange>(
            r#"
INSERT INTO exchanges (id, chat_id, user_message, ai_response, context, created_at)
VALUES (?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(chat_id)
        .bind(user_message)
        .bind(ai_response)
        .bind(Json(context))
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(exchange)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<Exchange>, AppError> {
        let exchange = sqlx::query_as::<_, Exchange>("SELECT * FROM exchanges WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(exchange)
    }

    /// Newest first.
    pub async fn recent_for_chat(
        pool: &Pool<Sqlite>,
        chat_id: &str,
        limit: i64,
    ) -> Result<Vec<Exchange>, AppError> {
        let exchanges = sqlx::query_as::<_, Exchange>(
            r#"
SELECT * FROM exchanges
WHERE chat_id = ?
ORDER BY created_at DESC, rowid DESC
LIMIT ?
            "#
        )
        .bind(chat_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(exchanges)
    }

    /// `None` inverts the stored flag in the same statement.
    pub async fn set_favorite(
        pool: &Pool<Sqlite>,
        id: &str,
        is_favorite: Option<bool>,
    ) -> Result<Option<Exchange>, AppError> {
        let exchange = sqlx::query_as::<_, Exchange>(
            r#"
UPDATE exchanges
SET is_favorite = COALESCE(?, NOT is_favorite)
WHERE id = ?
RETURNING *
            "#
        )
        .bind(is_favorite)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(exchange)
    }

    pub async fn set_rating(
        pool: &Pool<Sqlite>,
        id: &str,
        rating: Rating,
    ) -> Result<Option<Exchange>, AppError> {
        let exchange = sqlx::query_as::<_, Exchange>(
            "UPDATE exchanges SET rating = ? WHERE id = ? RETURNING *"
        )
        .bind(rating)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(exchange)
    }

    pub async fn push_context(
        pool: &Pool<Sqlite>,
        id: &str,
        item: &ContextItem,
    ) -> Result<Option<Exchange>, AppError> {
        let encoded = serde_json::to_string(item)
            .map_err(|e| AppError::Internal(format!("Failed to encode context item: {}", e)))?;

        let exchange = sqlx::query_as::<_, Exchange>(
            r#"
UPDATE exchanges
SET context = json_insert(context, '$[#]', json(?))
WHERE id = ?
RETURNING *
            "#
        )
        .bind(encoded)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(exchange)
    }

    pub async fn find_by_context_key(
        pool: &Pool<Sqlite>,
        user_id: &str,
        key: &str,
    ) -> Result<Vec<Exchange>, AppError> {
        let exchanges = sqlx::query_as::<_, Exchange>(
            r#"
SELECT e.* FROM exchanges e
JOIN chats c ON e.chat_id = c.id
WHERE c.user_id = ?
  AND EXISTS (
    SELECT 1 FROM json_each(e.context) item
    WHERE json_extract(item.value, '$.key') = ?
  )
ORDER BY e.created_at DESC, e.rowid DESC
            "#
        )
        .bind(user_id)
        .bind(key)
        .fetch_all(pool)
        .await?;

        Ok(exchanges)
    }
}
