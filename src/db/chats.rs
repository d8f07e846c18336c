use sqlx::{Pool, Sqlite};
use uuid::Uuid;
use crate::db::models::{Chat, ChatSummary};
use crate::db::{is_unique_violation, now_millis};
use crate::error::AppError;

pub struct ChatRepository;

impl ChatRepository {
    /// Fails with `DuplicateChat` when the user already owns a chat of that name.
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: &str,
        name: &str,
        icon: &str,
    ) -> Result<Chat, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = now_millis();

        sqlx::query_as::<_, Chat>(
            r#"
INSERT INTO chats (id, user_id, name, icon, last_modified, created_at)
VALUES (?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(name)
        .bind(icon)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| duplicate_or_db(e, name))
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<Chat>, AppError> {
        let chat = sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(chat)
    }

    /// Most recently modified first; same-millisecond rows fall back to insertion order.
    pub async fn list_for_user(
        pool: &Pool<Sqlite>,
        user_id: &str,
    ) -> Result<Vec<Chat>, AppError> {
        let chats = sqlx::query_as::<_, Chat>(
            r#"
SELECT * FROM chats
WHERE user_id = ?
ORDER BY last_modified DESC, rowid DESC
            "#
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(chats)
    }

    pub async fn summaries_for_user(
        pool: &Pool<Sqlite>,
        user_id: &str,
    ) -> Result<Vec<ChatSummary>, AppError> {
        let chats = sqlx::query_as::<_, ChatSummary>(
            r#"
SELECT c.id, c.name, c.icon, c.last_modified,
    (SELECT e.user_message FROM exchanges e
     WHERE e.chat_id = c.id
     ORDER BY e.created_at DESC, e.rowid DESC
     LIMIT 1) AS last_message
FROM chats c
WHERE c.user_id = ?
ORDER BY c.last_modified DESC, c.rowid DESC
            "#
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(chats)
    }

    pub async fn touch(pool: &Pool<Sqlite>, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE chats SET last_modified = ? WHERE id = ?")
            .bind(now_millis())
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn rename(
        pool: &Pool<Sqlite>,
        id: &str,
        name: &str,
    ) -> Result<Option<Chat>, AppError> {
        sqlx::query_as::<_, Chat>("UPDATE chats SET name = ? WHERE id = ? RETURNING *")
            .bind(name)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| duplicate_or_db(e, name))
    }
}

fn duplicate_or_db(err: sqlx::Error, name: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::DuplicateChat(name.to_string())
    } else {
        AppError::Database(err)
    }
}
