use sqlx::{Pool, Sqlite};
use uuid::Uuid;
use crate::db::models::User;
use crate::db::{is_unique_violation, now_millis};
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        email: &str,
        username: &str,
        password_hash: &[u8; 32],
        password_salt: &[u8; 32],
        avatar: &str,
    ) -> Result<User, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = now_millis();

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (id, email, username, password_hash, password_salt, avatar, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(username)
        .bind(password_hash.as_slice())
        .bind(password_salt.as_slice())
        .bind(avatar)
        .bind(created_at)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation("User with this email already exists".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(user)
    }

    /// Email comparison is case-insensitive (`COLLATE NOCASE` on the column).
    pub async fn get_by_email(
        pool: &Pool<Sqlite>,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = ?"
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }
}
