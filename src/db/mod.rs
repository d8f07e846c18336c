pub mod models;
pub mod users;
pub mod sessions;
pub mod chats;
pub mod exchanges;

pub use models::{Chat, ChatSummary, ContextItem, Exchange, Rating, Session, SessionUser, User};
pub use users::UserRepository;
pub use sessions::SessionRepository;
pub use chats::ChatRepository;
pub use exchanges::ExchangeRepository;

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::error::AppError;

/// Open the process-wide connection pool and bring the schema up to date.
///
/// The returned pool is cloned into every consumer; call `close()` on it at
/// shutdown.
pub async fn connect(config: &Config) -> Result<Pool<Sqlite>, AppError> {
    // An in-memory database lives exactly as long as its connection.
    let in_memory = config.database_url.contains(":memory:");

    let mut options = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { config.db_max_connections })
        .min_connections(config.db_min_connections.min(config.db_max_connections))
        .acquire_timeout(Duration::from_secs(30));

    options = if in_memory {
        options.idle_timeout(None).max_lifetime(None)
    } else {
        options
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
    };

    let db = options.connect(&config.database_url).await?;

    sqlx::migrate!("./migrations").run(&db).await?;

    Ok(db)
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
