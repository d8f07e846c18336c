use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, warn};

use crate::conversation::naming::generate_chat_name;
use crate::conversation::palette::random_icon;
use crate::db::{
    now_millis, Chat, ChatRepository, ChatSummary, ContextItem, Exchange, ExchangeRepository,
    Rating,
};
use crate::error::AppError;

pub const DEFAULT_EXCHANGE_LIMIT: i64 = 10;
pub const ACTIVITY_EXCHANGE_LIMIT: i64 = 5;

/// Suffixes tried by [`ConversationService::create_chat_with_unique_name`].
const MAX_NAME_ATTEMPTS: u32 = 20;

/// A context annotation before it is timestamped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewContextItem {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandledMessage {
    pub chat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<Chat>,
    pub exchange: Exchange,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_new_chat: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatActivity {
    pub chat: Chat,
    /// Chronological.
    pub exchanges: Vec<Exchange>,
}

/// Chats and exchanges for authenticated users.
///
/// Each operation is atomic per document only. Adding an exchange and bumping
/// its chat's `last_modified` are two separate writes; if the second fails the
/// exchange is kept and the chat's ordering metadata is left stale.
#[derive(Clone)]
pub struct ConversationService {
    db: Pool<Sqlite>,
}

impl ConversationService {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Fails with `DuplicateChat` if the user already has a chat called `name`.
    pub async fn create_chat(
        &self,
        user_id: &str,
        name: &str,
        icon: Option<&str>,
    ) -> Result<Chat, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Chat name is required".to_string()));
        }

        let icon = match icon {
            Some(icon) => icon,
            None => random_icon(),
        };
        let chat = ChatRepository::create(&self.db, user_id, name, icon).await?;

        info!(chat_id = %chat.id, user_id, "Chat created: {}", chat.name);
        Ok(chat)
    }

    /// Like [`create_chat`](Self::create_chat), but resolves a name clash by
    /// appending ` (2)`, ` (3)`, ...
    pub async fn create_chat_with_unique_name(
        &self,
        user_id: &str,
        name: &str,
        icon: Option<&str>,
    ) -> Result<Chat, AppError> {
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 1 {
                name.to_string()
            } else {
                format!("{} ({})", name, attempt)
            };

            match self.create_chat(user_id, &candidate, icon).await {
                Err(AppError::DuplicateChat(_)) => continue,
                other => return other,
            }
        }

        Err(AppError::DuplicateChat(name.to_string()))
    }

    pub async fn create_exchange(
        &self,
        chat_id: &str,
        user_message: &str,
        ai_response: &str,
        context: Vec<NewContextItem>,
    ) -> Result<Exchange, AppError> {
        let timestamp = now_millis();
        let context = context
            .into_iter()
            .map(|item| ContextItem {
                key: item.key,
                value: item.value,
                timestamp,
            })
            .collect();

        let exchange =
            ExchangeRepository::create(&self.db, chat_id, user_message, ai_response, context)
                .await?;
        debug!(exchange_id = %exchange.id, chat_id, "Exchange stored");

        if let Err(e) = ChatRepository::touch(&self.db, chat_id).await {
            warn!(chat_id, "Exchange stored but chat last_modified not updated: {}", e);
        }

        Ok(exchange)
    }

    /// Store a completed user/AI turn, creating and naming the chat first when
    /// `chat_id` is absent.
    pub async fn handle_user_message(
        &self,
        user_id: &str,
        chat_id: Option<&str>,
        message: &str,
        ai_response: &str,
        context: Vec<NewContextItem>,
    ) -> Result<HandledMessage, AppError> {
        if message.trim().is_empty() {
            return Err(AppError::Validation("Message is required".to_string()));
        }

        if let Some(chat_id) = chat_id {
            let chat = self.get_chat_for_user(user_id, chat_id).await?;
            let exchange = self
                .create_exchange(&chat.id, message, ai_response, context)
                .await?;

            return Ok(HandledMessage {
                chat_id: chat.id,
                chat: None,
                exchange,
                is_new_chat: false,
            });
        }

        let name = generate_chat_name(message);
        let chat = self.create_chat_with_unique_name(user_id, &name, None).await?;
        let exchange = self
            .create_exchange(&chat.id, message, ai_response, context)
            .await?;

        // Pick up the last_modified written after the exchange
        let chat = ChatRepository::get_by_id(&self.db, &chat.id)
            .await?
            .unwrap_or(chat);

        Ok(HandledMessage {
            chat_id: chat.id.clone(),
            chat: Some(chat),
            exchange,
            is_new_chat: true,
        })
    }

    /// Resolve a chat, requiring that `user_id` owns it.
    pub async fn get_chat_for_user(&self, user_id: &str, chat_id: &str) -> Result<Chat, AppError> {
        let chat = ChatRepository::get_by_id(&self.db, chat_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))?;

        if chat.user_id != user_id {
            return Err(AppError::Ownership("Not authorized to access this chat".to_string()));
        }

        Ok(chat)
    }

    pub async fn rename_chat(
        &self,
        user_id: &str,
        chat_id: &str,
        new_name: &str,
    ) -> Result<Chat, AppError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(AppError::Validation("Chat ID and new name are required".to_string()));
        }

        self.get_chat_for_user(user_id, chat_id).await?;

        ChatRepository::rename(&self.db, chat_id, new_name)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))
    }

    /// Most recently modified first.
    pub async fn get_user_chats(&self, user_id: &str) -> Result<Vec<Chat>, AppError> {
        ChatRepository::list_for_user(&self.db, user_id).await
    }

    pub async fn get_user_chat_summaries(&self, user_id: &str) -> Result<Vec<ChatSummary>, AppError> {
        ChatRepository::summaries_for_user(&self.db, user_id).await
    }

    /// The newest `limit` exchanges, newest first. Reverse for reading order.
    pub async fn get_chat_exchanges(
        &self,
        chat_id: &str,
        limit: i64,
    ) -> Result<Vec<Exchange>, AppError> {
        ExchangeRepository::recent_for_chat(&self.db, chat_id, limit).await
    }

    pub async fn get_user_recent_activity(&self, user_id: &str) -> Result<Vec<ChatActivity>, AppError> {
        let chats = self.get_user_chats(user_id).await?;
        let mut activity = Vec::with_capacity(chats.len());

        for chat in chats {
            let mut exchanges = self
                .get_chat_exchanges(&chat.id, ACTIVITY_EXCHANGE_LIMIT)
                .await?;
            exchanges.reverse();
            activity.push(ChatActivity { chat, exchanges });
        }

        Ok(activity)
    }

    /// Set the favorite flag, or flip it when `is_favorite` is `None`.
    pub async fn toggle_exchange_favorite(
        &self,
        user_id: &str,
        exchange_id: &str,
        is_favorite: Option<bool>,
    ) -> Result<Exchange, AppError> {
        self.authorize_exchange(user_id, exchange_id).await?;

        ExchangeRepository::set_favorite(&self.db, exchange_id, is_favorite)
            .await?
            .ok_or_else(exchange_not_found)
    }

    pub async fn set_exchange_rating(
        &self,
        user_id: &str,
        exchange_id: &str,
        rating: Rating,
    ) -> Result<Exchange, AppError> {
        self.authorize_exchange(user_id, exchange_id).await?;

        ExchangeRepository::set_rating(&self.db, exchange_id, rating)
            .await?
            .ok_or_else(exchange_not_found)
    }

    pub async fn append_exchange_context(
        &self,
        user_id: &str,
        exchange_id: &str,
        item: NewContextItem,
    ) -> Result<Exchange, AppError> {
        if item.key.trim().is_empty() {
            return Err(AppError::Validation("Context key is required".to_string()));
        }

        self.authorize_exchange(user_id, exchange_id).await?;

        let item = ContextItem {
            key: item.key,
            value: item.value,
            timestamp: now_millis(),
        };

        ExchangeRepository::push_context(&self.db, exchange_id, &item)
            .await?
            .ok_or_else(exchange_not_found)
    }

    /// The user's exchanges carrying a context item with `key`, newest first.
    pub async fn get_exchanges_by_context_key(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Vec<Exchange>, AppError> {
        ExchangeRepository::find_by_context_key(&self.db, user_id, key).await
    }

    async fn authorize_exchange(&self, user_id: &str, exchange_id: &str) -> Result<Exchange, AppError> {
        let exchange = ExchangeRepository::get_by_id(&self.db, exchange_id)
            .await?
            .ok_or_else(exchange_not_found)?;

        let owner = ChatRepository::get_by_id(&self.db, &exchange.chat_id)
            .await?
            .map(|chat| chat.user_id);

        if owner.as_deref() != Some(user_id) {
            return Err(AppError::Ownership(
                "Not authorized to update this exchange".to_string(),
            ));
        }

        Ok(exchange)
    }
}

fn exchange_not_found() -> AppError {
    AppError::NotFound("Exchange not found".to_string())
}
