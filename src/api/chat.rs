use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::state::AppState;
use crate::conversation::{generate_chat_name, HandledMessage, DEFAULT_EXCHANGE_LIMIT};
use crate::db::{Chat, ChatSummary, Exchange, SessionUser};
use crate::error::AppError;
use crate::relay::{
    build_conversation, complete_or_placeholder, structured_response_schema, CompletionRequest,
    HISTORY_EXCHANGES, KRISHNA_SYSTEM_PROMPT,
};

/// Name given to a chat opened without a first message.
pub const NEW_CHAT_NAME: &str = "New Divine Conversation";

const MAX_MESSAGE_CHARS: usize = 4096;
const MAX_EXCHANGE_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub use_structured_response: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatMessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdateNameRequest {
    pub chat_id: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct GetExchangesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_EXCHANGE_LIMIT
}

#[derive(Debug, Serialize)]
pub struct RecentChatsResponse {
    pub success: bool,
    pub chats: Vec<ChatSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatResponse {
    pub success: bool,
    pub chat_id: String,
    pub chat: Chat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub success: bool,
    pub data: HandledMessage,
    pub ai_response: String,
}

#[derive(Debug, Serialize)]
pub struct DisplayMessage {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// One exchange as the chat view renders it: the user turn then the AI turn.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayExchange {
    pub id: String,
    pub messages: [DisplayMessage; 2],
    pub timestamp: i64,
    pub is_favorite: bool,
    pub rating: crate::db::Rating,
}

impl From<Exchange> for DisplayExchange {
    fn from(exchange: Exchange) -> Self {
        Self {
            messages: [
                DisplayMessage {
                    id: format!("user_{}", exchange.id),
                    content: exchange.user_message,
                    kind: "user",
                },
                DisplayMessage {
                    id: format!("ai_{}", exchange.id),
                    content: exchange.ai_response,
                    kind: "ai",
                },
            ],
            id: exchange.id,
            timestamp: exchange.created_at,
            is_favorite: exchange.is_favorite,
            rating: exchange.rating,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatExchangesResponse {
    pub success: bool,
    pub exchanges: Vec<DisplayExchange>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedExchange {
    pub id: String,
    pub user_message: String,
    pub ai_response: String,
}

#[derive(Debug, Serialize)]
pub struct PostMessageResponse {
    pub success: bool,
    pub exchange: PostedExchange,
}

fn validate_message(message: &str) -> Result<&str, AppError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(trimmed)
}

/// Ask the provider for the persona's reply, applying the configured
/// empty-reply policy to plain-text completions.
async fn persona_reply(
    state: &AppState,
    history: &[Exchange],
    message: &str,
    structured: bool,
) -> Result<String, AppError> {
    let mut request = CompletionRequest::new(build_conversation(KRISHNA_SYSTEM_PROMPT, history, message));
    if structured {
        request = request.with_schema(structured_response_schema());
    }

    let fallback = state.config.empty_completion_fallback && !structured;
    let reply = complete_or_placeholder(state.completion.as_ref(), request, fallback).await?;

    Ok(reply)
}

/// GET /api/chat/recent
pub async fn recent(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<RecentChatsResponse>, AppError> {
    let chats = state.conversations.get_user_chat_summaries(&user.id).await?;

    Ok(Json(RecentChatsResponse { success: true, chats }))
}

/// POST /api/chat/new
pub async fn new_chat(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ApiJson(req): ApiJson<NewChatRequest>,
) -> Result<Json<NewChatResponse>, AppError> {
    let first_message = req
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());

    let chat = match first_message {
        Some(message) => {
            let message = validate_message(message)?;
            let reply = persona_reply(&state, &[], message, false).await?;
            let handled = state
                .conversations
                .handle_user_message(&user.id, None, message, &reply, Vec::new())
                .await?;

            handled
                .chat
                .ok_or_else(|| AppError::Internal("New chat missing from result".to_string()))?
        }
        None => {
            state
                .conversations
                .create_chat_with_unique_name(&user.id, NEW_CHAT_NAME, None)
                .await?
        }
    };

    Ok(Json(NewChatResponse {
        success: true,
        chat_id: chat.id.clone(),
        chat,
    }))
}

/// POST /api/chat
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let message = validate_message(&req.message)?;
    let chat_id = req.chat_id.as_deref().map(str::trim).filter(|id| !id.is_empty());

    let history = match chat_id {
        Some(chat_id) => {
            let chat = state.conversations.get_chat_for_user(&user.id, chat_id).await?;
            state
                .conversations
                .get_chat_exchanges(&chat.id, HISTORY_EXCHANGES)
                .await?
        }
        None => Vec::new(),
    };

    let ai_response = persona_reply(&state, &history, message, req.use_structured_response).await?;

    let data = state
        .conversations
        .handle_user_message(&user.id, chat_id, message, &ai_response, Vec::new())
        .await?;

    Ok(Json(SendMessageResponse {
        success: true,
        data,
        ai_response,
    }))
}

/// POST /api/chat/name
pub async fn name(
    Extension(_user): Extension<SessionUser>,
    ApiJson(req): ApiJson<ChatMessageRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let message = validate_message(&req.message)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "name": generate_chat_name(message),
    })))
}

/// GET /api/chat/{chat_id}
pub async fn get_chat(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(chat_id): Path<String>,
    ApiQuery(query): ApiQuery<GetExchangesQuery>,
) -> Result<Json<ChatExchangesResponse>, AppError> {
    let limit = query.limit.clamp(1, MAX_EXCHANGE_LIMIT);

    let chat = state.conversations.get_chat_for_user(&user.id, &chat_id).await?;
    let exchanges = state.conversations.get_chat_exchanges(&chat.id, limit).await?;

    Ok(Json(ChatExchangesResponse {
        success: true,
        exchanges: exchanges.into_iter().map(DisplayExchange::from).collect(),
    }))
}

/// POST /api/chat/{chat_id}
pub async fn post_message(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(chat_id): Path<String>,
    ApiJson(req): ApiJson<ChatMessageRequest>,
) -> Result<Json<PostMessageResponse>, AppError> {
    let message = validate_message(&req.message)?;

    let chat = state.conversations.get_chat_for_user(&user.id, &chat_id).await?;
    let history = state
        .conversations
        .get_chat_exchanges(&chat.id, HISTORY_EXCHANGES)
        .await?;

    let ai_response = persona_reply(&state, &history, message, false).await?;

    let handled = state
        .conversations
        .handle_user_message(&user.id, Some(&chat.id), message, &ai_response, Vec::new())
        .await?;

    Ok(Json(PostMessageResponse {
        success: true,
        exchange: PostedExchange {
            id: handled.exchange.id,
            user_message: handled.exchange.user_message,
            ai_response: handled.exchange.ai_response,
        },
    }))
}

/// PATCH /api/chat/update-name
pub async fn update_name(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ApiJson(req): ApiJson<UpdateNameRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.chat_id.trim().is_empty() {
        return Err(AppError::Validation("Chat ID and new name are required".to_string()));
    }

    let chat = state
        .conversations
        .rename_chat(&user.id, req.chat_id.trim(), &req.new_name)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "chatId": chat.id,
        "newName": chat.name,
    })))
}
