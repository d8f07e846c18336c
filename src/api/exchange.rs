use axum::{
    extract::State,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::state::AppState;
use crate::conversation::NewContextItem;
use crate::db::{ContextItem, Exchange, Rating, SessionUser};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub exchange_id: String,
    #[serde(default)]
    pub is_favorite: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RatingRequest {
    pub exchange_id: String,
    pub rating: Rating,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ContextRequest {
    pub exchange_id: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ContextSearchQuery {
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteResponse {
    pub success: bool,
    pub is_favorite: bool,
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub success: bool,
    pub rating: Rating,
}

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub success: bool,
    pub context: Vec<ContextItem>,
}

#[derive(Debug, Serialize)]
pub struct ContextSearchResponse {
    pub success: bool,
    pub exchanges: Vec<Exchange>,
}

fn require_exchange_id(id: &str) -> Result<&str, AppError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::Validation("Exchange ID is required".to_string()));
    }
    Ok(id)
}

/// POST /api/exchange/favorite
pub async fn favorite(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ApiJson(req): ApiJson<FavoriteRequest>,
) -> Result<Json<FavoriteResponse>, AppError> {
    let exchange_id = require_exchange_id(&req.exchange_id)?;

    let exchange = state
        .conversations
        .toggle_exchange_favorite(&user.id, exchange_id, req.is_favorite)
        .await?;

    Ok(Json(FavoriteResponse {
        success: true,
        is_favorite: exchange.is_favorite,
    }))
}

/// POST /api/exchange/rating
pub async fn rating(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ApiJson(req): ApiJson<RatingRequest>,
) -> Result<Json<RatingResponse>, AppError> {
    let exchange_id = require_exchange_id(&req.exchange_id)?;

    let exchange = state
        .conversations
        .set_exchange_rating(&user.id, exchange_id, req.rating)
        .await?;

    Ok(Json(RatingResponse {
        success: true,
        rating: exchange.rating,
    }))
}

/// POST /api/exchange/context
pub async fn context(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ApiJson(req): ApiJson<ContextRequest>,
) -> Result<Json<ContextResponse>, AppError> {
    let exchange_id = require_exchange_id(&req.exchange_id)?;

    let exchange = state
        .conversations
        .append_exchange_context(
            &user.id,
            exchange_id,
            NewContextItem {
                key: req.key,
                value: req.value,
            },
        )
        .await?;

    Ok(Json(ContextResponse {
        success: true,
        context: exchange.context.0,
    }))
}

/// GET /api/exchange/search?key=
pub async fn search(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ApiQuery(query): ApiQuery<ContextSearchQuery>,
) -> Result<Json<ContextSearchResponse>, AppError> {
    let key = query.key.trim();
    if key.is_empty() {
        return Err(AppError::Validation("Context key is required".to_string()));
    }

    let exchanges = state
        .conversations
        .get_exchanges_by_context_key(&user.id, key)
        .await?;

    Ok(Json(ContextSearchResponse {
        success: true,
        exchanges,
    }))
}
