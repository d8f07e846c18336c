pub mod auth;
pub mod chat;
pub mod exchange;
pub mod extract;
pub mod middleware;
pub mod state;

pub use state::AppState;

use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    middleware as axum_middleware,
};
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
    timeout::TimeoutLayer,
};
use std::time::Duration;
use serde::Serialize;

use crate::error::AppError;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    // Everything here runs behind the session gate
    let protected = Router::new()
        .route("/chat", post(chat::send_message))
        .route("/chat/recent", get(chat::recent))
        .route("/chat/new", post(chat::new_chat))
        .route("/chat/name", post(chat::name))
        .route("/chat/update-name", patch(chat::update_name))
        .route("/chat/{chat_id}", get(chat::get_chat).post(chat::post_message))
        .route("/exchange/favorite", post(exchange::favorite))
        .route("/exchange/rating", post(exchange::rating))
        .route("/exchange/context", post(exchange::context))
        .route("/exchange/search", get(exchange::search))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/check", get(auth::check));

    with_timeout(Router::new().nest("/api", public.merge(protected)), timeout)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Abort handlers that run longer than `timeout`, answering in the common
/// error shape.
fn with_timeout<S>(router: Router<S>, timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(axum_middleware::map_response(timeout_as_error))
}

async fn timeout_as_error(response: Response) -> Response {
    // Handlers never answer 408 themselves
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return AppError::Internal("Request timed out".to_string()).into_response();
    }
    response
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn slow_handler_times_out_with_json_error() {
        let slow = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let app = with_timeout(slow, Duration::from_millis(20));

        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal error: Request timed out");
    }

    #[tokio::test]
    async fn fast_handler_is_untouched() {
        let app = with_timeout(Router::new().route("/fast", get(|| async { "ok" })), Duration::from_secs(1));

        let response = app
            .oneshot(Request::builder().uri("/fast").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
