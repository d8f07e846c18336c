#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::{Pool, Sqlite};

use krishna_gpt::api::{create_router, AppState};
use krishna_gpt::config::Config;
use krishna_gpt::crypto::{generate_salt, hash_password};
use krishna_gpt::db::{self, User, UserRepository};
use krishna_gpt::relay::{CompletionClient, CompletionError, CompletionRequest};

/// Fresh in-memory database with the schema applied.
pub async fn test_pool() -> Pool<Sqlite> {
    db::connect(&Config::default()).await.expect("in-memory pool")
}

pub async fn seed_user(pool: &Pool<Sqlite>, email: &str) -> User {
    let salt = generate_salt();
    let hash = hash_password("longenough1", &salt).unwrap();
    UserRepository::create(pool, email, "Seeker", &hash, &salt, "/x.png")
        .await
        .unwrap()
}

/// Completion client that replays queued replies and records every request.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn push_reply(&self, reply: Result<String, CompletionError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Be still, and listen.".to_string()))
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub completion: Arc<ScriptedCompletion>,
    pub db: Pool<Sqlite>,
}

pub async fn test_app() -> TestApp {
    let db = test_pool().await;
    let completion = Arc::new(ScriptedCompletion::default());
    let state = AppState::new(db.clone(), completion.clone(), Arc::new(Config::default()));

    TestApp {
        router: create_router(state),
        completion,
        db,
    }
}
