use std::sync::Arc;
use sqlx::{Pool, Sqlite};
use crate::config::Config;
use crate::conversation::ConversationService;
use crate::relay::CompletionClient;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub conversations: ConversationService,
    pub completion: Arc<dyn CompletionClient>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, completion: Arc<dyn CompletionClient>, config: Arc<Config>) -> Self {
        Self {
            conversations: ConversationService::new(db.clone()),
            db,
            completion,
            config,
        }
    }
}
