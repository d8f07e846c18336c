//! Conversation Service: chats, exchanges, and the rules that bind them.

pub mod naming;
pub mod palette;
pub mod service;

pub use naming::generate_chat_name;
pub use palette::{pick_random, random_avatar, random_icon, CHAT_ICONS, DEFAULT_AVATARS};
pub use service::{
    ChatActivity, ConversationService, HandledMessage, NewContextItem, ACTIVITY_EXCHANGE_LIMIT,
    DEFAULT_EXCHANGE_LIMIT,
};
