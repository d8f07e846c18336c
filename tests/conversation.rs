mod common;

use std::time::Duration;

use krishna_gpt::conversation::{ConversationService, NewContextItem, CHAT_ICONS};
use krishna_gpt::db::{Rating, UserRepository};
use krishna_gpt::error::AppError;

use common::{seed_user, test_pool};

async fn pause() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn created_exchange_is_the_latest() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let user = seed_user(&db, "a@x.com").await;

    let chat = service.create_chat(&user.id, "Dharma", None).await.unwrap();
    service.create_exchange(&chat.id, "first", "one", Vec::new()).await.unwrap();
    let second = service.create_exchange(&chat.id, "second", "two", Vec::new()).await.unwrap();

    let latest = service.get_chat_exchanges(&chat.id, 1).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].id, second.id);
    assert_eq!(latest[0].rating, Rating::Good);
    assert!(!latest[0].is_favorite);
}

#[tokio::test]
async fn chats_are_listed_most_recent_first() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let user = seed_user(&db, "a@x.com").await;

    let first = service.create_chat(&user.id, "First", None).await.unwrap();
    pause().await;
    let second = service.create_chat(&user.id, "Second", None).await.unwrap();
    pause().await;
    let third = service.create_chat(&user.id, "Third", None).await.unwrap();

    let ids: Vec<_> = service
        .get_user_chats(&user.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![third.id.clone(), second.id.clone(), first.id.clone()]);

    // A new exchange moves its chat to the top
    pause().await;
    service.create_exchange(&first.id, "hello", "hi", Vec::new()).await.unwrap();

    let chats = service.get_user_chats(&user.id).await.unwrap();
    assert_eq!(chats[0].id, first.id);
    assert!(chats[0].last_modified > first.last_modified);
}

#[tokio::test]
async fn chat_names_are_unique_per_user() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let alice = seed_user(&db, "alice@x.com").await;
    let bob = seed_user(&db, "bob@x.com").await;

    service.create_chat(&alice.id, "Peace", Some("lotus")).await.unwrap();

    let duplicate = service.create_chat(&alice.id, "Peace", None).await;
    assert!(matches!(duplicate, Err(AppError::DuplicateChat(name)) if name == "Peace"));

    let other_owner = service.create_chat(&bob.id, "Peace", None).await.unwrap();
    assert_eq!(other_owner.name, "Peace");
}

#[tokio::test]
async fn icon_defaults_to_palette() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let user = seed_user(&db, "a@x.com").await;

    let random = service.create_chat(&user.id, "Random", None).await.unwrap();
    assert!(CHAT_ICONS.contains(&random.icon.as_str()));

    let chosen = service.create_chat(&user.id, "Chosen", Some("moon")).await.unwrap();
    assert_eq!(chosen.icon, "moon");
}

#[tokio::test]
async fn first_message_creates_a_named_chat() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let user = seed_user(&db, "a@x.com").await;

    let result = service
        .handle_user_message(&user.id, None, "How do I find peace?", "...", Vec::new())
        .await
        .unwrap();

    assert!(result.is_new_chat);
    let chat = result.chat.expect("new chat returned");
    assert_eq!(chat.name, "How do I find…");
    assert_eq!(chat.id, result.chat_id);
    assert_eq!(result.exchange.user_message, "How do I find peace?");
    assert_eq!(result.exchange.chat_id, chat.id);

    let stored = service.get_chat_for_user(&user.id, &chat.id).await.unwrap();
    assert_eq!(chat.last_modified, stored.last_modified);
    assert!(chat.last_modified >= result.exchange.created_at);
}

#[tokio::test]
async fn repeated_first_message_gets_a_suffixed_name() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let user = seed_user(&db, "a@x.com").await;

    for expected in ["How do I find…", "How do I find… (2)", "How do I find… (3)"] {
        let result = service
            .handle_user_message(&user.id, None, "How do I find peace?", "...", Vec::new())
            .await
            .unwrap();
        assert_eq!(result.chat.unwrap().name, expected);
    }
}

#[tokio::test]
async fn message_into_existing_chat_requires_ownership() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let alice = seed_user(&db, "alice@x.com").await;
    let bob = seed_user(&db, "bob@x.com").await;

    let chat = service.create_chat(&alice.id, "Mine", None).await.unwrap();

    let result = service
        .handle_user_message(&alice.id, Some(&chat.id), "again", "reply", Vec::new())
        .await
        .unwrap();
    assert!(!result.is_new_chat);
    assert!(result.chat.is_none());
    assert_eq!(result.chat_id, chat.id);

    let foreign = service
        .handle_user_message(&bob.id, Some(&chat.id), "intrude", "reply", Vec::new())
        .await;
    assert!(matches!(foreign, Err(AppError::Ownership(_))));

    let missing = service
        .handle_user_message(&alice.id, Some("no-such-chat"), "hello", "reply", Vec::new())
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let blank = service
        .handle_user_message(&alice.id, None, "   ", "reply", Vec::new())
        .await;
    assert!(matches!(blank, Err(AppError::Validation(_))));

    assert_eq!(service.get_chat_exchanges(&chat.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn favorite_toggle_is_an_involution() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let user = seed_user(&db, "a@x.com").await;
    let chat = service.create_chat(&user.id, "Fav", None).await.unwrap();
    let exchange = service.create_exchange(&chat.id, "q", "a", Vec::new()).await.unwrap();

    let once = service.toggle_exchange_favorite(&user.id, &exchange.id, None).await.unwrap();
    assert!(once.is_favorite);
    let twice = service.toggle_exchange_favorite(&user.id, &exchange.id, None).await.unwrap();
    assert_eq!(twice.is_favorite, exchange.is_favorite);

    let set = service.toggle_exchange_favorite(&user.id, &exchange.id, Some(true)).await.unwrap();
    assert!(set.is_favorite);
    let again = service.toggle_exchange_favorite(&user.id, &exchange.id, Some(true)).await.unwrap();
    assert!(again.is_favorite);
}

#[tokio::test]
async fn rating_is_overwritten() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let user = seed_user(&db, "a@x.com").await;
    let chat = service.create_chat(&user.id, "Rate", None).await.unwrap();
    let exchange = service.create_exchange(&chat.id, "q", "a", Vec::new()).await.unwrap();

    let bad = service.set_exchange_rating(&user.id, &exchange.id, Rating::Bad).await.unwrap();
    assert_eq!(bad.rating, Rating::Bad);
    let good = service.set_exchange_rating(&user.id, &exchange.id, Rating::Good).await.unwrap();
    assert_eq!(good.rating, Rating::Good);
}

#[tokio::test]
async fn foreign_user_cannot_mutate_exchange() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let alice = seed_user(&db, "alice@x.com").await;
    let bob = seed_user(&db, "bob@x.com").await;
    let chat = service.create_chat(&alice.id, "Private", None).await.unwrap();
    let exchange = service.create_exchange(&chat.id, "q", "a", Vec::new()).await.unwrap();

    let favorite = service.toggle_exchange_favorite(&bob.id, &exchange.id, None).await;
    assert!(matches!(favorite, Err(AppError::Ownership(_))));

    let rating = service.set_exchange_rating(&bob.id, &exchange.id, Rating::Bad).await;
    assert!(matches!(rating, Err(AppError::Ownership(_))));

    let context = service
        .append_exchange_context(
            &bob.id,
            &exchange.id,
            NewContextItem { key: "k".to_string(), value: "v".to_string() },
        )
        .await;
    assert!(matches!(context, Err(AppError::Ownership(_))));

    let unchanged = service.get_chat_exchanges(&chat.id, 1).await.unwrap().remove(0);
    assert!(!unchanged.is_favorite);
    assert_eq!(unchanged.rating, Rating::Good);
    assert!(unchanged.context.0.is_empty());

    let missing = service.toggle_exchange_favorite(&alice.id, "no-such-exchange", None).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn recent_activity_is_chronological_and_capped() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let user = seed_user(&db, "a@x.com").await;

    let busy = service.create_chat(&user.id, "Busy", None).await.unwrap();
    for i in 0..7 {
        service
            .create_exchange(&busy.id, &format!("q{i}"), &format!("a{i}"), Vec::new())
            .await
            .unwrap();
    }
    pause().await;
    let quiet = service.create_chat(&user.id, "Quiet", None).await.unwrap();

    let activity = service.get_user_recent_activity(&user.id).await.unwrap();

    assert_eq!(activity.len(), 2);
    assert_eq!(activity[0].chat.id, quiet.id);
    assert!(activity[0].exchanges.is_empty());

    let messages: Vec<_> = activity[1]
        .exchanges
        .iter()
        .map(|e| e.user_message.as_str())
        .collect();
    assert_eq!(messages, vec!["q2", "q3", "q4", "q5", "q6"]);
}

#[tokio::test]
async fn context_items_are_appended_and_searchable() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let alice = seed_user(&db, "alice@x.com").await;
    let bob = seed_user(&db, "bob@x.com").await;

    let chat = service.create_chat(&alice.id, "Context", None).await.unwrap();
    let tagged = service
        .create_exchange(
            &chat.id,
            "q",
            "a",
            vec![NewContextItem { key: "mood".to_string(), value: "anxious".to_string() }],
        )
        .await
        .unwrap();
    let plain = service.create_exchange(&chat.id, "q2", "a2", Vec::new()).await.unwrap();
    assert_eq!(tagged.context.0.len(), 1);
    assert!(tagged.context.0[0].timestamp > 0);

    let updated = service
        .append_exchange_context(
            &alice.id,
            &plain.id,
            NewContextItem { key: "topic".to_string(), value: "work".to_string() },
        )
        .await
        .unwrap();
    assert_eq!(updated.context.0.len(), 1);
    assert_eq!(updated.context.0[0].key, "topic");

    let again = service
        .append_exchange_context(
            &alice.id,
            &plain.id,
            NewContextItem { key: "mood".to_string(), value: "calm".to_string() },
        )
        .await
        .unwrap();
    assert_eq!(again.context.0.len(), 2);
    assert_eq!(again.context.0[1].value, "calm");

    let moods = service.get_exchanges_by_context_key(&alice.id, "mood").await.unwrap();
    let ids: Vec<_> = moods.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![plain.id.as_str(), tagged.id.as_str()]);

    assert!(service.get_exchanges_by_context_key(&bob.id, "mood").await.unwrap().is_empty());
}

#[tokio::test]
async fn rename_checks_owner_and_uniqueness() {
    let db = test_pool().await;
    let service = ConversationService::new(db.clone());
    let alice = seed_user(&db, "alice@x.com").await;
    let bob = seed_user(&db, "bob@x.com").await;

    let chat = service.create_chat(&alice.id, "Old", None).await.unwrap();
    service.create_chat(&alice.id, "Taken", None).await.unwrap();

    let renamed = service.rename_chat(&alice.id, &chat.id, "  New  ").await.unwrap();
    assert_eq!(renamed.name, "New");

    let clash = service.rename_chat(&alice.id, &chat.id, "Taken").await;
    assert!(matches!(clash, Err(AppError::DuplicateChat(_))));

    let foreign = service.rename_chat(&bob.id, &chat.id, "Mine now").await;
    assert!(matches!(foreign, Err(AppError::Ownership(_))));

    let blank = service.rename_chat(&alice.id, &chat.id, "   ").await;
    assert!(matches!(blank, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn emails_are_unique_regardless_of_case() {
    let db = test_pool().await;
    seed_user(&db, "a@x.com").await;

    let found = UserRepository::get_by_email(&db, "A@X.COM").await.unwrap();
    assert!(found.is_some());

    let salt = krishna_gpt::crypto::generate_salt();
    let hash = krishna_gpt::crypto::hash_password("longenough1", &salt).unwrap();
    let duplicate = UserRepository::create(&db, "A@x.com", "Other", &hash, &salt, "/y.png").await;
    assert!(matches!(duplicate, Err(AppError::Validation(_))));
}
