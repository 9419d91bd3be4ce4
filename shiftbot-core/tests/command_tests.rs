// File: shiftbot-core/tests/command_tests.rs

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use shiftbot_common::models::{History, InboundCommand};
use shiftbot_core::feed::FeedParser;
use shiftbot_core::repositories::MemoryHistoryStore;
use shiftbot_core::routing::RoutingTable;
use shiftbot_core::services::{ManualCommandHandler, ReconciliationEngine};
use shiftbot_core::test_utils::helpers::{rule, NotifierCall, RecordingNotifier};

struct Harness {
    handler: ManualCommandHandler,
    engine: Arc<ReconciliationEngine>,
    notifier: Arc<RecordingNotifier>,
    store: Arc<MemoryHistoryStore>,
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryHistoryStore::with_history(History::starting_at(
        Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
    )));
    let notifier = Arc::new(RecordingNotifier::new());

    let mut bl = rule("1", "10", "Borderlands");
    bl.command_channel_id = Some("99".into());
    let mut other_guild = rule("2", "20", ".*");
    other_guild.command_channel_id = Some("98".into());
    let routes = Arc::new(RoutingTable::from_rules(vec![bl, other_guild]).unwrap());

    let engine = Arc::new(
        ReconciliationEngine::start(FeedParser::new(), routes, notifier.clone(), store.clone())
            .await
            .unwrap(),
    );
    let handler = ManualCommandHandler::new(engine.clone(), notifier.clone());
    Harness {
        handler,
        engine,
        notifier,
        store,
    }
}

fn message(channel_id: &str, content: &str) -> InboundCommand {
    InboundCommand {
        channel_id: channel_id.into(),
        message_id: "5000".into(),
        author: "operator".into(),
        content: content.into(),
    }
}

#[tokio::test]
async fn test_post_with_unknown_expiry() {
    let h = harness().await;

    let reply = h
        .handler
        .handle(&message("99", r#"post "Borderlands 3" "3 Golden Keys" Universal Unknown ABCDE"#))
        .await
        .unwrap();

    assert_eq!(reply.as_deref(), Some("Posted ABCDE."));
    let embeds = h.notifier.sent_embeds().await;
    assert_eq!(embeds.len(), 1);
    assert!(embeds[0].description.contains("Expires: Unknown."));
    assert!(embeds[0].description.contains("ABCDE"));
    assert_eq!(h.notifier.sent_channels().await, vec!["10"]);
    assert!(h.store.snapshot().await.unwrap().is_announced("ABCDE"));
}

#[tokio::test]
async fn test_post_ignores_history_and_game_pattern() {
    let h = harness().await;
    let cmd = message("99", r#"post "Tiny Tina's Wonderlands" "1 Golden Key" PC 2030-01-01 REPOST"#);

    h.handler.handle(&cmd).await.unwrap();
    h.handler.handle(&cmd).await.unwrap();

    // Both go to the route owning channel 99 even though its pattern wants Borderlands.
    assert_eq!(h.notifier.sent_channels().await, vec!["10", "10"]);
    let embeds = h.notifier.sent_embeds().await;
    assert!(embeds[0].description.contains("Expires: 1 January, 2030."));
}

#[tokio::test]
async fn test_edit_existing_message() {
    let h = harness().await;
    h.handler
        .handle(&message("99", r#"post "Borderlands 3" "3 Golden Keys" Universal Unknown TYPO1"#))
        .await
        .unwrap();
    let message_id = h
        .notifier
        .calls()
        .await
        .into_iter()
        .find_map(|c| match c {
            NotifierCall::Publish(handle) => Some(handle.message_id),
            _ => None,
        })
        .expect("post should publish its message");

    let reply = h
        .handler
        .handle(&message(
            "99",
            &format!(r#"edit {message_id} "Borderlands 3" "3 Golden Keys" Universal Unknown FIXED"#),
        ))
        .await
        .unwrap();

    assert_eq!(reply, Some(format!("Edited {message_id}.")));
    let edited = h.notifier.calls().await.into_iter().any(|c| {
        matches!(c, NotifierCall::Edit { ref channel_id, ref embed, .. } if channel_id == "10" && embed.description.contains("FIXED"))
    });
    assert!(edited);
    assert!(h.engine.history().await.is_announced("FIXED"));
}

#[tokio::test]
async fn test_edit_of_missing_message() {
    let h = harness().await;
    let before = h.engine.history().await;
    let saves = h.store.save_count();

    let reply = h
        .handler
        .handle(&message("99", r#"edit 555 "Borderlands 3" "3 Golden Keys" Universal Unknown ABCDE"#))
        .await
        .unwrap();

    assert_eq!(reply.as_deref(), Some("Message 555 does not exist."));
    assert_eq!(h.notifier.texts().await, vec!["Message 555 does not exist."]);
    assert_eq!(h.engine.history().await, before);
    assert_eq!(h.store.save_count(), saves);
}

#[tokio::test]
async fn test_malformed_command_gets_usage() {
    let h = harness().await;

    let reply = h.handler.handle(&message("99", "post ABCDE")).await.unwrap().unwrap();

    assert!(reply.starts_with("Unrecognized format."), "{reply}");
    assert!(h.notifier.sent_embeds().await.is_empty());
    assert_eq!(h.notifier.texts().await, vec![reply]);
}

#[tokio::test]
async fn test_messages_outside_command_channels_are_ignored() {
    let h = harness().await;

    let reply = h
        .handler
        .handle(&message("10", r#"post "Borderlands 3" "3 Golden Keys" Universal Unknown ABCDE"#))
        .await
        .unwrap();
    assert_eq!(reply, None);

    let chatter = h.handler.handle(&message("99", "thanks for the keys")).await.unwrap();
    assert_eq!(chatter, None);
    assert!(h.notifier.calls().await.is_empty());
}
