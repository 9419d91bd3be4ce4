// File: shiftbot-core/src/test_utils/helpers.rs

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use shiftbot_common::models::{CodeEmbed, History, MessageHandle, RoutingRule};
use shiftbot_common::traits::{FeedSource, HistoryRepository, Notifier};

use crate::Error;

/// Everything a `RecordingNotifier` was asked to do, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Send { channel_id: String, embed: CodeEmbed },
    Edit { channel_id: String, message_id: String, embed: CodeEmbed },
    Publish(MessageHandle),
    Mention { channel_id: String, role_id: String },
    Text { channel_id: String, text: String },
}

/// In-memory `Notifier` that records calls.
///
/// Sends and edits in a channel listed in `fail_channels` return
/// `Error::Platform`.
/// Edits succeed only for messages this notifier sent itself.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
    sent: Mutex<HashSet<(String, String)>>,
    fail_channels: Mutex<HashSet<String>>,
    next_id: AtomicU64,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_channel(&self, channel_id: &str) {
        self.fail_channels.lock().await.insert(channel_id.to_string());
    }

    pub async fn heal_channel(&self, channel_id: &str) {
        self.fail_channels.lock().await.remove(channel_id);
    }

    pub async fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().await.clone()
    }

    /// Channel ids of successful `send_embed` calls, in order.
    pub async fn sent_channels(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                NotifierCall::Send { channel_id, .. } => Some(channel_id.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn sent_embeds(&self) -> Vec<CodeEmbed> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                NotifierCall::Send { embed, .. } => Some(embed.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                NotifierCall::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    async fn check_channel(&self, channel_id: &str) -> Result<(), Error> {
        if self.fail_channels.lock().await.contains(channel_id) {
            return Err(Error::Platform(format!("channel {channel_id} is unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_embed(&self, channel_id: &str, embed: &CodeEmbed) -> Result<MessageHandle, Error> {
        self.check_channel(channel_id).await?;
        let message_id = (1000 + self.next_id.fetch_add(1, Ordering::SeqCst)).to_string();
        self.sent
            .lock()
            .await
            .insert((channel_id.to_string(), message_id.clone()));
        self.calls.lock().await.push(NotifierCall::Send {
            channel_id: channel_id.to_string(),
            embed: embed.clone(),
        });
        Ok(MessageHandle {
            channel_id: channel_id.to_string(),
            message_id,
        })
    }

    async fn edit_embed(&self, channel_id: &str, message_id: &str, embed: &CodeEmbed) -> Result<(), Error> {
        self.check_channel(channel_id).await?;
        let key = (channel_id.to_string(), message_id.to_string());
        if !self.sent.lock().await.contains(&key) {
            return Err(Error::MessageNotFound(message_id.to_string()));
        }
        self.calls.lock().await.push(NotifierCall::Edit {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            embed: embed.clone(),
        });
        Ok(())
    }

    async fn publish(&self, message: &MessageHandle) -> Result<(), Error> {
        self.calls.lock().await.push(NotifierCall::Publish(message.clone()));
        Ok(())
    }

    async fn mention_role(&self, channel_id: &str, role_id: &str) -> Result<(), Error> {
        self.calls.lock().await.push(NotifierCall::Mention {
            channel_id: channel_id.to_string(),
            role_id: role_id.to_string(),
        });
        Ok(())
    }

    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), Error> {
        self.calls.lock().await.push(NotifierCall::Text {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Feed source that replays queued responses, then repeats the last one.
pub struct ScriptedFeedSource {
    script: Mutex<VecDeque<Result<Vec<u8>, String>>>,
    last: Mutex<Option<Result<Vec<u8>, String>>>,
    fetches: AtomicU64,
}

impl ScriptedFeedSource {
    /// `Err(reason)` entries come back as `Error::FeedUnavailable(reason)`.
    pub fn new(script: Vec<Result<Vec<u8>, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            fetches: AtomicU64::new(0),
        }
    }

    pub fn always(body: Vec<u8>) -> Self {
        Self::new(vec![Ok(body)])
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for ScriptedFeedSource {
    async fn fetch(&self) -> Result<Vec<u8>, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().await.pop_front();
        let mut last = self.last.lock().await;
        if let Some(next) = next {
            *last = Some(next);
        }
        match last.clone() {
            Some(Ok(body)) => Ok(body),
            Some(Err(reason)) => Err(Error::FeedUnavailable(reason)),
            None => Err(Error::FeedUnavailable("empty script".into())),
        }
    }
}

/// A store whose writes always fail.
pub struct FailingHistoryStore {
    history: History,
}

impl FailingHistoryStore {
    pub fn new(history: History) -> Self {
        Self { history }
    }
}

#[async_trait]
impl HistoryRepository for FailingHistoryStore {
    async fn load(&self) -> Result<History, Error> {
        Ok(self.history.clone())
    }

    async fn save(&self, _history: &History) -> Result<(), Error> {
        Err(Error::PersistFailed("disk full".into()))
    }
}

/// A route with every optional field at its default.
pub fn rule(destination_id: &str, news_channel_id: &str, game_pattern: &str) -> RoutingRule {
    RoutingRule {
        destination_id: destination_id.to_string(),
        news_channel_id: news_channel_id.to_string(),
        command_channel_id: None,
        game_pattern: game_pattern.to_string(),
        announce_role_id: None,
        embed_emoji: shiftbot_common::models::routing::DEFAULT_EMBED_EMOJI.to_string(),
    }
}

/// One feed record. `expires: None` is written as `Unknown`.
pub fn code_json(code: &str, game: &str, added: DateTime<Utc>, expires: Option<DateTime<Utc>>) -> Value {
    json!({
        "code": code,
        "game": game,
        "platform": "Universal",
        "reward": "3 Golden Keys",
        "archived": added.to_rfc2822(),
        "expires": expires.map(|e| e.to_rfc2822()).unwrap_or_else(|| "Unknown".to_string()),
        "link": "https://shift.orcicorn.com/",
    })
}

/// A complete feed body with the given version and records.
pub fn feed_json_with_version(version: &str, codes: Vec<Value>) -> Vec<u8> {
    json!([{
        "meta": {
            "version": version,
            "description": "SHiFT codes",
            "attribution": "Data provided by https://shift.orcicorn.com",
            "permalink": "https://shift.orcicorn.com/index.json",
            "generated": { "epoch": "1603000000", "human": "Sun, 18 Oct 2020 05:46:40 +0000" },
        },
        "codes": codes,
    }])
    .to_string()
    .into_bytes()
}

pub fn feed_json(codes: Vec<Value>) -> Vec<u8> {
    feed_json_with_version(shiftbot_common::models::EXPECTED_FEED_VERSION, codes)
}
