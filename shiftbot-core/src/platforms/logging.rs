// File: shiftbot-core/src/platforms/logging.rs

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use shiftbot_common::models::{CodeEmbed, MessageHandle};
use shiftbot_common::traits::Notifier;

use crate::Error;

/// Logs what would have been sent instead of talking to Discord (`--dry-run`).
#[derive(Default)]
pub struct LoggingNotifier {
    next_id: AtomicU64,
    sent: Mutex<HashSet<(String, String)>>,
}

impl LoggingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send_embed(&self, channel_id: &str, embed: &CodeEmbed) -> Result<MessageHandle, Error> {
        let message_id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        info!("[dry-run] channel={} message={} => {}\n{}", channel_id, message_id, embed.title, embed.description);
        self.sent
            .lock()
            .await
            .insert((channel_id.to_string(), message_id.clone()));
        Ok(MessageHandle {
            channel_id: channel_id.to_string(),
            message_id,
        })
    }

    async fn edit_embed(&self, channel_id: &str, message_id: &str, embed: &CodeEmbed) -> Result<(), Error> {
        let key = (channel_id.to_string(), message_id.to_string());
        if !self.sent.lock().await.contains(&key) {
            return Err(Error::MessageNotFound(message_id.to_string()));
        }
        info!("[dry-run] edit channel={} message={} => {}", channel_id, message_id, embed.title);
        Ok(())
    }

    async fn publish(&self, message: &MessageHandle) -> Result<(), Error> {
        info!("[dry-run] publish channel={} message={}", message.channel_id, message.message_id);
        Ok(())
    }

    async fn mention_role(&self, channel_id: &str, role_id: &str) -> Result<(), Error> {
        info!("[dry-run] channel={} => <@&{}>", channel_id, role_id);
        Ok(())
    }

    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), Error> {
        info!("[dry-run] channel={} => {}", channel_id, text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn edits_only_messages_it_sent() {
        let notifier = LoggingNotifier::new();
        let embed = CodeEmbed {
            title: "t".into(),
            description: "d".into(),
            color: 0,
        };
        let handle = notifier.send_embed("10", &embed).await.unwrap();

        notifier.edit_embed("10", &handle.message_id, &embed).await.unwrap();
        assert!(matches!(
            notifier.edit_embed("20", &handle.message_id, &embed).await,
            Err(Error::MessageNotFound(_))
        ));
        assert!(matches!(
            notifier.edit_embed("10", "999", &embed).await,
            Err(Error::MessageNotFound(_))
        ));
    }
}
