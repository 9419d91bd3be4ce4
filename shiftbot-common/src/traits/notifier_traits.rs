use async_trait::async_trait;

use crate::error::Error;
use crate::models::{CodeEmbed, MessageHandle};

/// Outbound primitives of the chat platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_embed(&self, channel_id: &str, embed: &CodeEmbed) -> Result<MessageHandle, Error>;

    /// Replaces the embed of an existing message. A message that no longer
    /// exists yields `Error::MessageNotFound`.
    async fn edit_embed(&self, channel_id: &str, message_id: &str, embed: &CodeEmbed) -> Result<(), Error>;

    /// Publishes (crossposts) a message to followers of an announcement channel.
    async fn publish(&self, message: &MessageHandle) -> Result<(), Error>;

    /// Pings everyone holding `role_id` in `channel_id`.
    async fn mention_role(&self, channel_id: &str, role_id: &str) -> Result<(), Error>;

    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), Error>;
}
