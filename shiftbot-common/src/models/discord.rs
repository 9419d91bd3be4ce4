// File: shiftbot-common/src/models/discord.rs

/// Platform-neutral description of a code announcement. The Discord runtime
/// turns this into a real embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeEmbed {
    pub title: String,
    pub description: String,
    pub color: u32,
}

/// Where a sent message lives, so it can be published or edited later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub channel_id: String,
    pub message_id: String,
}

/// A chat message that may carry a manual `post` / `edit` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    pub channel_id: String,
    pub message_id: String,
    pub author: String,
    pub content: String,
}
