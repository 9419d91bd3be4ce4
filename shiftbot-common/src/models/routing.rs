use serde::{Deserialize, Serialize};

pub const DEFAULT_EMBED_EMOJI: &str = "<:GoldenKey:273763771929853962>";
pub const MATCH_ALL_PATTERN: &str = ".*";

fn default_game_pattern() -> String {
    MATCH_ALL_PATTERN.to_string()
}

fn default_embed_emoji() -> String {
    DEFAULT_EMBED_EMOJI.to_string()
}

/// One destination's configuration, as read from the routes file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingRule {
    /// Guild (server) the destination belongs to.
    pub destination_id: String,
    /// Channel announcements are posted to.
    pub news_channel_id: String,
    /// Channel manual `post` / `edit` commands for this destination come from.
    #[serde(default)]
    pub command_channel_id: Option<String>,
    /// Regex searched (not full-matched) against a code's `game`.
    #[serde(default = "default_game_pattern")]
    pub game_pattern: String,
    /// Role mentioned after each announcement.
    #[serde(default)]
    pub announce_role_id: Option<String>,
    #[serde(default = "default_embed_emoji")]
    pub embed_emoji: String,
}

impl RoutingRule {
    pub fn accepts_commands_from(&self, channel_id: &str) -> bool {
        self.command_channel_id.as_deref() == Some(channel_id)
    }
}
