use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_gateway::{
    self as gateway,
    CloseFrame,
    Config,
    Event,
    EventTypeFlags,
    Intents,
    Shard,
    MessageSender,
    StreamExt,
};
use twilight_http::Client as HttpClient;
use twilight_http::client::ClientBuilder;
use twilight_http::error::ErrorType;
use twilight_model::channel::message::Embed;
use twilight_model::id::marker::{ChannelMarker, MessageMarker};
use twilight_model::id::Id;
use twilight_util::builder::embed::EmbedBuilder;

use shiftbot_common::models::{CodeEmbed, InboundCommand, MessageHandle};
use shiftbot_common::traits::Notifier;

use crate::Error;
use crate::platforms::{ConnectionStatus, PlatformIntegration};

/// Reads gateway events for one shard and forwards messages posted in a
/// command channel to `tx`.
async fn shard_runner(
    mut shard: Shard,
    tx: UnboundedSender<InboundCommand>,
    command_channels: Arc<HashSet<String>>,
) {
    let shard_id = shard.id().number();
    info!("(ShardRunner) Shard {shard_id} started. Listening for events.");

    while let Some(item) = shard.next_event(EventTypeFlags::READY | EventTypeFlags::MESSAGE_CREATE).await {
        match item {
            Ok(Event::Ready(ready)) => {
                info!("Shard {shard_id} => READY as {} (ID={})", ready.user.name, ready.user.id);
            }
            Ok(Event::MessageCreate(msg)) => {
                if msg.author.bot {
                    debug!("Ignoring bot message from {}", msg.author.name);
                    continue;
                }
                let channel_id = msg.channel_id.to_string();
                if !command_channels.contains(&channel_id) {
                    continue;
                }

                let cmd = InboundCommand {
                    channel_id,
                    message_id: msg.id.to_string(),
                    author: msg.author.name.clone(),
                    content: msg.content.clone(),
                };
                if tx.send(cmd).is_err() {
                    warn!("Shard {shard_id} => command receiver dropped, stopping.");
                    break;
                }
            }
            Ok(other) => {
                trace!("Shard {shard_id} => unhandled event: {:?}", other.kind());
            }
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
            }
        }
    }

    warn!("(ShardRunner) Shard {shard_id} event loop ended.");
}

fn parse_channel_id(raw: &str) -> Result<Id<ChannelMarker>, Error> {
    raw.parse::<u64>()
        .ok()
        .and_then(Id::new_checked)
        .ok_or_else(|| Error::Platform(format!("Invalid channel ID: {raw}")))
}

fn parse_message_id(raw: &str) -> Result<Id<MessageMarker>, Error> {
    raw.parse::<u64>()
        .ok()
        .and_then(Id::new_checked)
        .ok_or_else(|| Error::Platform(format!("Invalid message ID: {raw}")))
}

fn build_embed(embed: &CodeEmbed) -> Result<Embed, Error> {
    let built = EmbedBuilder::new()
        .title(embed.title.as_str())
        .description(embed.description.as_str())
        .color(embed.color)
        .validate()
        .map_err(|e| Error::Platform(format!("Invalid embed: {e}")))?
        .build();
    Ok(built)
}

fn is_not_found(err: &twilight_http::Error) -> bool {
    matches!(err.kind(), ErrorType::Response { status, .. } if status.get() == 404)
}

/// Discord connection: outbound `Notifier` primitives over twilight-http and
/// inbound command messages over the gateway.
pub struct DiscordPlatform {
    pub token: String,
    pub connection_status: ConnectionStatus,

    /// Command channels worth forwarding. Everything else is dropped at the shard.
    command_channels: Arc<HashSet<String>>,

    /// Filled in by `connect`.
    pub rx: Mutex<Option<UnboundedReceiver<InboundCommand>>>,

    pub shard_tasks: Vec<JoinHandle<()>>,
    pub shard_senders: Vec<MessageSender>,

    http: Arc<HttpClient>,
}

impl DiscordPlatform {
    pub fn new(token: String, command_channels: HashSet<String>) -> Self {
        let http = Arc::new(
            ClientBuilder::new()
                .token(token.clone())
                .timeout(Duration::from_secs(30))
                .build(),
        );
        Self {
            token,
            connection_status: ConnectionStatus::Disconnected,
            command_channels: Arc::new(command_channels),
            rx: Mutex::new(None),
            shard_tasks: Vec::new(),
            shard_senders: Vec::new(),
            http,
        }
    }

    /// A cheap handle for sending; usable while `self` is owned elsewhere.
    pub fn notifier(&self) -> DiscordNotifier {
        DiscordNotifier {
            http: Arc::clone(&self.http),
        }
    }

    /// Hands the inbound command stream to the caller. Only the first call
    /// after `connect` gets it.
    pub async fn take_commands(&self) -> Option<UnboundedReceiver<InboundCommand>> {
        self.rx.lock().await.take()
    }
}

#[async_trait]
impl PlatformIntegration for DiscordPlatform {
    async fn connect(&mut self) -> Result<(), Error> {
        if matches!(self.connection_status, ConnectionStatus::Connected) {
            info!("(DiscordPlatform) Already connected => skipping");
            return Ok(());
        }
        if self.token.is_empty() {
            return Err(Error::ConfigInvalid("Discord token is empty".into()));
        }

        let (tx, rx) = unbounded_channel::<InboundCommand>();
        {
            let mut guard = self.rx.lock().await;
            *guard = Some(rx);
        }

        let config = Config::new(
            self.token.clone(),
            Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT,
        );

        let http = Arc::clone(&self.http);
        let shards = match gateway::create_recommended(&http, config, |_, b| b.build()).await {
            Ok(shards) => shards,
            Err(e) => {
                self.connection_status = ConnectionStatus::Error(e.to_string());
                return Err(Error::Platform(format!("create_recommended error: {e}")));
            }
        };

        for shard in shards {
            self.shard_senders.push(shard.sender());

            let tx_for_shard = tx.clone();
            let channels_for_shard = Arc::clone(&self.command_channels);
            let handle = tokio::spawn(async move {
                shard_runner(shard, tx_for_shard, channels_for_shard).await;
            });
            self.shard_tasks.push(handle);
        }

        self.connection_status = ConnectionStatus::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        self.connection_status = ConnectionStatus::Disconnected;

        for sender in &self.shard_senders {
            let _ = sender.close(CloseFrame::NORMAL);
        }
        for task in &mut self.shard_tasks {
            let _ = task.await;
        }

        self.shard_senders.clear();
        self.shard_tasks.clear();

        {
            let mut guard = self.rx.lock().await;
            *guard = None;
        }

        Ok(())
    }

    async fn get_connection_status(&self) -> Result<ConnectionStatus, Error> {
        Ok(self.connection_status.clone())
    }
}

#[derive(Clone)]
pub struct DiscordNotifier {
    http: Arc<HttpClient>,
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send_embed(&self, channel_id: &str, embed: &CodeEmbed) -> Result<MessageHandle, Error> {
        let channel = parse_channel_id(channel_id)?;
        let embed = build_embed(embed)?;

        let message = self
            .http
            .create_message(channel)
            .embeds(&[embed])
            .await
            .map_err(|e| Error::Platform(format!("Error sending Discord embed: {e:?}")))?
            .model()
            .await
            .map_err(|e| Error::Platform(format!("Error reading sent message: {e:?}")))?;

        Ok(MessageHandle {
            channel_id: channel_id.to_string(),
            message_id: message.id.to_string(),
        })
    }

    async fn edit_embed(&self, channel_id: &str, message_id: &str, embed: &CodeEmbed) -> Result<(), Error> {
        let channel = parse_channel_id(channel_id)?;
        // No message can carry an id that does not parse.
        let message = parse_message_id(message_id).map_err(|_| Error::MessageNotFound(message_id.to_string()))?;
        let embed = build_embed(embed)?;

        match self.http.update_message(channel, message).embeds(Some(&[embed])).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Err(Error::MessageNotFound(message_id.to_string())),
            Err(e) => Err(Error::Platform(format!("Error editing Discord message: {e:?}"))),
        }
    }

    async fn publish(&self, handle: &MessageHandle) -> Result<(), Error> {
        let channel = parse_channel_id(&handle.channel_id)?;
        let message = parse_message_id(&handle.message_id)?;
        self.http
            .crosspost_message(channel, message)
            .await
            .map_err(|e| Error::Platform(format!("Error crossposting message: {e:?}")))?;
        Ok(())
    }

    async fn mention_role(&self, channel_id: &str, role_id: &str) -> Result<(), Error> {
        self.send_text(channel_id, &format!("<@&{role_id}>")).await
    }

    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), Error> {
        let channel = parse_channel_id(channel_id)?;
        self.http
            .create_message(channel)
            .content(text)
            .await
            .map_err(|e| Error::Platform(format!("Error sending Discord message: {e:?}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_id_is_a_platform_error() {
        assert_eq!(parse_message_id("1234").unwrap().get(), 1234);
        assert!(matches!(parse_message_id("abc"), Err(Error::Platform(_))));
        assert!(matches!(parse_message_id("0"), Err(Error::Platform(_))));
    }

    #[tokio::test]
    async fn publish_with_malformed_id_is_not_message_not_found() {
        let notifier = DiscordPlatform::new("token".into(), HashSet::new()).notifier();
        let handle = MessageHandle {
            channel_id: "10".into(),
            message_id: "not-an-id".into(),
        };
        assert!(matches!(notifier.publish(&handle).await, Err(Error::Platform(_))));
    }

    #[tokio::test]
    async fn edit_with_malformed_id_is_message_not_found() {
        let notifier = DiscordPlatform::new("token".into(), HashSet::new()).notifier();
        let embed = CodeEmbed {
            title: "t".into(),
            description: "d".into(),
            color: 0,
        };
        assert!(matches!(
            notifier.edit_embed("10", "not-an-id", &embed).await,
            Err(Error::MessageNotFound(ref id)) if id == "not-an-id"
        ));
    }
}
