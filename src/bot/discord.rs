//! Discord transport: a `MessagingGateway` over serenity and the poise event loop.
//!
//! Targets are encoded as `user:<id>` for direct messages and `channel:<id>` for
//! guild channels. Guild channels play the role of groups, so a channel id is
//! also the venue id of a trade.

use crate::{
    bot::{
        BotData,
        gateway::{
            BlobStore, Chat, ContactRef, GroupRef, Identity, InboundMessage, MessageBody,
            MessagingGateway,
        },
        router::ConversationRouter,
    },
    config::app::AppConfig,
    errors::{Error, Result},
};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

const USER_PREFIX: &str = "user:";
const CHANNEL_PREFIX: &str = "channel:";
const TRANSFER_MARKER: &str = "<wcpayinfo>";

/// Decoded message target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Direct message to a user
    User(serenity::UserId),
    /// Guild channel
    Channel(serenity::ChannelId),
}

impl Target {
    /// Parses a `user:<id>` or `channel:<id>` target.
    ///
    /// # Errors
    /// Returns `Error::Gateway` for any other shape.
    pub fn parse(target: &str) -> Result<Self> {
        let invalid = || Error::Gateway {
            message: format!("invalid message target {target:?}"),
        };
        let parse_id = |raw: &str| raw.parse::<u64>().ok().filter(|id| *id != 0);

        if let Some(raw) = target.strip_prefix(USER_PREFIX) {
            let id = parse_id(raw).ok_or_else(invalid)?;
            return Ok(Self::User(serenity::UserId::new(id)));
        }
        if let Some(raw) = target.strip_prefix(CHANNEL_PREFIX) {
            let id = parse_id(raw).ok_or_else(invalid)?;
            return Ok(Self::Channel(serenity::ChannelId::new(id)));
        }
        Err(invalid())
    }
}

/// Encodes a direct-message target.
#[must_use]
pub fn user_target(id: serenity::UserId) -> String {
    format!("{USER_PREFIX}{id}")
}

/// Encodes a channel target.
#[must_use]
pub fn channel_target(id: serenity::ChannelId) -> String {
    format!("{CHANNEL_PREFIX}{id}")
}

/// Gateway backed by the serenity HTTP client and cache.
pub struct DiscordGateway {
    http: Arc<serenity::Http>,
    cache: Arc<serenity::Cache>,
}

impl DiscordGateway {
    /// Wraps the client's HTTP handle and cache.
    #[must_use]
    pub const fn new(http: Arc<serenity::Http>, cache: Arc<serenity::Cache>) -> Self {
        Self { http, cache }
    }

    async fn send(&self, target: &str, builder: serenity::CreateMessage) -> Result<()> {
        match Target::parse(target)? {
            Target::User(user) => {
                user.direct_message(&self.http, builder).await?;
            }
            Target::Channel(channel) => {
                channel.send_message(&self.http, builder).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingGateway for DiscordGateway {
    async fn send_text(&self, target: &str, text: &str) -> Result<()> {
        self.send(target, serenity::CreateMessage::new().content(text))
            .await
    }

    async fn send_image(&self, target: &str, image: &[u8]) -> Result<()> {
        let attachment = serenity::CreateAttachment::bytes(image.to_vec(), "image.jpg");
        self.send(target, serenity::CreateMessage::new().add_file(attachment))
            .await
    }

    async fn list_groups(&self) -> Result<Vec<GroupRef>> {
        let me = self.cache.current_user().id;
        let mut groups = Vec::new();
        for guild_id in self.cache.guilds() {
            let Some(guild) = self.cache.guild(guild_id) else {
                continue;
            };
            if guild.owner_id != me {
                continue;
            }
            groups.extend(
                guild
                    .channels
                    .values()
                    .filter(|channel| channel.kind == serenity::ChannelType::Text)
                    .map(|channel| GroupRef {
                        id: channel_target(channel.id),
                        name: channel.name.clone(),
                    }),
            );
        }
        Ok(groups)
    }

    async fn list_contacts(&self) -> Result<Vec<ContactRef>> {
        let mut contacts = Vec::new();
        for guild_id in self.cache.guilds() {
            let Some(guild) = self.cache.guild(guild_id) else {
                continue;
            };
            contacts.extend(guild.members.values().map(|member| ContactRef {
                id: user_target(member.user.id),
                nickname: member.user.name.clone(),
            }));
        }
        contacts.sort_by(|a, b| a.id.cmp(&b.id));
        contacts.dedup_by(|a, b| a.id == b.id);
        Ok(contacts)
    }
}

/// Converts a Discord message into the transport-neutral shape.
///
/// Only `trusted_payer` messages may be payment notifications.
async fn to_inbound(message: &serenity::Message, trusted_payer: bool) -> Option<InboundMessage> {
    let chat = if message.guild_id.is_some() {
        Chat::Group {
            group_id: channel_target(message.channel_id),
        }
    } else {
        Chat::Private
    };
    let sender = Identity {
        id: user_target(message.author.id),
        nickname: message.author.name.clone(),
    };

    let image = message.attachments.iter().find(|attachment| {
        attachment
            .content_type
            .as_deref()
            .is_some_and(|kind| kind.starts_with("image/"))
    });

    let body = if let Some(attachment) = image {
        match attachment.download().await {
            Ok(bytes) => MessageBody::Image(bytes),
            Err(e) => {
                warn!("Failed to download attachment {}: {e}", attachment.filename);
                return None;
            }
        }
    } else {
        text_body(&message.content, trusted_payer)?
    };

    Some(InboundMessage { chat, sender, body })
}

/// Classifies message text. Empty text is dropped.
fn text_body(content: &str, trusted_payer: bool) -> Option<MessageBody> {
    if content.trim().is_empty() {
        return None;
    }
    if content.contains(TRANSFER_MARKER) {
        if trusted_payer {
            return Some(MessageBody::Transfer(content.to_string()));
        }
        warn!("Payment payload from an untrusted account treated as text");
    }
    Some(MessageBody::Text(content.to_string()))
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, Error>,
    data: &BotData,
) -> Result<()> {
    if let serenity::FullEvent::Message { new_message } = event {
        let author = &new_message.author;
        if author.id == ctx.cache.current_user().id {
            return Ok(());
        }
        let trusted_payer = data.router.config().is_payment_notifier(author.id.get());
        if author.bot && !trusted_payer {
            return Ok(());
        }
        let Some(inbound) = to_inbound(new_message, trusted_payer).await else {
            return Ok(());
        };
        debug!("Routing message {} from {}", new_message.id, inbound.sender.nickname);

        let router = data.router.clone();
        tokio::spawn(async move { router.handle(&inbound).await });
    }
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {error}");
        }
        poise::FrameworkError::EventHandler { error, .. } => {
            error!("Error in event handler: {error}");
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Connects to Discord and routes every incoming message until the client stops.
///
/// # Errors
/// Returns an error if the client cannot be created or the connection fails.
#[instrument(skip_all)]
pub async fn run_bot(
    token: String,
    database: DatabaseConnection,
    blobs: Arc<dyn BlobStore>,
    config: Arc<AppConfig>,
) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, _framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                let gateway = Arc::new(DiscordGateway::new(
                    Arc::clone(&ctx.http),
                    Arc::clone(&ctx.cache),
                ));
                let router = ConversationRouter::new(database, gateway, blobs, config);
                Ok(BotData::new(router))
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    info!("Setting up Serenity client...");
    let mut client = serenity::Client::builder(&token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot client...");
    client.start().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_target_round_trip() {
        let user = serenity::UserId::new(42);
        let channel = serenity::ChannelId::new(7);

        assert_eq!(Target::parse(&user_target(user)).unwrap(), Target::User(user));
        assert_eq!(
            Target::parse(&channel_target(channel)).unwrap(),
            Target::Channel(channel)
        );
    }

    #[test]
    fn test_payment_payload_requires_trusted_author() {
        let payload = "<msg><appmsg><wcpayinfo><feedesc>￥50</feedesc></wcpayinfo></appmsg></msg>";

        assert_eq!(
            text_body(payload, true),
            Some(MessageBody::Transfer(payload.to_string()))
        );
        assert_eq!(
            text_body(payload, false),
            Some(MessageBody::Text(payload.to_string()))
        );
        assert_eq!(
            text_body("帮助", true),
            Some(MessageBody::Text("帮助".to_string()))
        );
        assert_eq!(text_body("  ", false), None);
    }

    #[test]
    fn test_invalid_targets() {
        for target in ["42", "user:", "user:abc", "channel:0", "group:1"] {
            assert!(matches!(
                Target::parse(target).unwrap_err(),
                Error::Gateway { .. }
            ));
        }
    }
}
