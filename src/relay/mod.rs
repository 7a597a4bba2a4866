//! Relay
//!
//! Moves messages between bound WhatsApp chats and Discord channels.
//! WhatsApp messages arrive through the webhook queue and are forwarded one at
//! a time, in order; Discord messages are forwarded as the gateway delivers them.

pub mod links;
pub mod render;

use crate::bindings::BindingStore;
use crate::discord::embed::{Embed, escape_markdown};
use crate::discord::outlet::{Attachment, ChannelState, DiscordOutlet, OutgoingMessage};
use crate::error::{Error, Result};
use crate::whatsapp::{ContentKind, Media, Message, WhatsAppApi};
use links::{MessageLinks, RecentIds};
use render::{FORWARD_FOOTER, MEDIA_DOWNLOAD_FAILED, MISSING_REFERENCE, UNSUPPORTED};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Number of our own WhatsApp sends remembered to suppress their webhook echo.
const ECHO_MEMORY: usize = 512;

const UNKNOWN_SENDER: &str = "Unknown sender";

/// Capacity of the queue between the webhook receiver and the relay task.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Media larger than this many bytes is not downloaded.
    pub media_max_size: u64,
    /// Forwarded messages remembered per chat, for replies and reactions.
    pub message_limit: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            media_max_size: 10_000_000,
            message_limit: 1000,
        }
    }
}

/// A Discord message as seen by the relay.
#[derive(Debug, Clone)]
pub struct DiscordMessage {
    pub channel_id: u64,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    pub attachment_urls: Vec<String>,
}

/// Which WhatsApp message a forwarded message should reply to.
#[derive(Debug, Clone, PartialEq)]
enum ReplyTarget {
    /// Reactions: without the target the message makes no sense, so a
    /// missing link is reported in an extra embed.
    Required(String),
    /// Quotes already show the quoted text; a missing link is fine.
    Optional(String),
}

/// Channel-independent part of a forwarded message.
#[derive(Debug)]
struct Prepared {
    embeds: Vec<Embed>,
    attachment: Option<Attachment>,
    reply_target: Option<ReplyTarget>,
}

/// Embed author for a WhatsApp sender. Discord rejects empty author names,
/// so senders without a push name show their phone number.
fn author_name(message: &Message) -> String {
    let push_name = message.push_name.trim();
    if !push_name.is_empty() {
        return push_name.to_string();
    }
    let user = message
        .sender_id
        .split_once('@')
        .map_or(message.sender_id.as_str(), |(user, _)| user);
    if user.is_empty() {
        UNKNOWN_SENDER.to_string()
    } else {
        user.to_string()
    }
}

pub struct Relay {
    bindings: Arc<BindingStore>,
    whatsapp: Arc<dyn WhatsAppApi>,
    discord: Arc<dyn DiscordOutlet>,
    config: RelayConfig,
    links: Mutex<MessageLinks>,
    echoes: Mutex<RecentIds>,
}

impl Relay {
    pub fn new(
        bindings: Arc<BindingStore>,
        whatsapp: Arc<dyn WhatsAppApi>,
        discord: Arc<dyn DiscordOutlet>,
        config: RelayConfig,
    ) -> Self {
        Self {
            bindings,
            whatsapp,
            discord,
            config,
            links: Mutex::new(MessageLinks::new(config.message_limit)),
            echoes: Mutex::new(RecentIds::new(ECHO_MEMORY)),
        }
    }

    pub fn bindings(&self) -> &Arc<BindingStore> {
        &self.bindings
    }

    /// Consume WhatsApp messages from the webhook queue until it closes or
    /// `shutdown` fires.
    pub fn start(
        self: Arc<Self>,
        mut events: mpsc::Receiver<Message>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Relay task started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = events.recv() => match event {
                        Some(message) => {
                            self.forward_to_discord(&message).await;
                        }
                        None => break,
                    },
                }
            }
            tracing::info!("Relay task stopped");
        })
    }

    /// Forward a WhatsApp message to every bound channel. Returns the number
    /// of Discord messages sent.
    pub async fn forward_to_discord(&self, message: &Message) -> usize {
        let targets = {
            let bindings = self.bindings.read().await;
            if bindings.bindings_paused {
                return 0;
            }
            bindings.discord_targets(&message.chat_id)
        };
        if targets.is_empty() {
            return 0;
        }
        if matches!(message.content.kind, ContentKind::Unknown) {
            tracing::debug!("Skipping message {} with unknown content", message.id);
            return 0;
        }
        if self.echoes.lock().await.contains(&message.id) {
            tracing::debug!("Skipping echo of our own message {}", message.id);
            return 0;
        }

        let prepared = self.prepare(message).await;
        let mut delivered = 0;

        for channel_id in targets {
            match self.discord.channel_state(channel_id).await {
                Ok(ChannelState::Text) => {}
                Ok(state) => {
                    tracing::warn!(
                        "Bound channel {} is {:?}, removing its bindings",
                        channel_id,
                        state
                    );
                    if let Err(e) = self.bindings.update(|b| b.remove_channel(channel_id)).await {
                        tracing::error!("Failed to save bindings: {}", e);
                    }
                    continue;
                }
                Err(e) => {
                    tracing::error!("Could not resolve channel {}: {}", channel_id, e);
                    continue;
                }
            }

            tracing::info!(
                "Forwarding WhatsApp message from {} to channel {}",
                message.push_name,
                channel_id
            );

            let outgoing = self
                .outgoing_for(&prepared, &message.chat_id, channel_id)
                .await;
            match self.discord.send(channel_id, &outgoing).await {
                Ok(discord_id) => {
                    self.links.lock().await.record(
                        &message.chat_id,
                        &message.id,
                        channel_id,
                        discord_id,
                    );
                    delivered += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to forward to channel {}: {}", channel_id, e);
                }
            }
        }

        delivered
    }

    async fn prepare(&self, message: &Message) -> Prepared {
        let avatar = match self.whatsapp.user_avatar(&message.sender_id, true).await {
            Ok(url) if !url.is_empty() => Some(url),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("No avatar for {}: {}", message.sender_id, e);
                None
            }
        };

        let footer = if message.is_edit {
            format!("{FORWARD_FOOTER} (edited)")
        } else {
            FORWARD_FOOTER.to_string()
        };
        let base = Embed::new()
            .timestamp(message.timestamp)
            .footer(footer)
            .author(author_name(message), avatar);

        let mut embeds = Vec::new();
        let mut trailing = Vec::new();
        let mut attachment = None;
        let mut reply_target = None;

        if let Some(quote) = &message.content.quote {
            embeds.push(Embed::new().description(render::format_quote(&quote.kind)));
            reply_target = quote.id.clone().map(ReplyTarget::Optional);
        }

        let main = match &message.content.kind {
            ContentKind::Text(text) => base.description(escape_markdown(text)),
            ContentKind::Reaction { target_id, emoji } => {
                reply_target = Some(ReplyTarget::Required(target_id.clone()));
                match emoji {
                    Some(emoji) => base.title("Reaction Added").description(emoji.clone()),
                    None => base.title("Reaction Removed"),
                }
            }
            ContentKind::Media(media) => {
                let mut main = base;
                if let Some(caption) = &media.caption {
                    main = main.description(escape_markdown(caption));
                }
                match self.fetch_media(media).await {
                    Ok(data) => {
                        tracing::info!("Attaching {} B of media", data.len());
                        attachment = Some(Attachment {
                            filename: format!("media.{}", media.extension()),
                            data,
                        });
                    }
                    Err(Error::MediaTooLarge { limit }) => {
                        trailing.push(Embed::error().description(render::media_too_large(limit)));
                    }
                    Err(e) => {
                        tracing::warn!("Media download failed: {}", e);
                        trailing.push(Embed::error().description(MEDIA_DOWNLOAD_FAILED));
                    }
                }
                main
            }
            ContentKind::Poll(poll) => render::poll_embed(base, poll),
            ContentKind::Unknown => base.description(UNSUPPORTED),
        };

        embeds.push(main);
        embeds.extend(trailing);

        Prepared {
            embeds,
            attachment,
            reply_target,
        }
    }

    async fn fetch_media(&self, media: &Media) -> Result<Vec<u8>> {
        if media.length > self.config.media_max_size {
            return Err(Error::MediaTooLarge {
                limit: self.config.media_max_size,
            });
        }
        self.whatsapp.download_media(media).await
    }

    async fn outgoing_for(&self, prepared: &Prepared, chat_jid: &str, channel_id: u64) -> OutgoingMessage {
        let mut outgoing = OutgoingMessage {
            embeds: prepared.embeds.clone(),
            attachment: prepared.attachment.clone(),
            reply_to: None,
        };

        let (target, required) = match &prepared.reply_target {
            Some(ReplyTarget::Required(id)) => (id, true),
            Some(ReplyTarget::Optional(id)) => (id, false),
            None => return outgoing,
        };

        outgoing.reply_to = self.links.lock().await.get(chat_jid, target, channel_id);
        if outgoing.reply_to.is_none() && required {
            outgoing
                .embeds
                .push(Embed::error().description(MISSING_REFERENCE));
        }
        outgoing
    }

    /// Forward a Discord message to every chat bound to its channel. Returns
    /// the number of WhatsApp messages sent.
    pub async fn forward_to_whatsapp(&self, message: &DiscordMessage) -> usize {
        if message.author_is_bot {
            return 0;
        }

        let targets = {
            let bindings = self.bindings.read().await;
            if bindings.bindings_paused {
                return 0;
            }
            bindings.whatsapp_targets(message.channel_id)
        };
        if targets.is_empty() {
            return 0;
        }

        let Some(body) = render::whatsapp_text(
            &message.author_name,
            &message.content,
            &message.attachment_urls,
        ) else {
            return 0;
        };

        let mut delivered = 0;
        for chat in targets {
            tracing::info!(
                "Forwarding Discord message from {} to WhatsApp chat {}",
                message.author_name,
                chat
            );
            match self.whatsapp.send_text(&chat, &body).await {
                Ok(id) => {
                    self.echoes.lock().await.insert(id);
                    delivered += 1;
                }
                Err(e) => tracing::error!("Failed to forward to WhatsApp chat {}: {}", chat, e),
            }
        }
        delivered
    }
}
