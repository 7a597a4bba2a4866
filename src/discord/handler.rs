//! Discord Message Handler
//!
//! Turns gateway messages from bound channels into relay input.

use crate::relay::{DiscordMessage, Relay};
use serenity::model::channel::Message;

/// Discord's limit on the length of a plain message.
pub const MESSAGE_LIMIT: usize = 2000;

/// Split a message into chunks that fit Discord's 2000 char limit.
pub fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .filter(|&pos| pos + 200 > end - start)
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }
    chunks
}

/// Relay input for a gateway message. Direct messages have no bindings and
/// yield `None`.
pub fn relay_message(msg: &Message) -> Option<DiscordMessage> {
    msg.guild_id?;

    let author_name = msg
        .member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .or_else(|| msg.author.global_name.clone())
        .unwrap_or_else(|| msg.author.name.clone());

    Some(DiscordMessage {
        channel_id: msg.channel_id.get(),
        author_name,
        author_is_bot: msg.author.bot,
        content: msg.content.clone(),
        attachment_urls: msg.attachments.iter().map(|a| a.url.clone()).collect(),
    })
}

pub(crate) async fn handle_message(msg: &Message, relay: &Relay) {
    if msg.author.bot {
        return;
    }
    let Some(message) = relay_message(msg) else {
        tracing::debug!("Discord: ignoring direct message from {}", msg.author.name);
        return;
    };

    let sent = relay.forward_to_whatsapp(&message).await;
    if sent > 0 {
        tracing::debug!(
            "Discord: message {} forwarded to {} chat(s)",
            msg.id,
            sent
        );
    }
}
