//! Discord Outlet
//!
//! The Discord operations the relay needs, behind a trait so forwarding can
//! be tested without a bot token. [`SerenityOutlet`] is the real thing.

use super::embed::Embed;
use crate::error::Result;
use async_trait::async_trait;
use serenity::builder::{CreateAttachment, CreateMessage};
use serenity::http::{Http, HttpError};
use serenity::model::channel::{Channel, ChannelType, MessageReference};
use serenity::model::id::{ChannelId, MessageId};
use std::sync::Arc;

/// A file uploaded alongside a message.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
}

/// A message to post into a channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    pub embeds: Vec<Embed>,
    pub attachment: Option<Attachment>,
    /// Discord message id this message replies to.
    pub reply_to: Option<u64>,
}

/// What a bound channel id currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Text,
    NotText,
    Missing,
}

#[async_trait]
pub trait DiscordOutlet: Send + Sync {
    async fn channel_state(&self, channel_id: u64) -> Result<ChannelState>;

    /// Post `message`, returning the id of the created Discord message.
    async fn send(&self, channel_id: u64, message: &OutgoingMessage) -> Result<u64>;
}

/// 404 means the target is gone; 403 means the bot lost access to it, as
/// happens after it is removed from the guild.
fn is_unreachable_status(status: u16) -> bool {
    matches!(status, 403 | 404)
}

/// Whether a REST call failed because the bot cannot reach the target.
pub(crate) fn is_unreachable(error: &serenity::Error) -> bool {
    matches!(
        error,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
            if is_unreachable_status(response.status_code.as_u16())
    )
}

/// [`DiscordOutlet`] over serenity's REST client.
pub struct SerenityOutlet {
    http: Arc<Http>,
}

impl SerenityOutlet {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DiscordOutlet for SerenityOutlet {
    async fn channel_state(&self, channel_id: u64) -> Result<ChannelState> {
        match self.http.get_channel(ChannelId::new(channel_id)).await {
            Ok(Channel::Guild(channel))
                if matches!(channel.kind, ChannelType::Text | ChannelType::News) =>
            {
                Ok(ChannelState::Text)
            }
            Ok(_) => Ok(ChannelState::NotText),
            Err(e) if is_unreachable(&e) => Ok(ChannelState::Missing),
            Err(e) => Err(e.into()),
        }
    }

    async fn send(&self, channel_id: u64, message: &OutgoingMessage) -> Result<u64> {
        let channel = ChannelId::new(channel_id);

        let mut builder =
            CreateMessage::new().embeds(message.embeds.iter().map(Embed::to_create).collect());
        if let Some(attachment) = &message.attachment {
            builder = builder.add_file(CreateAttachment::bytes(
                attachment.data.clone(),
                attachment.filename.clone(),
            ));
        }
        if let Some(reply_to) = message.reply_to {
            builder =
                builder.reference_message(MessageReference::from((channel, MessageId::new(reply_to))));
        }

        let sent = channel.send_message(self.http.as_ref(), builder).await?;
        Ok(sent.id.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(404, true)]
    #[case(403, true)]
    #[case(401, false)]
    #[case(429, false)]
    #[case(500, false)]
    fn test_unreachable_status(#[case] status: u16, #[case] expected: bool) {
        assert_eq!(is_unreachable_status(status), expected);
    }
}
