//! WhatsApp Integration
//!
//! Talks to a WuzAPI server: a REST client for outgoing calls and a webhook
//! receiver for the events WuzAPI pushes to us.

mod client;
pub mod content;
pub mod types;
pub mod webhook;

pub use client::{SessionStatus, WuzapiClient};
pub use content::{Content, ContentKind, Media, MediaKind, Poll, Quote};
pub use types::{Group, Message, User, user_jid};

use crate::error::Result;
use async_trait::async_trait;

/// The WhatsApp operations the relay depends on.
#[async_trait]
pub trait WhatsAppApi: Send + Sync {
    async fn user_avatar(&self, jid: &str, preview: bool) -> Result<String>;

    async fn download_media(&self, media: &Media) -> Result<Vec<u8>>;

    /// Send a text message and return the new WhatsApp message id.
    async fn send_text(&self, chat_jid: &str, body: &str) -> Result<String>;
}
