//! Cross-module tests: the webhook-to-Discord pipeline and bot state.

mod bot_state_test;
mod relay_pipeline_test;

use crate::discord::embed::Embed;
use crate::discord::outlet::{ChannelState, DiscordOutlet, OutgoingMessage};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outlet that records what would have been posted. Every channel is a text channel.
pub(crate) struct RecordingOutlet {
    sent: Mutex<Vec<(u64, OutgoingMessage)>>,
    next_id: AtomicU64,
}

impl RecordingOutlet {
    pub(crate) fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(500),
        }
    }

    pub(crate) fn sent(&self) -> Vec<(u64, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn descriptions(&self) -> Vec<Option<String>> {
        self.sent()
            .into_iter()
            .map(|(_, m)| m.embeds.last().and_then(|e: &Embed| e.description.clone()))
            .collect()
    }
}

#[async_trait]
impl DiscordOutlet for RecordingOutlet {
    async fn channel_state(&self, _channel_id: u64) -> Result<ChannelState> {
        Ok(ChannelState::Text)
    }

    async fn send(&self, channel_id: u64, message: &OutgoingMessage) -> Result<u64> {
        self.sent.lock().unwrap().push((channel_id, message.clone()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}
