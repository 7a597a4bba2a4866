//! Discord side of the bridge: gateway client, slash commands and the
//! outlet the relay posts through.

pub mod bot;
pub mod commands;
pub mod embed;
pub mod handler;
pub mod outlet;
pub mod paginator;

pub use bot::DiscordBot;
pub use outlet::{DiscordOutlet, SerenityOutlet};

use crate::relay::Relay;
use crate::whatsapp::WuzapiClient;
use chrono::{DateTime, Utc};
use paginator::PagerRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// State shared by the event handler and every command.
pub struct BotState {
    pub relay: Arc<Relay>,
    pub whatsapp: Arc<WuzapiClient>,
    /// Users allowed to run privileged commands. `None` lets everyone in.
    admins: RwLock<Option<HashSet<u64>>>,
    pub started_at: DateTime<Utc>,
    pub pagers: PagerRegistry,
    pub shutdown: CancellationToken,
    /// Guild commands are registered in; global registration when unset.
    pub sync_guild: Option<u64>,
    pub test_commands: bool,
}

impl BotState {
    pub fn new(
        relay: Arc<Relay>,
        whatsapp: Arc<WuzapiClient>,
        admins: Option<HashSet<u64>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            relay,
            whatsapp,
            admins: RwLock::new(admins),
            started_at: Utc::now(),
            pagers: PagerRegistry::default(),
            shutdown,
            sync_guild: None,
            test_commands: false,
        }
    }

    pub fn with_sync_guild(mut self, guild: Option<u64>) -> Self {
        self.sync_guild = guild;
        self
    }

    pub fn with_test_commands(mut self, enabled: bool) -> Self {
        self.test_commands = enabled;
        self
    }

    pub async fn is_admin(&self, user_id: u64) -> bool {
        self.admins
            .read()
            .await
            .as_ref()
            .is_none_or(|admins| admins.contains(&user_id))
    }

    /// Grant admin rights. No-op when everyone is already an admin.
    pub async fn add_admin(&self, user_id: u64) {
        if let Some(admins) = self.admins.write().await.as_mut()
            && admins.insert(user_id)
        {
            tracing::info!("Discord: user {} added to admins", user_id);
        }
    }
}
