//! Discord Bot
//!
//! Gateway client and startup logic. The client is rebuilt with backoff when
//! the gateway connection fails, unless reconnecting is disabled.

use super::BotState;
use super::commands;
use super::handler;
use std::sync::Arc;
use std::time::Duration;

use serenity::all::{Command, GuildId, Interaction};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Discord bot bridging bound channels to WhatsApp and serving the slash commands.
pub struct DiscordBot {
    state: Arc<BotState>,
    reconnect: bool,
}

impl DiscordBot {
    pub fn new(state: Arc<BotState>, reconnect: bool) -> Self {
        Self { state, reconnect }
    }

    /// Start the bot as a background task. Returns a JoinHandle.
    ///
    /// The task ends when the shutdown token is cancelled. A client that
    /// cannot be built, or a gateway failure with reconnecting disabled,
    /// cancels the token itself so the rest of the process stops too.
    pub fn start(self, token: String) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let shutdown = self.state.shutdown.clone();
            let mut backoff = INITIAL_BACKOFF;

            loop {
                let intents = GatewayIntents::GUILDS
                    | GatewayIntents::GUILD_MESSAGES
                    | GatewayIntents::MESSAGE_CONTENT;

                let event_handler = Handler {
                    state: self.state.clone(),
                };
                let mut client = match Client::builder(&token, intents)
                    .event_handler(event_handler)
                    .await
                {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!("Discord: failed to create client: {}", e);
                        shutdown.cancel();
                        return;
                    }
                };

                let shard_manager = client.shard_manager.clone();
                let result = tokio::select! {
                    result = client.start() => result,
                    _ = shutdown.cancelled() => {
                        tracing::info!("Discord: shutting down shards");
                        shard_manager.shutdown_all().await;
                        return;
                    }
                };

                match result {
                    Ok(()) => tracing::warn!("Discord: client stopped"),
                    Err(e) => tracing::error!("Discord: client error: {}", e),
                }
                if !self.reconnect {
                    shutdown.cancel();
                    return;
                }

                tracing::info!("Discord: reconnecting in {:?}", backoff);
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.cancelled() => return,
                }
                backoff = next_backoff(backoff);
            }
        })
    }
}

/// Serenity event handler: registers commands, routes interactions and
/// relays channel messages.
struct Handler {
    state: Arc<BotState>,
}

impl Handler {
    async fn register_commands(&self, ctx: &Context) {
        let definitions = commands::definitions(self.state.test_commands);
        let count = definitions.len();

        let result = match self.state.sync_guild {
            Some(guild) => {
                tracing::info!("Discord: syncing {} commands to guild {}", count, guild);
                GuildId::new(guild)
                    .set_commands(&ctx.http, definitions)
                    .await
            }
            None => {
                tracing::info!("Discord: registering {} global commands", count);
                Command::set_global_commands(&ctx.http, definitions).await
            }
        };

        if let Err(e) = result {
            tracing::error!("Discord: failed to register commands: {}", e);
        }
    }

    async fn add_owner(&self, ctx: &Context) {
        tracing::debug!("Discord: fetching bot owner id");
        match ctx.http.get_current_application_info().await {
            Ok(info) => {
                if let Some(owner) = info.owner {
                    self.state.add_admin(owner.id.get()).await;
                }
            }
            Err(e) => tracing::warn!("Discord: failed to fetch application info: {}", e),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(
            "Discord: logged in as {} (user id {})",
            ready.user.name,
            ready.user.id
        );
        self.register_commands(&ctx).await;
        self.add_owner(&ctx).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                commands::dispatch(&ctx, &self.state, &command).await;
            }
            Interaction::Component(component) => {
                commands::press_button(&ctx, &self.state, &component).await;
            }
            _ => {}
        }
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        handler::handle_message(&msg, &self.state.relay).await;
    }
}
