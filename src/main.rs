use anyhow::Context as _;
use clap::Parser;
use serenity::http::Http;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wdmta::bindings::BindingStore;
use wdmta::cli::{Cli, prompt_token};
use wdmta::config::Settings;
use wdmta::discord::{BotState, DiscordBot, SerenityOutlet};
use wdmta::logging;
use wdmta::relay::{EVENT_QUEUE_CAPACITY, Relay, RelayConfig};
use wdmta::whatsapp::WuzapiClient;
use wdmta::whatsapp::webhook::{self, WebhookState};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings =
        Settings::load(cli.settings.as_deref()).context("Failed to load settings")?;
    settings.apply_cli(&cli);

    if cli.print_settings {
        print!("{}", settings.to_redacted_toml()?);
        return Ok(());
    }

    let _log_guard = logging::init(&settings.log).context("Failed to set up logging")?;

    let discord_token = resolve_token(settings.discord.token.take(), "Discord bot")?;
    let wuzapi_token = resolve_token(settings.wuzapi.token.take(), "WuzAPI")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the Tokio runtime")?;
    runtime.block_on(run(settings, discord_token, wuzapi_token))
}

fn resolve_token(configured: Option<String>, desc: &str) -> anyhow::Result<String> {
    match configured.filter(|t| !t.trim().is_empty()) {
        Some(token) => Ok(token),
        None => prompt_token(desc, std::io::stdin().lock(), std::io::stderr())
            .with_context(|| format!("Failed to read the {desc} token")),
    }
}

async fn run(settings: Settings, discord_token: String, wuzapi_token: String) -> anyhow::Result<()> {
    tracing::info!("Starting wdmta {}", env!("CARGO_PKG_VERSION"));
    let shutdown = CancellationToken::new();

    let bindings = BindingStore::load(&settings.bindings_file)
        .await
        .with_context(|| {
            format!(
                "Failed to load bindings from {}",
                settings.bindings_file.display()
            )
        })?;
    let whatsapp = Arc::new(
        WuzapiClient::new(&settings.wuzapi.url, wuzapi_token.clone())
            .context("Failed to create the WuzAPI client")?,
    );

    // Webhook server first, so WuzAPI has somewhere to deliver to.
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let mut webhook_state = WebhookState::new(wuzapi_token, events_tx);
    if let Some(path) = &settings.wuzapi.dump_file {
        webhook_state = webhook_state
            .with_dump_file(path)
            .await
            .with_context(|| format!("Failed to open dump file {}", path.display()))?;
    }

    let bind_addr = format!(
        "{}:{}",
        settings.wuzapi.webhook_host, settings.wuzapi.webhook_port
    );
    tracing::info!("Starting webhook server on {}", bind_addr);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind the webhook server to {bind_addr}"))?;
    let webhook_task = tokio::spawn(webhook::serve(
        listener,
        Arc::new(webhook_state),
        shutdown.clone(),
    ));

    let webhook_url = settings.webhook_url();
    match whatsapp.register_webhook(&webhook_url).await {
        Ok(()) => {
            if let Err(e) = whatsapp.connect().await {
                tracing::warn!("Failed to connect the WhatsApp session: {}", e);
            }
        }
        Err(e) => tracing::error!("Failed to register webhook {}: {}", webhook_url, e),
    }

    let outlet = SerenityOutlet::new(Arc::new(Http::new(&discord_token)));
    let relay = Arc::new(Relay::new(
        Arc::new(bindings),
        whatsapp.clone(),
        Arc::new(outlet),
        RelayConfig {
            media_max_size: settings.wuzapi.media_max_size,
            message_limit: settings.wuzapi.message_limit,
        },
    ));
    let relay_task = relay.clone().start(events_rx, shutdown.clone());

    let state = BotState::new(relay, whatsapp, settings.admins(), shutdown.clone())
        .with_sync_guild(settings.discord.sync_to_guild)
        .with_test_commands(settings.discord.enable_test_commands);
    let bot_task = DiscordBot::new(Arc::new(state), settings.discord.reconnect).start(discord_token);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
        _ = shutdown.cancelled() => tracing::info!("Shutting down"),
    }
    shutdown.cancel();

    if let Err(e) = bot_task.await {
        tracing::error!("Discord task failed: {}", e);
    }
    if let Err(e) = relay_task.await {
        tracing::error!("Relay task failed: {}", e);
    }
    match webhook_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Webhook server error: {}", e),
        Err(e) => tracing::error!("Webhook task failed: {}", e),
    }

    tracing::info!("Stopped");
    Ok(())
}
