use super::{CommandResult, Responder, require_admin};
use crate::discord::BotState;
use crate::discord::embed::Embed;
use chrono::Utc;
use serenity::all::CreateCommand;

/// Milliseconds between the Unix epoch and the Discord epoch (2015-01-01).
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

pub fn definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("ping").description("Displays the bot's ping."),
        CreateCommand::new("uptime").description("Displays the bot's uptime information."),
        CreateCommand::new("shutdown").description("Shuts down the bot globally."),
    ]
}

/// Creation time of a snowflake id in Unix milliseconds.
pub fn snowflake_millis(id: u64) -> i64 {
    (id >> 22) as i64 + DISCORD_EPOCH_MS
}

/// `1 d 2 h 3 min 4 s`, leaving out leading zero units.
pub fn format_duration(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = total_secs % 86_400 / 3600;
    let mins = total_secs % 3600 / 60;
    let secs = total_secs % 60;

    if days > 0 {
        format!("{days} d {hours} h {mins} min {secs} s")
    } else if hours > 0 {
        format!("{hours} h {mins} min {secs} s")
    } else if mins > 0 {
        format!("{mins} min {secs} s")
    } else {
        format!("{secs} s")
    }
}

pub async fn ping(responder: &mut Responder<'_>) -> CommandResult {
    let created = snowflake_millis(responder.command().id.get());
    let latency = (Utc::now().timestamp_millis() - created).max(0);

    responder
        .embed(Embed::info().title("Pong!").description(format!("{latency} ms")))
        .await
}

pub async fn uptime(responder: &mut Responder<'_>, state: &BotState) -> CommandResult {
    let elapsed = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    responder
        .embed(
            Embed::info()
                .title("Uptime")
                .field("Duration", format_duration(elapsed), true)
                .field(
                    "Start time",
                    format!("<t:{}>", state.started_at.timestamp()),
                    true,
                ),
        )
        .await
}

pub async fn shutdown(responder: &mut Responder<'_>, state: &BotState) -> CommandResult {
    require_admin(state, responder).await?;

    let command = responder.command();
    tracing::error!(
        "Shutdown requested by user {} ({}) from guild {:?}",
        command.user.name,
        command.user.id,
        command.guild_id
    );

    responder
        .embed(Embed::info().description("Shutting down..."))
        .await?;
    state.shutdown.cancel();
    Ok(())
}
