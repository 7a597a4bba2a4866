//! `/binding` commands: manage which Discord channels mirror which WhatsApp
//! chats.
//!
//! Listing and clearing are scoped to the invoking server unless
//! `include_global` is set. Bindings written before guild ids were recorded
//! are located through the REST API.

use super::{
    CommandError, CommandResult, Responder, bool_option, channel_option, require_admin,
    required_str, subcommand, unknown_subcommand,
};
use crate::bindings::{BindingConfig, Direction};
use crate::discord::BotState;
use crate::discord::embed::{Embed, escape_markdown, truncate};
use crate::discord::outlet::is_unreachable;
use crate::discord::paginator::ListEntry;
use crate::error::Result;
use futures::future::join_all;
use serenity::all::{
    Channel, ChannelId, ChannelType, CommandOptionType, Context, CreateChannel, CreateCommand,
    CreateCommandOption, GuildId, ResolvedOption,
};
use std::collections::{BTreeMap, BTreeSet};

const CHANNEL_NAME_LIMIT: usize = 100;

pub fn definition() -> CreateCommand {
    let channel = |description: &str, required: bool| {
        CreateCommandOption::new(CommandOptionType::Channel, "channel", description)
            .channel_types(vec![ChannelType::Text])
            .required(required)
    };
    let include_global = || {
        CreateCommandOption::new(
            CommandOptionType::Boolean,
            "include_global",
            "Include bindings from all servers, not just the current server.",
        )
    };

    let mut direction = CreateCommandOption::new(
        CommandOptionType::String,
        "direction",
        "The direction to which messages should be forwarded.",
    )
    .required(true);
    for d in Direction::ALL {
        direction = direction.add_string_choice(d.label(), d.label());
    }

    CreateCommand::new("binding")
        .description("WhatsApp-Discord binding management.")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "list",
                "Lists all configured bindings.",
            )
            .add_sub_option(include_global()),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "set",
                "Binds a channel to a WhatsApp group chat, or updates an existing binding.",
            )
            .add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "group_name",
                    "The name of the WhatsApp group chat.",
                )
                .required(true),
            )
            .add_sub_option(direction)
            .add_sub_option(channel(
                "The corresponding Discord channel. If unspecified, one will be automatically created.",
                false,
            )),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "remove",
                "Unbinds a channel from a WhatsApp group chat.",
            )
            .add_sub_option(channel("The corresponding Discord channel.", true))
            .add_sub_option(CreateCommandOption::new(
                CommandOptionType::Boolean,
                "preserve_channel",
                "Whether to keep (i.e. avoid deleting) the channel. Defaults to `False`.",
            )),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "clear",
                "Removes all configured bindings.",
            )
            .add_sub_option(CreateCommandOption::new(
                CommandOptionType::Boolean,
                "preserve_channels",
                "Whether to keep (i.e. avoid deleting) the channels. Defaults to `False`.",
            ))
            .add_sub_option(include_global()),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "pause",
            "Suspends all bindings globally.",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "resume",
            "Resumes all bindings globally.",
        ))
}

pub async fn run(
    responder: &mut Responder<'_>,
    state: &BotState,
    options: Vec<ResolvedOption<'_>>,
) -> CommandResult {
    let (name, options) = subcommand(options)?;

    match name {
        "list" => list(responder, state, &options).await,
        "set" => set(responder, state, &options).await,
        "remove" => remove(responder, state, &options).await,
        "clear" => clear(responder, state, &options).await,
        "pause" => pause(responder, state, true).await,
        "resume" => pause(responder, state, false).await,
        other => Err(unknown_subcommand(other)),
    }
}

fn server_only() -> CommandError {
    CommandError::Usage("This command can only be used in a server.".to_string())
}

/// Where a bound channel lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Guild(u64),
    Elsewhere,
    Missing,
}

async fn locate(ctx: &Context, channel_id: u64) -> Result<Location> {
    match ctx.http.get_channel(ChannelId::new(channel_id)).await {
        Ok(Channel::Guild(channel)) => Ok(Location::Guild(channel.guild_id.get())),
        Ok(_) => Ok(Location::Elsewhere),
        Err(e) if is_unreachable(&e) => Ok(Location::Missing),
        Err(e) => Err(e.into()),
    }
}

async fn binding_guild(ctx: &Context, channel_id: u64, config: &BindingConfig) -> Result<Option<u64>> {
    if let Some(guild) = config.guild_id {
        return Ok(Some(guild));
    }
    Ok(match locate(ctx, channel_id).await? {
        Location::Guild(guild) => Some(guild),
        _ => None,
    })
}

async fn list(
    responder: &mut Responder<'_>,
    state: &BotState,
    options: &[ResolvedOption<'_>],
) -> CommandResult {
    let include_global = bool_option(options, "include_global").unwrap_or(false);

    if include_global && !state.is_admin(responder.user_id()).await {
        return responder
            .embed(
                Embed::error()
                    .description("For security, only owners can list bindings globally."),
            )
            .await;
    }
    let guild = responder.guild_id();
    if !include_global && guild.is_none() {
        return Err(server_only());
    }

    let snapshot: BTreeMap<String, BTreeMap<u64, BindingConfig>> =
        state.relay.bindings().read().await.bindings.clone();
    if snapshot.is_empty() {
        return responder
            .embed(Embed::info().description("No bindings have been configured."))
            .await;
    }
    responder.defer(false).await?;

    let ctx = responder.ctx();
    let mut entries = Vec::new();
    for (chat, channels) in snapshot {
        let mut items = Vec::new();
        for (channel, config) in channels {
            let in_scope = include_global
                || match binding_guild(ctx, channel, &config).await {
                    Ok(found) => found == guild,
                    Err(e) => {
                        tracing::warn!("Could not locate channel {}: {}", channel, e);
                        false
                    }
                };
            if in_scope {
                items.push(ListEntry::Item(format!("<#{channel}> ({})", config.arrow())));
            }
        }
        if items.is_empty() {
            continue;
        }

        let heading = match state.whatsapp.group_name(&chat).await {
            Ok(Some(name)) => name,
            Ok(None) => chat,
            Err(e) => {
                tracing::warn!("Failed to resolve name of chat {}: {}", chat, e);
                chat
            }
        };
        entries.push(ListEntry::Heading(escape_markdown(&heading)));
        entries.extend(items);
    }

    if entries.is_empty() {
        return responder
            .embed(Embed::info().description("No bindings have been configured."))
            .await;
    }
    responder
        .pages(state, entries, Embed::info().title("Bindings"))
        .await
}

async fn set(
    responder: &mut Responder<'_>,
    state: &BotState,
    options: &[ResolvedOption<'_>],
) -> CommandResult {
    require_admin(state, responder).await?;

    let group_name = required_str(options, "group_name")?;
    let direction = Direction::from_label(required_str(options, "direction")?)
        .ok_or_else(|| CommandError::Usage("Unknown forwarding direction.".to_string()))?;
    let guild = responder.guild_id().ok_or_else(server_only)?;
    responder.defer(false).await?;

    let Some(group) = state.whatsapp.group_by_name(group_name).await? else {
        return responder
            .embed(Embed::error().description("Group not found."))
            .await;
    };

    let channel = match channel_option(options, "channel") {
        Some(channel) => channel,
        None => {
            let created = GuildId::new(guild)
                .create_channel(
                    &responder.ctx().http,
                    CreateChannel::new(truncate(&group.name, CHANNEL_NAME_LIMIT))
                        .kind(ChannelType::Text),
                )
                .await?;
            tracing::info!("Created channel {} for group {}", created.id, group.jid);
            created.id.get()
        }
    };

    let updated = state
        .relay
        .bindings()
        .update(|b| b.set(&group.jid, channel, BindingConfig::new(direction, Some(guild))))
        .await?;

    responder
        .embed(
            Embed::info()
                .title(if updated {
                    "Existing Binding Updated"
                } else {
                    "New Binding Created."
                })
                .field("Chat name", escape_markdown(&group.name), true)
                .field("Channel", format!("<#{channel}>"), true)
                .field("Forwarding direction", direction.label(), true),
        )
        .await
}

async fn remove(
    responder: &mut Responder<'_>,
    state: &BotState,
    options: &[ResolvedOption<'_>],
) -> CommandResult {
    require_admin(state, responder).await?;

    let channel = channel_option(options, "channel")
        .ok_or_else(|| CommandError::Usage("The `channel` option is required.".to_string()))?;
    let preserve = bool_option(options, "preserve_channel").unwrap_or(false);
    responder.defer(false).await?;

    let bindings = state.relay.bindings();
    if bindings.read().await.is_empty() {
        return responder
            .embed(Embed::info().description("No bindings are currently configured."))
            .await;
    }

    let chats = bindings.update(|b| b.remove_channel(channel)).await?;
    if chats.is_empty() {
        return responder
            .embed(Embed::info().description("No binding is configured for the given channel."))
            .await;
    }
    tracing::info!("Unbound channel {} from {} chat(s)", channel, chats.len());

    if !preserve {
        ChannelId::new(channel).delete(&responder.ctx().http).await?;
    }
    // Nothing to answer in when the channel the command ran in is gone.
    if preserve || channel != responder.command().channel_id.get() {
        responder
            .embed(Embed::info().description("Binding successfully deleted."))
            .await?;
    }
    Ok(())
}

async fn clear(
    responder: &mut Responder<'_>,
    state: &BotState,
    options: &[ResolvedOption<'_>],
) -> CommandResult {
    require_admin(state, responder).await?;

    let preserve = bool_option(options, "preserve_channels").unwrap_or(false);
    let include_global = bool_option(options, "include_global").unwrap_or(false);
    let guild = responder.guild_id().ok_or_else(server_only)?;

    let bindings = state.relay.bindings();
    let channels: BTreeSet<u64> = {
        let current = bindings.read().await;
        if current.is_empty() {
            drop(current);
            return responder
                .embed(Embed::info().description("There are no bindings to clear."))
                .await;
        }
        current.bindings.values().flat_map(|c| c.keys().copied()).collect()
    };
    responder.defer(false).await?;

    let ctx = responder.ctx();
    let mut to_clear = BTreeSet::new();
    let mut failed = 0usize;
    let mut missing = 0usize;
    let mut deleted_current = false;

    let locations = join_all(channels.iter().map(|&channel| locate(ctx, channel))).await;
    for (channel, location) in channels.into_iter().zip(locations) {
        let location = match location {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!("Could not locate channel {}: {}", channel, e);
                if include_global {
                    to_clear.insert(channel);
                    failed += 1;
                }
                continue;
            }
        };
        match location {
            Location::Guild(g) if include_global || g == guild => {
                to_clear.insert(channel);
                if preserve {
                    continue;
                }
                match ChannelId::new(channel).delete(&ctx.http).await {
                    Ok(_) => deleted_current |= channel == responder.command().channel_id.get(),
                    Err(e) => {
                        tracing::warn!("Failed to delete channel {}: {}", channel, e);
                        failed += 1;
                    }
                }
            }
            Location::Missing if include_global => {
                to_clear.insert(channel);
                missing += 1;
            }
            _ => {}
        }
    }

    let cleared = bindings
        .update(|b| b.remove_where(|_, channel, _| to_clear.contains(&channel)))
        .await?
        .len();
    tracing::info!("Cleared {} binding(s)", cleared);

    if deleted_current {
        return Ok(());
    }

    let mut embeds = vec![
        Embed::info()
            .description(format!(
                "Bindings have been cleared {}.",
                if include_global { "globally" } else { "for this server" }
            ))
            .field("# cleared bindings", cleared.to_string(), true),
    ];
    if failed > 0 {
        embeds.push(Embed::error().description(format!(
            "Failed to delete channels for {failed} binding(s).\nThese bindings have been cleared anyway."
        )));
    }
    if missing > 0 {
        embeds.push(Embed::info().description(format!(
            "The channels for {missing} binding(s) were not found.\nThese bindings have been cleared anyway."
        )));
    }
    responder.embeds(embeds).await
}

fn unchanged_pause_message(paused: bool) -> &'static str {
    if paused {
        "Bindings are already paused."
    } else {
        "Bindings have not already been paused."
    }
}

async fn pause(responder: &mut Responder<'_>, state: &BotState, paused: bool) -> CommandResult {
    require_admin(state, responder).await?;

    let bindings = state.relay.bindings();
    if bindings.read().await.bindings_paused == paused {
        return responder
            .embed(Embed::info().description(unchanged_pause_message(paused)))
            .await;
    }

    bindings.update(|b| b.bindings_paused = paused).await?;
    tracing::info!("Bindings {}", if paused { "paused" } else { "resumed" });

    let embed = if paused {
        Embed::info().title("Bindings Paused").description(
            "All bindings have been suspended.\n\n\
             No messages will be forwarded between WhatsApp and Discord until `/binding resume` is executed.",
        )
    } else {
        Embed::info().title("Bindings Resumed").description(
            "All bindings are now active again.\n\n\
             Forwarding messages between WhatsApp and Discord is now allowed.",
        )
    };
    responder.embed(embed).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, "Bindings are already paused.")]
    #[case(false, "Bindings have not already been paused.")]
    fn test_unchanged_pause_message(#[case] paused: bool, #[case] expected: &str) {
        assert_eq!(unchanged_pause_message(paused), expected);
    }
}
