//! Slash Commands
//!
//! Definitions registered with Discord, dispatch of incoming interactions,
//! and the [`Responder`] every command answers through.

mod binding;
mod general;
mod group;
mod session;
mod test;
mod user;

use super::BotState;
use super::embed::Embed;
use super::handler::{MESSAGE_LIMIT, split_message};
use super::paginator::{self, ListEntry, Pager, Press};
use crate::error::Error;
use serenity::all::{
    CommandInteraction, ComponentInteraction, Context, CreateActionRow, CreateCommand,
    CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, ResolvedOption, ResolvedValue,
};

pub const NOT_ADMIN: &str = "(╯°□°)╯︵ ┻━┻ You do not have permission to run this command!";
pub const COMMAND_FAILED: &str =
    "(´･_･`) An error occurred while running the command.\nThis is probably due to a bug.";
pub const COMMAND_FAILED_FOOTER: &str = "Developers: check the logs for details.";
pub const NOT_YOUR_BUTTON: &str = "(►__◄) This button is not for you!";
pub const PAGER_EXPIRED: &str = "This list has expired. Run the command again.";

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("user is not an admin")]
    NotAdmin,

    /// Refusal shown to the user as-is.
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Failed(#[from] Error),
}

impl From<serenity::Error> for CommandError {
    fn from(e: serenity::Error) -> Self {
        Self::Failed(e.into())
    }
}

pub type CommandResult = std::result::Result<(), CommandError>;

/// Every command known to the bot.
pub fn definitions(include_test: bool) -> Vec<CreateCommand> {
    let mut commands = general::definitions();
    commands.extend([
        session::definition(),
        user::definition(),
        group::definition(),
        binding::definition(),
    ]);
    if include_test {
        commands.push(test::definition());
    }
    commands
}

pub async fn dispatch(ctx: &Context, state: &BotState, command: &CommandInteraction) {
    tracing::info!(
        "Discord: /{} invoked by {} ({})",
        command.data.name,
        command.user.name,
        command.user.id
    );

    let mut responder = Responder::new(ctx, command);
    let options = command.data.options();

    let result = match command.data.name.as_str() {
        "ping" => general::ping(&mut responder).await,
        "uptime" => general::uptime(&mut responder, state).await,
        "shutdown" => general::shutdown(&mut responder, state).await,
        "session" => session::run(&mut responder, state, options).await,
        "user" => user::run(&mut responder, state, options).await,
        "group" => group::run(&mut responder, state, options).await,
        "binding" => binding::run(&mut responder, state, options).await,
        "test" if state.test_commands => test::run(&mut responder, state, options).await,
        other => Err(CommandError::Usage(format!("Unknown command `/{other}`."))),
    };

    if let Err(e) = result {
        responder.fail(e).await;
    }
}

/// Handle a press on a paginated list button.
pub async fn press_button(ctx: &Context, state: &BotState, component: &ComponentInteraction) {
    let Some((key, action)) = paginator::parse_custom_id(&component.data.custom_id) else {
        tracing::debug!("Discord: ignoring component {}", component.data.custom_id);
        return;
    };

    let response = match state.pagers.press(key, component.user.id.get(), action).await {
        Press::Updated(embed) => CreateInteractionResponse::UpdateMessage(
            CreateInteractionResponseMessage::new().embed(embed.to_create()),
        ),
        Press::NotOwner => ephemeral_error(NOT_YOUR_BUTTON),
        Press::Expired => ephemeral_error(PAGER_EXPIRED),
    };

    if let Err(e) = component.create_response(&ctx.http, response).await {
        tracing::error!("Discord: failed to answer button press: {}", e);
    }
}

fn ephemeral_error(description: &str) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .embed(Embed::error().description(description).to_create())
            .ephemeral(true),
    )
}

pub(crate) async fn require_admin(state: &BotState, responder: &Responder<'_>) -> CommandResult {
    if state.is_admin(responder.user_id()).await {
        Ok(())
    } else {
        Err(CommandError::NotAdmin)
    }
}

#[derive(Default)]
struct Reply {
    content: Option<String>,
    embeds: Vec<Embed>,
    components: Vec<CreateActionRow>,
}

/// Answers one command interaction, switching from the initial response to
/// followups once the interaction has been acknowledged.
pub struct Responder<'a> {
    ctx: &'a Context,
    command: &'a CommandInteraction,
    acknowledged: bool,
}

impl<'a> Responder<'a> {
    pub fn new(ctx: &'a Context, command: &'a CommandInteraction) -> Self {
        Self {
            ctx,
            command,
            acknowledged: false,
        }
    }

    pub fn ctx(&self) -> &'a Context {
        self.ctx
    }

    pub fn command(&self) -> &'a CommandInteraction {
        self.command
    }

    pub fn user_id(&self) -> u64 {
        self.command.user.id.get()
    }

    pub fn guild_id(&self) -> Option<u64> {
        self.command.guild_id.map(|g| g.get())
    }

    /// Acknowledge the interaction so slow work can follow.
    pub async fn defer(&mut self, ephemeral: bool) -> Result<(), CommandError> {
        if ephemeral {
            self.command.defer_ephemeral(&self.ctx.http).await?;
        } else {
            self.command.defer(&self.ctx.http).await?;
        }
        self.acknowledged = true;
        Ok(())
    }

    pub async fn embed(&mut self, embed: Embed) -> CommandResult {
        self.embeds(vec![embed]).await
    }

    pub async fn embeds(&mut self, embeds: Vec<Embed>) -> CommandResult {
        // A single message carries at most ten embeds.
        for chunk in embeds.chunks(10) {
            self.send(Reply {
                embeds: chunk.to_vec(),
                ..Reply::default()
            })
            .await?;
        }
        Ok(())
    }

    pub async fn text(&mut self, text: &str) -> CommandResult {
        for chunk in split_message(text, MESSAGE_LIMIT) {
            self.send(Reply {
                content: Some(chunk.to_string()),
                ..Reply::default()
            })
            .await?;
        }
        Ok(())
    }

    /// Show `entries` as a paginated list owned by the invoking user.
    pub async fn pages(
        &mut self,
        state: &BotState,
        entries: Vec<ListEntry>,
        template: Embed,
    ) -> CommandResult {
        let key = self.command.id.get();
        let pager = Pager::new(self.user_id(), entries, template);
        let embed = pager.embed();

        let components = if pager.max_page() > 0 {
            state.pagers.insert(key, pager).await;
            paginator::components(key)
        } else {
            Vec::new()
        };

        self.send(Reply {
            embeds: vec![embed],
            components,
            ..Reply::default()
        })
        .await
    }

    async fn send(&mut self, reply: Reply) -> CommandResult {
        let embeds = reply.embeds.iter().map(Embed::to_create).collect();

        if self.acknowledged {
            let mut builder = CreateInteractionResponseFollowup::new()
                .embeds(embeds)
                .components(reply.components);
            if let Some(content) = reply.content {
                builder = builder.content(content);
            }
            self.command.create_followup(&self.ctx.http, builder).await?;
        } else {
            let mut builder = CreateInteractionResponseMessage::new()
                .embeds(embeds)
                .components(reply.components);
            if let Some(content) = reply.content {
                builder = builder.content(content);
            }
            self.command
                .create_response(&self.ctx.http, CreateInteractionResponse::Message(builder))
                .await?;
            self.acknowledged = true;
        }
        Ok(())
    }

    /// Report a failed command to the user.
    async fn fail(&mut self, error: CommandError) {
        let embed = match &error {
            CommandError::NotAdmin => {
                tracing::info!(
                    "Discord: denied /{} to {} ({})",
                    self.command.data.name,
                    self.command.user.name,
                    self.command.user.id
                );
                Embed::error().description(NOT_ADMIN)
            }
            CommandError::Usage(message) => Embed::error().description(message.as_str()),
            CommandError::Failed(e) => {
                tracing::error!(
                    "Discord: command /{} failed: {}",
                    self.command.data.name,
                    e
                );
                Embed::error()
                    .description(COMMAND_FAILED)
                    .footer(COMMAND_FAILED_FOOTER)
            }
        };

        if let Err(e) = self.embed(embed).await {
            tracing::error!("Discord: failed to report command error: {}", e);
        }
    }
}

/// The subcommand of a grouped command and its options.
pub(crate) fn subcommand(
    options: Vec<ResolvedOption<'_>>,
) -> Result<(&str, Vec<ResolvedOption<'_>>), CommandError> {
    match options.into_iter().next() {
        Some(ResolvedOption {
            name,
            value: ResolvedValue::SubCommand(options),
            ..
        }) => Ok((name, options)),
        _ => Err(CommandError::Usage("A subcommand is required.".to_string())),
    }
}

pub(crate) fn unknown_subcommand(name: &str) -> CommandError {
    CommandError::Usage(format!("Unknown subcommand `{name}`."))
}

pub(crate) fn str_option<'a>(options: &[ResolvedOption<'a>], name: &str) -> Option<&'a str> {
    options.iter().find_map(|o| match o.value {
        ResolvedValue::String(s) if o.name == name => Some(s),
        _ => None,
    })
}

pub(crate) fn bool_option(options: &[ResolvedOption<'_>], name: &str) -> Option<bool> {
    options.iter().find_map(|o| match o.value {
        ResolvedValue::Boolean(b) if o.name == name => Some(b),
        _ => None,
    })
}

pub(crate) fn channel_option(options: &[ResolvedOption<'_>], name: &str) -> Option<u64> {
    options.iter().find_map(|o| match &o.value {
        ResolvedValue::Channel(channel) if o.name == name => Some(channel.id.get()),
        _ => None,
    })
}

pub(crate) fn required_str<'a>(
    options: &[ResolvedOption<'a>],
    name: &str,
) -> Result<&'a str, CommandError> {
    str_option(options, name)
        .ok_or_else(|| CommandError::Usage(format!("The `{name}` option is required.")))
}
