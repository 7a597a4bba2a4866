use super::{
    CommandError, CommandResult, Responder, require_admin, required_str, subcommand,
    unknown_subcommand,
};
use crate::discord::BotState;
use crate::discord::embed::Embed;
use serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption, ResolvedOption};

pub fn definition() -> CreateCommand {
    CreateCommand::new("session")
        .description("WhatsApp session management.")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "pair",
                "Pairs with your WhatsApp account.",
            )
            .add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "phone",
                    "Your phone number, including the country code but excluding non-numeric characters.",
                )
                .required(true),
            ),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "logout",
            "Signs out of the WhatsApp session.",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "status",
            "Displays the state of the WhatsApp session.",
        ))
}

/// Digits of a phone number, or `None` when anything else is present.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let phone = phone.trim().trim_start_matches('+');
    (!phone.is_empty() && phone.chars().all(|c| c.is_ascii_digit())).then(|| phone.to_string())
}

pub async fn run(
    responder: &mut Responder<'_>,
    state: &BotState,
    options: Vec<ResolvedOption<'_>>,
) -> CommandResult {
    let (name, options) = subcommand(options)?;
    require_admin(state, responder).await?;

    match name {
        "pair" => {
            let phone = normalize_phone(required_str(&options, "phone")?).ok_or_else(|| {
                CommandError::Usage("The phone number may only contain digits.".to_string())
            })?;
            responder.defer(true).await?;

            let code = state.whatsapp.pairing_code(&phone).await?;
            responder
                .embed(
                    Embed::action()
                        .title("Phone Pairing")
                        .field("Pairing code", format!("`{code}`"), true),
                )
                .await
        }
        "logout" => {
            responder.defer(false).await?;
            state.whatsapp.disconnect().await?;
            responder
                .embed(Embed::info().title("Logout").description(
                    "You have successfully signed out from the WhatsApp session.\n\n\
                     Use the `/session pair` command to sign in again.",
                ))
                .await
        }
        "status" => {
            responder.defer(true).await?;
            let status = state.whatsapp.status().await?;
            responder
                .embed(
                    Embed::info()
                        .title("Session Status")
                        .field("Connected", yes_no(status.connected), true)
                        .field("Logged in", yes_no(status.logged_in), true),
                )
                .await
        }
        other => Err(unknown_subcommand(other)),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}
