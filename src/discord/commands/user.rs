use super::{
    CommandError, CommandResult, Responder, require_admin, required_str, subcommand,
    unknown_subcommand,
};
use crate::discord::BotState;
use crate::discord::embed::{Embed, escape_markdown};
use crate::whatsapp::{User, user_jid};
use serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption, ResolvedOption};

pub fn definition() -> CreateCommand {
    CreateCommand::new("user")
        .description("WhatsApp user operations.")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "info",
                "Fetches user information.",
            )
            .add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "phones",
                    "The phone number(s) of the user(s) to query. May be a comma-separated list.",
                )
                .required(true),
            ),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "avatar",
                "Fetches a user's avatar.",
            )
            .add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "phone",
                    "The phone number of the target user, including the country code.",
                )
                .required(true),
            ),
        )
}

/// JIDs for a comma-separated list of phone numbers.
pub fn parse_phones(phones: &str) -> Vec<String> {
    phones
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(user_jid)
        .collect()
}

pub fn user_embed(jid: &str, user: &User) -> Embed {
    let mut embed = Embed::info()
        .title("User Information")
        .field("User", jid, true)
        .field("Status", escape_markdown(&user.status), true);
    if let Some(verified) = &user.verified_name {
        embed = embed.field("Verified name", escape_markdown(verified), false);
    }
    embed
}

pub async fn run(
    responder: &mut Responder<'_>,
    state: &BotState,
    options: Vec<ResolvedOption<'_>>,
) -> CommandResult {
    let (name, options) = subcommand(options)?;
    require_admin(state, responder).await?;

    match name {
        "info" => {
            let jids = parse_phones(required_str(&options, "phones")?);
            if jids.is_empty() {
                return Err(CommandError::Usage(
                    "At least one phone number is required.".to_string(),
                ));
            }
            responder.defer(false).await?;

            let users = state.whatsapp.users(&jids).await?;
            if users.is_empty() {
                return responder
                    .embed(Embed::error().description("No users found."))
                    .await;
            }
            responder
                .embeds(
                    users
                        .iter()
                        .map(|(jid, user)| user_embed(jid, user))
                        .collect(),
                )
                .await
        }
        "avatar" => {
            let jid = user_jid(required_str(&options, "phone")?);
            responder.defer(false).await?;

            let url = state.whatsapp.user_avatar(&jid, false).await?;
            responder.text(&url).await
        }
        other => Err(unknown_subcommand(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phones() {
        assert_eq!(
            parse_phones(" 4917, +4918 ,,"),
            vec!["4917@s.whatsapp.net", "4918@s.whatsapp.net"]
        );
    }

    #[test]
    fn test_user_embed_fields() {
        let user = User {
            status: "*busy*".into(),
            verified_name: Some("Shop".into()),
            verified_name_issuer: None,
        };
        let embed = user_embed("4917@s.whatsapp.net", &user);
        assert_eq!(embed.fields.len(), 3);
        assert_eq!(embed.fields[1].value, r"\*busy\*");
        assert!(!embed.fields[2].inline);
    }
}
