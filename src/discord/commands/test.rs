use super::{CommandResult, Responder, subcommand, unknown_subcommand};
use crate::discord::BotState;
use crate::discord::embed::Embed;
use crate::discord::paginator::ListEntry;
use serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption, ResolvedOption};

pub fn definition() -> CreateCommand {
    CreateCommand::new("test")
        .description("Development commands.")
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "embeds",
            "Shows some embeds.",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "pages",
            "Shows a pagination view.",
        ))
}

/// Fifty entries with a heading every ten.
pub fn sample_entries() -> Vec<ListEntry> {
    (0..50)
        .map(|i| {
            if i % 10 == 0 {
                ListEntry::Heading(format!("heading {}", i / 10))
            } else {
                ListEntry::Item(format!("item {i}"))
            }
        })
        .collect()
}

pub async fn run(
    responder: &mut Responder<'_>,
    state: &BotState,
    options: Vec<ResolvedOption<'_>>,
) -> CommandResult {
    let (name, _) = subcommand(options)?;

    match name {
        "embeds" => {
            responder
                .embeds(vec![
                    Embed::info().description("Information embed."),
                    Embed::error().description("Error embed."),
                    Embed::action().description("Action embed."),
                ])
                .await
        }
        "pages" => responder.pages(state, sample_entries(), Embed::info()).await,
        other => Err(unknown_subcommand(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_entries() {
        let entries = sample_entries();
        assert_eq!(entries.len(), 50);
        assert_eq!(entries[0], ListEntry::Heading("heading 0".into()));
        assert_eq!(entries[11], ListEntry::Item("item 11".into()));
    }
}
