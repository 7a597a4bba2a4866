use super::{
    CommandResult, Responder, bool_option, require_admin, required_str, str_option, subcommand,
    unknown_subcommand,
};
use crate::discord::BotState;
use crate::discord::embed::{Embed, escape_markdown};
use crate::discord::paginator::ListEntry;
use crate::whatsapp::Group;
use chrono::{DateTime, Utc};
use serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption, ResolvedOption};

pub fn definition() -> CreateCommand {
    CreateCommand::new("group")
        .description("WhatsApp group operations.")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "list",
                "Lists the WhatsApp groups you are in.",
            )
            .add_sub_option(CreateCommandOption::new(
                CommandOptionType::String,
                "name_contains",
                "Only list groups whose name contains this text. Case-insensitive.",
            ))
            .add_sub_option(CreateCommandOption::new(
                CommandOptionType::Boolean,
                "is_announce",
                "Only list announcement groups, or only regular groups.",
            )),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "info",
                "Displays WhatsApp group information.",
            )
            .add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "name",
                    "The name of the group chat. Case-insensitive.",
                )
                .required(true),
            ),
        )
}

/// Groups matching the optional filters, in the given order.
pub fn filter_groups<'a>(
    groups: &'a [Group],
    name_contains: Option<&str>,
    is_announce: Option<bool>,
) -> impl Iterator<Item = &'a Group> {
    let needle = name_contains.map(str::to_lowercase);
    groups.iter().filter(move |g| {
        needle
            .as_deref()
            .is_none_or(|n| g.name.to_lowercase().contains(n))
            && is_announce.is_none_or(|a| g.is_announce == a)
    })
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %T").to_string()
}

pub fn group_embed(group: &Group) -> Embed {
    let mut embed = Embed::info()
        .title("Group Information")
        .field("ID", group.jid.as_str(), true)
        .field("Name", escape_markdown(&group.name), true)
        .field("Name set at", format_time(group.name_set_at), true)
        .field("Announcement group", group.is_announce.to_string(), false);

    if let Some(topic) = &group.topic {
        embed = embed.field("Topic", escape_markdown(topic), true);
        if let Some(set_at) = group.topic_set_at {
            embed = embed.field("Topic set at", format_time(set_at), true);
        }
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
        "list" => {
            responder.defer(true).await?;

            let groups = state.whatsapp.groups().await?;
            let entries = filter_groups(
                &groups,
                str_option(&options, "name_contains"),
                bool_option(&options, "is_announce"),
            )
            .map(|g| ListEntry::Item(escape_markdown(&g.name)))
            .collect();

            responder
                .pages(state, entries, Embed::info().title("WhatsApp Groups"))
                .await
        }
        "info" => {
            let name = required_str(&options, "name")?;
            responder.defer(false).await?;

            match state.whatsapp.group_by_name(name).await? {
                Some(group) => responder.embed(group_embed(&group)).await,
                None => {
                    responder
                        .embed(Embed::error().description("Group not found."))
                        .await
                }
            }
        }
        other => Err(unknown_subcommand(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn group(name: &str, announce: bool) -> Group {
        Group {
            jid: format!("{}@g.us", name.len()),
            name: name.to_string(),
            name_set_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            topic: None,
            topic_set_at: None,
            is_announce: announce,
            is_ephemeral: false,
            is_locked: false,
        }
    }

    #[test]
    fn test_filter_groups() {
        let groups = vec![
            group("Family", false),
            group("Family News", true),
            group("Work", false),
        ];
        let names = |it: Vec<&Group>| it.into_iter().map(|g| g.name.clone()).collect::<Vec<_>>();

        assert_eq!(names(filter_groups(&groups, None, None).collect()).len(), 3);
        assert_eq!(
            names(filter_groups(&groups, Some("FAMILY"), None).collect()),
            vec!["Family", "Family News"]
        );
        assert_eq!(
            names(filter_groups(&groups, Some("family"), Some(false)).collect()),
            vec!["Family"]
        );
    }

    #[test]
    fn test_group_embed() {
        let mut g = group("Work", false);
        let embed = group_embed(&g);
        assert_eq!(embed.fields.len(), 4);
        assert_eq!(embed.fields[2].value, "2024-05-01 12:30:00");
        assert_eq!(embed.fields[3].value, "false");

        g.topic = Some("Deadlines".into());
        g.topic_set_at = Some(g.name_set_at);
        assert_eq!(group_embed(&g).fields.len(), 6);
    }
}
