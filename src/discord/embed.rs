//! Embed model
//!
//! A plain description of a Discord embed, so the relay and the command
//! handlers can be exercised without a gateway connection. Converted to
//! serenity's builder at the edge.

use chrono::{DateTime, Utc};
use serenity::builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};
use serenity::model::Colour;
use serenity::model::Timestamp;

pub const ACTION_COLOR: u32 = 0xFFFF64; // (255, 255, 100)
pub const INFO_COLOR: u32 = 0x9682FF; // (150, 130, 255)
pub const ERROR_COLOR: u32 = 0xFF1E32; // (255, 30, 50)

const TITLE_LIMIT: usize = 256;
const DESCRIPTION_LIMIT: usize = 4096;
const FIELD_NAME_LIMIT: usize = 256;
const FIELD_VALUE_LIMIT: usize = 1024;
const EMPTY_VALUE: &str = "\u{200B}";

#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub name: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    pub author: Option<Author>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: Vec<Field>,
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info() -> Self {
        Self::new().color(INFO_COLOR)
    }

    pub fn action() -> Self {
        Self::new().color(ACTION_COLOR)
    }

    pub fn error() -> Self {
        Self::new().title("Error").color(ERROR_COLOR)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn author(mut self, name: impl Into<String>, icon_url: Option<String>) -> Self {
        self.author = Some(Author {
            name: name.into(),
            icon_url,
        });
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    /// Build the serenity embed, clamping every part to Discord's limits.
    pub fn to_create(&self) -> CreateEmbed {
        let mut embed = CreateEmbed::new();

        if let Some(title) = &self.title {
            embed = embed.title(truncate(title, TITLE_LIMIT));
        }
        if let Some(description) = &self.description {
            embed = embed.description(truncate(description, DESCRIPTION_LIMIT));
        }
        if let Some(color) = self.color {
            embed = embed.colour(Colour::new(color));
        }
        if let Some(author) = &self.author {
            let mut create = CreateEmbedAuthor::new(truncate(&author.name, TITLE_LIMIT));
            if let Some(url) = &author.icon_url {
                create = create.icon_url(url);
            }
            embed = embed.author(create);
        }
        if let Some(footer) = &self.footer {
            embed = embed.footer(CreateEmbedFooter::new(footer));
        }
        if let Some(ts) = self.timestamp
            && let Ok(ts) = Timestamp::from_unix_timestamp(ts.timestamp())
        {
            embed = embed.timestamp(ts);
        }
        for field in &self.fields {
            // Discord rejects empty field values.
            let value = if field.value.is_empty() {
                EMPTY_VALUE.to_string()
            } else {
                truncate(&field.value, FIELD_VALUE_LIMIT)
            };
            embed = embed.field(truncate(&field.name, FIELD_NAME_LIMIT), value, field.inline);
        }

        embed
    }
}

/// Escape Discord markdown so forwarded text renders literally.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let mut chars = line.chars().peekable();
        if let Some(&first) = chars.peek()
            && matches!(first, '>' | '#' | '-')
        {
            out.push('\\');
        }
        for c in chars {
            if matches!(c, '\\' | '*' | '_' | '~' | '`' | '|') {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette() {
        assert_eq!(Embed::error().title.as_deref(), Some("Error"));
        assert_eq!(Embed::error().color, Some(ERROR_COLOR));
        assert_eq!(Embed::info().color, Some(0x96_82_FF));
        assert_eq!(Embed::action().color, Some(0xFF_FF_64));
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("*bold* _it_"), r"\*bold\* \_it\_");
        assert_eq!(escape_markdown("a|b`c~"), r"a\|b\`c\~");
        assert_eq!(escape_markdown("> quote\n# head\nplain > x"), "\\> quote\n\\# head\nplain > x");
        assert_eq!(escape_markdown(""), "");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ábcdéf", 4), "ábc…");
    }

    #[test]
    fn test_builder_accumulates_fields() {
        let embed = Embed::info()
            .title("Uptime")
            .field("Duration", "5 s", true)
            .field("Start time", "<t:0>", true);
        assert_eq!(embed.fields.len(), 2);
        assert_eq!(embed.fields[1].name, "Start time");
        // Conversion must not panic on any combination.
        let _ = embed.to_create();
    }
}
