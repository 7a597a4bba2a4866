//! Rendering of WhatsApp content as Discord embeds and of Discord messages
//! as WhatsApp text.

use crate::discord::embed::{Embed, escape_markdown};
use crate::whatsapp::{ContentKind, Poll};

pub const FORWARD_FOOTER: &str = "forwarded from WhatsApp";
pub const UNSUPPORTED: &str = "`< unsupported message content type >`";
pub const MISSING_REFERENCE: &str = "The referenced message could not be retrieved.";
pub const MEDIA_DOWNLOAD_FAILED: &str = "Failed to download media.";

pub fn format_quote(kind: &ContentKind) -> String {
    match kind.summary() {
        Some(text) => format!("> {}", escape_markdown(text)),
        None => format!("> {UNSUPPORTED}"),
    }
}

pub fn media_too_large(limit: u64) -> String {
    format!("File exceeded size limit ({limit} bytes).")
}

pub fn poll_embed(base: Embed, poll: &Poll) -> Embed {
    let mut embed = base.title("Poll").description(escape_markdown(&poll.name));

    if let Some(options) = poll.options.as_ref().filter(|o| !o.is_empty()) {
        let list = options
            .iter()
            .map(|o| format!("\u{2022} {}", escape_markdown(o)))
            .collect::<Vec<_>>()
            .join("\n");
        embed = embed.field("Options", list, false);
    }
    if let Some(multiple) = poll.multiple_allowed {
        embed = embed.field(
            "Multiple answers",
            if multiple { "Allowed" } else { "Not allowed" },
            true,
        );
    }
    embed
}

/// WhatsApp text for a Discord message: `*name*: text`, then one attachment URL per line.
/// Returns `None` when there is nothing to send.
pub fn whatsapp_text(author: &str, content: &str, attachment_urls: &[String]) -> Option<String> {
    let content = content.trim();
    if content.is_empty() && attachment_urls.is_empty() {
        return None;
    }

    let mut body = format!("*{}*:", author.replace('*', ""));
    if !content.is_empty() {
        body.push(' ');
        body.push_str(content);
    }
    for url in attachment_urls {
        body.push('\n');
        body.push_str(url);
    }
    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_quote() {
        assert_eq!(format_quote(&ContentKind::Text("a *b*".into())), r"> a \*b\*");
        assert_eq!(format_quote(&ContentKind::Unknown), format!("> {UNSUPPORTED}"));
    }

    #[test]
    fn test_poll_embed_fields() {
        let poll = Poll {
            name: "Dinner?".into(),
            options: Some(vec!["Pizza".into(), "Sushi".into()]),
            multiple_allowed: Some(false),
        };
        let embed = poll_embed(Embed::new(), &poll);
        assert_eq!(embed.title.as_deref(), Some("Poll"));
        assert_eq!(embed.fields[0].value, "\u{2022} Pizza\n\u{2022} Sushi");
        assert_eq!(embed.fields[1].value, "Not allowed");
    }

    #[test]
    fn test_whatsapp_text() {
        assert_eq!(whatsapp_text("Bo", "hi", &[]).as_deref(), Some("*Bo*: hi"));
        assert_eq!(
            whatsapp_text("*Bo*", "", &["https://cdn/x.png".into()]).as_deref(),
            Some("*Bo*:\nhttps://cdn/x.png")
        );
        assert_eq!(whatsapp_text("Bo", "   ", &[]), None);
    }
}
