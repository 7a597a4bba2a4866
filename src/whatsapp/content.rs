//! Message content parsing
//!
//! WuzAPI forwards whatsmeow's protobuf `Message` as JSON. Exactly one key of
//! that object names the content type; everything we cannot interpret is kept
//! as [`ContentKind::Unknown`] so a malformed event never aborts the webhook.

use serde_json::Value;

/// Parsed message content, plus the message it quotes (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub kind: ContentKind,
    pub quote: Option<Quote>,
}

/// A quoted ("replied to") message embedded in `contextInfo`.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    /// WhatsApp id of the quoted message, when WuzAPI provides it.
    pub id: Option<String>,
    pub kind: Box<ContentKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentKind {
    Text(String),
    Reaction {
        target_id: String,
        /// `None` when the reaction was removed.
        emoji: Option<String>,
    },
    Media(Media),
    Poll(Poll),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Sticker,
    Document,
    Audio,
}

/// Encrypted media reference; WuzAPI needs every field back to download it.
#[derive(Debug, Clone, PartialEq)]
pub struct Media {
    pub kind: MediaKind,
    pub caption: Option<String>,
    pub url: String,
    pub mimetype: String,
    pub media_key: String,
    pub length: u64,
    pub sha256: String,
    pub enc_sha256: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Poll {
    pub name: String,
    pub options: Option<Vec<String>>,
    pub multiple_allowed: Option<bool>,
}

impl Content {
    pub fn unknown() -> Self {
        Self {
            kind: ContentKind::Unknown,
            quote: None,
        }
    }

    /// Parse the raw `Message` object of a WuzAPI event.
    pub fn from_raw(raw: &Value) -> Self {
        let Some(fields) = raw.as_object() else {
            return Self::unknown();
        };

        for (key, data) in fields {
            if let Some(kind) = ContentKind::from_keyed(key, data) {
                return Self {
                    kind,
                    quote: Quote::from_data(data),
                };
            }
        }

        Self::unknown()
    }
}

impl Quote {
    fn from_data(data: &Value) -> Option<Self> {
        let context = data.get("contextInfo")?;
        let quoted = context.get("quotedMessage")?;
        let id = ["stanzaID", "stanzaId"]
            .iter()
            .find_map(|k| context.get(*k).and_then(Value::as_str))
            .map(str::to_string);

        Some(Self {
            id,
            kind: Box::new(Content::from_raw(quoted).kind),
        })
    }
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

impl ContentKind {
    /// Returns `None` when `key` is not a content key at all, and
    /// `Some(Unknown)` when it is one but the payload is malformed.
    fn from_keyed(key: &str, data: &Value) -> Option<Self> {
        let parsed = match key {
            "conversation" => data.as_str().map(|s| Self::Text(s.to_string())),
            "extendedTextMessage" => str_field(data, "text").map(Self::Text),
            "reactionMessage" => Self::reaction(data),
            "imageMessage" => Media::parse(MediaKind::Image, data).map(Self::Media),
            "videoMessage" => Media::parse(MediaKind::Video, data).map(Self::Media),
            "stickerMessage" => Media::parse(MediaKind::Sticker, data).map(Self::Media),
            "documentMessage" => Media::parse(MediaKind::Document, data).map(Self::Media),
            "audioMessage" => Media::parse(MediaKind::Audio, data).map(Self::Media),
            "pollCreationMessage" | "pollCreationMessageV3" => Poll::parse(data).map(Self::Poll),
            _ => return None,
        };

        if parsed.is_none() {
            tracing::debug!("Malformed '{}' content, treating as unknown", key);
        }

        Some(parsed.unwrap_or(Self::Unknown))
    }

    fn reaction(data: &Value) -> Option<Self> {
        let target_id = data.get("key")?.get("ID")?.as_str()?.to_string();
        let emoji = str_field(data, "text").filter(|t| !t.is_empty());
        Some(Self::Reaction { target_id, emoji })
    }

    /// Short text used when this content is shown as a quote.
    pub fn summary(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Poll(poll) => Some(&poll.name),
            _ => None,
        }
    }
}

impl Media {
    fn parse(kind: MediaKind, data: &Value) -> Option<Self> {
        Some(Self {
            kind,
            caption: str_field(data, "caption").filter(|c| !c.is_empty()),
            url: str_field(data, "URL")?,
            mimetype: str_field(data, "mimetype")?,
            media_key: str_field(data, "mediaKey")?,
            length: data.get("fileLength")?.as_u64()?,
            sha256: str_field(data, "fileSHA256")?,
            enc_sha256: str_field(data, "fileEncSHA256")?,
        })
    }

    /// Suffix of WuzAPI's `chat/download<type>` endpoint.
    pub fn download_type(&self) -> &str {
        match self.mimetype.split('/').next().unwrap_or_default() {
            "application" | "" => "document",
            major => major,
        }
    }

    /// File extension derived from the MIME subtype (`audio/ogg; codecs=opus` -> `ogg`).
    pub fn extension(&self) -> &str {
        self.mimetype
            .split_once('/')
            .map(|(_, sub)| sub.split(';').next().unwrap_or(sub).trim())
            .filter(|ext| !ext.is_empty())
            .unwrap_or("bin")
    }
}

impl Poll {
    fn parse(data: &Value) -> Option<Self> {
        let name = str_field(data, "name")?;
        let options = data.get("options").and_then(Value::as_array).map(|opts| {
            opts.iter()
                .filter_map(|o| str_field(o, "optionName"))
                .collect()
        });
        let multiple_allowed = data
            .get("selectableOptionsCount")
            .and_then(Value::as_u64)
            .map(|count| count == 0);

        Some(Self {
            name,
            options,
            multiple_allowed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn media_json() -> Value {
        json!({
            "URL": "https://mmg.whatsapp.net/x",
            "mimetype": "image/jpeg",
            "mediaKey": "a2V5",
            "fileLength": 2048,
            "fileSHA256": "c2hh",
            "fileEncSHA256": "ZW5j",
            "caption": "look"
        })
    }

    #[test]
    fn test_conversation_is_text() {
        let content = Content::from_raw(&json!({"conversation": "hello"}));
        assert_eq!(content.kind, ContentKind::Text("hello".into()));
        assert!(content.quote.is_none());
    }

    #[test]
    fn test_extended_text_with_quote() {
        let content = Content::from_raw(&json!({
            "extendedTextMessage": {
                "text": "agreed",
                "contextInfo": {
                    "stanzaID": "3EB0ABC",
                    "quotedMessage": {"conversation": "lunch?"}
                }
            }
        }));

        assert_eq!(content.kind, ContentKind::Text("agreed".into()));
        let quote = content.quote.unwrap();
        assert_eq!(quote.id.as_deref(), Some("3EB0ABC"));
        assert_eq!(quote.kind.summary(), Some("lunch?"));
    }

    #[test]
    fn test_reaction_added_and_removed() {
        let added = Content::from_raw(&json!({
            "reactionMessage": {"key": {"ID": "M1"}, "text": "👍"}
        }));
        assert_eq!(
            added.kind,
            ContentKind::Reaction {
                target_id: "M1".into(),
                emoji: Some("👍".into())
            }
        );

        let removed = Content::from_raw(&json!({
            "reactionMessage": {"key": {"ID": "M1"}, "text": ""}
        }));
        assert_eq!(
            removed.kind,
            ContentKind::Reaction {
                target_id: "M1".into(),
                emoji: None
            }
        );
    }

    #[test]
    fn test_image_media() {
        let content = Content::from_raw(&json!({"imageMessage": media_json()}));
        let ContentKind::Media(media) = content.kind else {
            panic!("expected media");
        };
        assert_eq!(media.kind, MediaKind::Image);
        assert_eq!(media.caption.as_deref(), Some("look"));
        assert_eq!(media.length, 2048);
        assert_eq!(media.download_type(), "image");
        assert_eq!(media.extension(), "jpeg");
    }

    #[test]
    fn test_media_download_type_and_extension() {
        let mut media = match Content::from_raw(&json!({"documentMessage": media_json()})).kind {
            ContentKind::Media(m) => m,
            other => panic!("unexpected {other:?}"),
        };
        media.mimetype = "application/pdf".into();
        assert_eq!(media.download_type(), "document");
        assert_eq!(media.extension(), "pdf");

        media.mimetype = "audio/ogg; codecs=opus".into();
        assert_eq!(media.download_type(), "audio");
        assert_eq!(media.extension(), "ogg");
    }

    #[test]
    fn test_malformed_media_is_unknown() {
        let content = Content::from_raw(&json!({"videoMessage": {"URL": "x"}}));
        assert_eq!(content.kind, ContentKind::Unknown);
    }

    #[test]
    fn test_poll() {
        let content = Content::from_raw(&json!({
            "pollCreationMessageV3": {
                "name": "Dinner?",
                "options": [{"optionName": "Pizza"}, {"optionName": "Sushi"}],
                "selectableOptionsCount": 0
            }
        }));
        assert_eq!(
            content.kind,
            ContentKind::Poll(Poll {
                name: "Dinner?".into(),
                options: Some(vec!["Pizza".into(), "Sushi".into()]),
                multiple_allowed: Some(true),
            })
        );
    }

    #[test]
    fn test_unrecognised_keys_are_unknown() {
        let content = Content::from_raw(&json!({
            "messageContextInfo": {},
            "protocolMessage": {"type": 0}
        }));
        assert_eq!(content, Content::unknown());
        assert_eq!(Content::from_raw(&json!("nope")), Content::unknown());
    }
}
