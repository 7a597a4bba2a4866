//! WhatsApp domain types and their WuzAPI wire representations.

use super::content::Content;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// A WhatsApp chat message delivered by a WuzAPI `Message` event.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub push_name: String,
    pub is_from_me: bool,
    pub timestamp: DateTime<Utc>,
    pub is_view_once: bool,
    pub is_ephemeral: bool,
    pub is_edit: bool,
    pub content: Content,
}

/// A WhatsApp group chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub jid: String,
    pub name: String,
    pub name_set_at: DateTime<Utc>,
    pub topic: Option<String>,
    pub topic_set_at: Option<DateTime<Utc>>,
    pub is_announce: bool,
    pub is_ephemeral: bool,
    pub is_locked: bool,
}

/// Public profile information of a WhatsApp user.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub status: String,
    pub verified_name: Option<String>,
    pub verified_name_issuer: Option<String>,
}

/// `Info` block of a message event.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageInfo {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Chat")]
    chat: String,
    #[serde(rename = "Sender")]
    sender: String,
    #[serde(rename = "IsFromMe", default)]
    is_from_me: bool,
    #[serde(rename = "PushName", default)]
    push_name: String,
    #[serde(rename = "Timestamp")]
    timestamp: DateTime<Utc>,
}

/// `event` object of a WuzAPI `Message` webhook.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageEvent {
    #[serde(rename = "Info")]
    info: MessageInfo,
    #[serde(rename = "Message", default)]
    message: Value,
    #[serde(rename = "IsEphemeral", default)]
    is_ephemeral: bool,
    #[serde(rename = "IsViewOnce", default)]
    is_view_once: bool,
    #[serde(rename = "IsViewOnceV2", default)]
    is_view_once_v2: bool,
    #[serde(rename = "IsViewOnceV2Extension", default)]
    is_view_once_v2_extension: bool,
    #[serde(rename = "IsEdit", default)]
    is_edit: bool,
}

impl From<MessageEvent> for Message {
    fn from(event: MessageEvent) -> Self {
        let info = event.info;
        Self {
            content: Content::from_raw(&event.message),
            id: info.id,
            chat_id: info.chat,
            sender_id: info.sender,
            push_name: info.push_name,
            is_from_me: info.is_from_me,
            timestamp: info.timestamp,
            is_view_once: event.is_view_once
                || event.is_view_once_v2
                || event.is_view_once_v2_extension,
            is_ephemeral: event.is_ephemeral,
            is_edit: event.is_edit,
        }
    }
}

/// Entry of `group/list`.
#[derive(Debug, Deserialize)]
pub(crate) struct GroupEntry {
    #[serde(rename = "JID")]
    jid: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "NameSetAt")]
    name_set_at: DateTime<Utc>,
    #[serde(rename = "Topic", default)]
    topic: String,
    #[serde(rename = "TopicSetAt")]
    topic_set_at: Option<DateTime<Utc>>,
    #[serde(rename = "IsAnnounce", default)]
    is_announce: bool,
    #[serde(rename = "IsEphemeral", default)]
    is_ephemeral: bool,
    #[serde(rename = "IsLocked", default)]
    is_locked: bool,
}

impl From<GroupEntry> for Group {
    fn from(entry: GroupEntry) -> Self {
        let has_topic = !entry.topic.is_empty();
        Self {
            jid: entry.jid,
            name: entry.name,
            name_set_at: entry.name_set_at,
            topic_set_at: entry.topic_set_at.filter(|_| has_topic),
            topic: has_topic.then_some(entry.topic),
            is_announce: entry.is_announce,
            is_ephemeral: entry.is_ephemeral,
            is_locked: entry.is_locked,
        }
    }
}

/// Entry of `user/info`.
#[derive(Debug, Deserialize)]
pub(crate) struct UserEntry {
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "VerifiedName", default)]
    verified_name: Option<Value>,
}

impl From<UserEntry> for User {
    fn from(entry: UserEntry) -> Self {
        let field = |key: &str| {
            entry
                .verified_name
                .as_ref()
                .and_then(|v| v.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            verified_name: field("verifiedName"),
            verified_name_issuer: field("issuer"),
            status: entry.status,
        }
    }
}

/// Build the user JID for a phone number given as digits.
pub fn user_jid(phone: &str) -> String {
    format!("{}@s.whatsapp.net", phone.trim().trim_start_matches('+'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whatsapp::content::ContentKind;
    use serde_json::json;

    #[test]
    fn test_message_from_event() {
        let event: MessageEvent = serde_json::from_value(json!({
            "Info": {
                "ID": "3EB0",
                "Chat": "123@g.us",
                "Sender": "456@s.whatsapp.net",
                "IsFromMe": false,
                "PushName": "Ana",
                "Timestamp": "2024-05-01T12:00:00+02:00"
            },
            "Message": {"conversation": "hi"},
            "IsViewOnceV2": true
        }))
        .unwrap();

        let message = Message::from(event);
        assert_eq!(message.id, "3EB0");
        assert_eq!(message.chat_id, "123@g.us");
        assert_eq!(message.push_name, "Ana");
        assert_eq!(message.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert!(message.is_view_once);
        assert!(!message.is_edit);
        assert_eq!(message.content.kind, ContentKind::Text("hi".into()));
    }

    #[test]
    fn test_group_without_topic_drops_topic_time() {
        let entry: GroupEntry = serde_json::from_value(json!({
            "JID": "123@g.us",
            "Name": "Family",
            "NameSetAt": "2023-01-01T00:00:00Z",
            "Topic": "",
            "TopicSetAt": "0001-01-01T00:00:00Z",
            "IsAnnounce": true
        }))
        .unwrap();

        let group = Group::from(entry);
        assert_eq!(group.name, "Family");
        assert!(group.topic.is_none());
        assert!(group.topic_set_at.is_none());
        assert!(group.is_announce);
    }

    #[test]
    fn test_user_verified_name() {
        let entry: UserEntry = serde_json::from_value(json!({
            "Status": "Busy",
            "VerifiedName": {"verifiedName": "Shop", "issuer": "smb"}
        }))
        .unwrap();
        let user = User::from(entry);
        assert_eq!(user.status, "Busy");
        assert_eq!(user.verified_name.as_deref(), Some("Shop"));
        assert_eq!(user.verified_name_issuer.as_deref(), Some("smb"));
    }

    #[test]
    fn test_user_jid() {
        assert_eq!(user_jid(" +4915112345 "), "4915112345@s.whatsapp.net");
    }
}
