//! WuzAPI HTTP client
//!
//! Thin typed wrapper over the WuzAPI REST endpoints the relay needs. Every
//! request carries the user token in the `Token` header and every successful
//! response wraps its payload in a `data` object.

use super::WhatsAppApi;
use super::content::Media;
use super::types::{Group, GroupEntry, User, UserEntry};
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Connection state reported by `session/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub connected: bool,
    pub logged_in: bool,
}

pub struct WuzapiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    /// Group JID -> group, filled lazily from `group/list`.
    groups: RwLock<HashMap<String, Group>>,
}

impl WuzapiClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/", base_url.trim_end_matches('/')),
            token: token.into(),
            groups: RwLock::new(HashMap::new()),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Perform a request and return the `data` member of the response.
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method, &url)
            .header("Token", &self.token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Request error at {} (HTTP {}): {}", url, status.as_u16(), body);
            return Err(Error::WuzapiStatus {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let mut payload: Value = response.json().await?;
        Ok(payload.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }

    /// Point WuzAPI's webhook at our receiver.
    pub async fn register_webhook(&self, webhook_url: &str) -> Result<()> {
        tracing::info!("Setting up WuzAPI webhook -> {}", webhook_url);
        let data = self
            .call(
                Method::POST,
                "webhook",
                Some(json!({ "webhookURL": webhook_url })),
            )
            .await?;
        tracing::info!("Webhook setup successful: {}", data);
        Ok(())
    }

    /// Connect the WhatsApp session, subscribing to message events.
    pub async fn connect(&self) -> Result<()> {
        tracing::info!("Connecting to WuzAPI");
        self.call(
            Method::POST,
            "session/connect",
            Some(json!({ "Subscribe": ["Message"], "Immediate": false })),
        )
        .await?;
        Ok(())
    }

    /// Sign out of the WhatsApp session.
    pub async fn disconnect(&self) -> Result<()> {
        tracing::info!("Disconnecting from WhatsApp");
        self.call(Method::POST, "session/disconnect", None).await?;
        Ok(())
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        let data = self.call(Method::GET, "session/status", None).await?;
        let flag = |key: &str| data.get(key).and_then(Value::as_bool).unwrap_or(false);
        Ok(SessionStatus {
            connected: flag("Connected"),
            logged_in: flag("LoggedIn"),
        })
    }

    /// Request a phone pairing (linking) code for `phone` (digits only).
    pub async fn pairing_code(&self, phone: &str) -> Result<String> {
        let data = self
            .call(
                Method::POST,
                "session/pairphone",
                Some(json!({ "Phone": phone })),
            )
            .await?;
        data.get("LinkingCode")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::payload("session/pairphone: missing LinkingCode"))
    }

    async fn refresh_groups(&self) -> Result<()> {
        let data = self.call(Method::GET, "group/list", None).await?;
        let entries: Vec<GroupEntry> = data
            .get("Groups")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();

        tracing::info!("Refreshing group cache ({} groups)", entries.len());

        let mut cache = self.groups.write().await;
        cache.clear();
        for entry in entries {
            let group = Group::from(entry);
            cache.insert(group.jid.clone(), group);
        }
        Ok(())
    }

    /// All joined groups, sorted by name. Served from cache when populated.
    pub async fn groups(&self) -> Result<Vec<Group>> {
        if self.groups.read().await.is_empty() {
            self.refresh_groups().await?;
        }

        let mut groups: Vec<Group> = self.groups.read().await.values().cloned().collect();
        groups.sort_by_key(|g| g.name.to_lowercase());
        Ok(groups)
    }

    /// Case-insensitive lookup of a group by its name.
    pub async fn group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let name = name.to_lowercase();
        Ok(self
            .groups()
            .await?
            .into_iter()
            .find(|g| g.name.to_lowercase() == name))
    }

    /// Name of the group `jid`, refreshing the cache once on a miss.
    pub async fn group_name(&self, jid: &str) -> Result<Option<String>> {
        if let Some(group) = self.groups.read().await.get(jid) {
            return Ok(Some(group.name.clone()));
        }

        self.refresh_groups().await?;
        Ok(self.groups.read().await.get(jid).map(|g| g.name.clone()))
    }

    /// Look up users (known contacts included) by JID.
    pub async fn users(&self, jids: &[String]) -> Result<Vec<(String, User)>> {
        let data = self
            .call(Method::POST, "user/info", Some(json!({ "Phone": jids })))
            .await?;
        let entries: HashMap<String, UserEntry> = data
            .get("Users")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();

        let mut users: Vec<(String, User)> = entries
            .into_iter()
            .map(|(jid, entry)| (jid, User::from(entry)))
            .collect();
        users.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(users)
    }

    pub async fn user_avatar(&self, jid: &str, preview: bool) -> Result<String> {
        let data = self
            .call(
                Method::POST,
                "user/avatar",
                Some(json!({ "Phone": jid, "Preview": preview })),
            )
            .await?;
        ["url", "URL"]
            .iter()
            .find_map(|k| data.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| Error::payload("user/avatar: missing url"))
    }

    /// Download and decrypt a media attachment.
    pub async fn download_media(&self, media: &Media) -> Result<Vec<u8>> {
        let path = format!("chat/download{}", media.download_type());
        tracing::info!("Fetching {} from {}", media.download_type(), media.url);

        let data = self
            .call(
                Method::POST,
                &path,
                Some(json!({
                    "Url": media.url,
                    "Mimetype": media.mimetype,
                    "MediaKey": media.media_key,
                    "FileLength": media.length,
                    "FileSHA256": media.sha256,
                    "FileEncSHA256": media.enc_sha256,
                })),
            )
            .await?;

        let data_url = data
            .get("Data")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::payload(format!("{path}: missing Data")))?;
        decode_data_url(data_url)
    }

    /// Send a text message to a chat; returns the WhatsApp message id.
    pub async fn send_text(&self, chat_jid: &str, body: &str) -> Result<String> {
        let data = self
            .call(
                Method::POST,
                "chat/send/text",
                Some(json!({ "Phone": chat_jid, "Body": body })),
            )
            .await?;
        data.get("Id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::payload("chat/send/text: missing Id"))
    }
}

/// Decode the base64 payload of a `data:<mime>;base64,<payload>` URL.
fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let payload = data_url
        .split_once(',')
        .map(|(_, payload)| payload)
        .unwrap_or(data_url);
    STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::payload(format!("invalid base64 media: {e}")))
}

#[async_trait]
impl WhatsAppApi for WuzapiClient {
    async fn user_avatar(&self, jid: &str, preview: bool) -> Result<String> {
        WuzapiClient::user_avatar(self, jid, preview).await
    }

    async fn download_media(&self, media: &Media) -> Result<Vec<u8>> {
        WuzapiClient::download_media(self, media).await
    }

    async fn send_text(&self, chat_jid: &str, body: &str) -> Result<String> {
        WuzapiClient::send_text(self, chat_jid, body).await
    }
}
