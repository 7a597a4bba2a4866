//! Webhook receiver
//!
//! WuzAPI POSTs every subscribed event to the registered URL, either as a
//! form body (`jsonData=<json>&token=<user token>`) or as plain JSON depending
//! on its version. Message events are queued for the relay task; the handler
//! itself never talks to Discord.

use super::types::{Message, MessageEvent};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared state of the webhook routes.
pub struct WebhookState {
    token: String,
    events: mpsc::Sender<Message>,
    dump: Option<Mutex<tokio::fs::File>>,
}

impl WebhookState {
    pub fn new(token: impl Into<String>, events: mpsc::Sender<Message>) -> Self {
        Self {
            token: token.into(),
            events,
            dump: None,
        }
    }

    /// Append every decoded payload to `path`, one JSON document per line.
    pub async fn with_dump_file(mut self, path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        tracing::info!("Dumping webhook payloads to {}", path.display());
        self.dump = Some(Mutex::new(file));
        Ok(self)
    }

    async fn dump(&self, json: &str) {
        let Some(dump) = &self.dump else { return };
        let mut file = dump.lock().await;
        let line = format!("{json}\n");
        if let Err(e) = file.write_all(line.as_bytes()).await {
            tracing::warn!("Failed to write webhook dump: {}", e);
            return;
        }
        let _ = file.flush().await;
    }
}

/// A decoded webhook body.
#[derive(Debug, PartialEq)]
pub(crate) struct Delivery {
    pub json: String,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    event: Value,
}

fn form_decode(value: &str) -> Option<String> {
    urlencoding::decode(&value.replace('+', " "))
        .ok()
        .map(|v| v.into_owned())
}

/// Extract the JSON document (and token, if present) from a webhook body.
pub(crate) fn decode_body(body: &str) -> Option<Delivery> {
    let body = body.trim();
    if body.starts_with('{') {
        let token = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("token").and_then(Value::as_str).map(str::to_string))
            .filter(|t| !t.is_empty());
        return Some(Delivery {
            json: body.to_string(),
            token,
        });
    }

    let mut json = None;
    let mut token = None;
    for pair in body.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "jsonData" => json = form_decode(value),
            "token" => token = form_decode(value).filter(|t| !t.is_empty()),
            _ => {}
        }
    }

    // Some WuzAPI builds percent-encode the payload twice.
    let json = json.map(|j| {
        if serde_json::from_str::<Value>(&j).is_err()
            && let Some(again) = form_decode(&j)
        {
            return again;
        }
        j
    })?;

    Some(Delivery { json, token })
}

async fn receive(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let body = String::from_utf8_lossy(&body);
    let Some(delivery) = decode_body(&body) else {
        tracing::error!("Failed to match webhook data");
        return StatusCode::OK;
    };

    // The body token wins; a `Token` header covers JSON deliveries without one.
    let token = delivery.token.as_deref().or_else(|| {
        headers
            .get("token")
            .and_then(|v| v.to_str().ok())
            .filter(|t| !t.is_empty())
    });
    if token != Some(state.token.as_str()) {
        tracing::warn!(
            "Rejecting webhook delivery with {} token",
            if token.is_some() { "a foreign" } else { "no" }
        );
        return StatusCode::UNAUTHORIZED;
    }

    state.dump(&delivery.json).await;

    let envelope: Envelope = match serde_json::from_str(&delivery.json) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!("Failed to decode webhook JSON: {}", e);
            return StatusCode::OK;
        }
    };

    match envelope.kind.as_str() {
        "Message" => match serde_json::from_value::<MessageEvent>(envelope.event) {
            Ok(event) => {
                let message = Message::from(event);
                tracing::info!(
                    "Received WhatsApp message {} in {}: {:?}",
                    message.id,
                    message.chat_id,
                    message.content.kind
                );
                if state.events.send(message).await.is_err() {
                    tracing::warn!("Relay queue closed, dropping WhatsApp message");
                    return StatusCode::SERVICE_UNAVAILABLE;
                }
            }
            Err(e) => tracing::error!("Malformed Message event: {}", e),
        },
        other => tracing::info!("Ignoring unknown event: {}", other),
    }

    StatusCode::OK
}

pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/", post(receive))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the webhook routes until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: Arc<WebhookState>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Webhook server listening on {}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
