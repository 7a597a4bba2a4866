//! Relay Pipeline Tests
//!
//! A WuzAPI delivery posted to the webhook router travels through the event
//! queue and the relay task into the Discord outlet. WuzAPI itself is mocked.

use super::RecordingOutlet;
use crate::bindings::{BindingConfig, BindingStore, Direction};
use crate::relay::{DiscordMessage, EVENT_QUEUE_CAPACITY, Relay, RelayConfig};
use crate::whatsapp::WuzapiClient;
use crate::whatsapp::webhook::{WebhookState, router};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const TOKEN: &str = "user-token";
const CHAT: &str = "120363@g.us";

struct Pipeline {
    _dir: tempfile::TempDir,
    _server: mockito::ServerGuard,
    _mocks: Vec<mockito::Mock>,
    app: Router,
    store: Arc<BindingStore>,
    relay: Arc<Relay>,
    outlet: Arc<RecordingOutlet>,
    shutdown: CancellationToken,
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn pipeline() -> Pipeline {
    let mut server = mockito::Server::new_async().await;
    let mocks = vec![
        server
            .mock("POST", "/user/avatar")
            .match_header("Token", TOKEN)
            .with_status(200)
            .with_body(r#"{"code":200,"data":{"url":"https://pps.whatsapp.net/ana.jpg"}}"#)
            .create_async()
            .await,
        server
            .mock("POST", "/chat/send/text")
            .match_header("Token", TOKEN)
            .with_status(200)
            .with_body(r#"{"code":200,"data":{"Id":"WA-ECHO"}}"#)
            .create_async()
            .await,
    ];

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(BindingStore::load(dir.path().join("config.json")).await.unwrap());
    store
        .update(|b| {
            b.set(CHAT, 10, BindingConfig::new(Direction::Bidirectional, Some(1)));
            b.set(CHAT, 11, BindingConfig::new(Direction::WhatsAppToDiscord, Some(1)));
        })
        .await
        .unwrap();

    let whatsapp = Arc::new(WuzapiClient::new(&server.url(), TOKEN).unwrap());
    let outlet = Arc::new(RecordingOutlet::new());
    let relay = Arc::new(Relay::new(
        store.clone(),
        whatsapp,
        outlet.clone(),
        RelayConfig::default(),
    ));

    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let shutdown = CancellationToken::new();
    relay.clone().start(rx, shutdown.clone());

    Pipeline {
        _dir: dir,
        _server: server,
        _mocks: mocks,
        app: router(Arc::new(WebhookState::new(TOKEN, tx))),
        store,
        relay,
        outlet,
        shutdown,
    }
}

fn text_event(id: &str, text: &str) -> String {
    json!({
        "type": "Message",
        "event": {
            "Info": {
                "ID": id, "Chat": CHAT, "Sender": "4917@s.whatsapp.net",
                "IsFromMe": false, "PushName": "Ana",
                "Timestamp": "2024-05-01T10:00:00Z"
            },
            "Message": {"conversation": text}
        }
    })
    .to_string()
}

async fn deliver(app: &Router, json: &str, token: &str) -> StatusCode {
    let body = format!("jsonData={}&token={}", urlencoding::encode(json), token);
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

async fn wait_for_sends(outlet: &RecordingOutlet, count: usize) {
    for _ in 0..200 {
        if outlet.sent().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} sends, saw {}", outlet.sent().len());
}

#[tokio::test]
async fn test_text_message_reaches_every_bound_channel() {
    let p = pipeline().await;

    assert_eq!(deliver(&p.app, &text_event("A1", "hello *world*"), TOKEN).await, StatusCode::OK);
    wait_for_sends(&p.outlet, 2).await;

    let sent = p.outlet.sent();
    let channels: Vec<u64> = sent.iter().map(|(c, _)| *c).collect();
    assert_eq!(channels, vec![10, 11]);

    let embed = &sent[0].1.embeds[0];
    assert_eq!(embed.description.as_deref(), Some(r"hello \*world\*"));
    let author = embed.author.as_ref().unwrap();
    assert_eq!(author.name, "Ana");
    assert_eq!(author.icon_url.as_deref(), Some("https://pps.whatsapp.net/ana.jpg"));
}

#[tokio::test]
async fn test_foreign_token_is_rejected() {
    let p = pipeline().await;

    assert_eq!(
        deliver(&p.app, &text_event("A1", "spoofed"), "someone-else").await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(deliver(&p.app, &text_event("A2", "real"), TOKEN).await, StatusCode::OK);
    wait_for_sends(&p.outlet, 2).await;

    assert!(p.outlet.descriptions().iter().all(|d| d.as_deref() == Some("real")));
}

#[tokio::test]
async fn test_own_sends_are_not_echoed_back() {
    let p = pipeline().await;

    let sent = p
        .relay
        .forward_to_whatsapp(&DiscordMessage {
            channel_id: 10,
            author_name: "Bo".into(),
            author_is_bot: false,
            content: "hi from Discord".into(),
            attachment_urls: Vec::new(),
        })
        .await;
    assert_eq!(sent, 1);

    // WuzAPI reports our own message back, then a real one arrives.
    deliver(&p.app, &text_event("WA-ECHO", "*Bo*: hi from Discord"), TOKEN).await;
    deliver(&p.app, &text_event("A3", "reply"), TOKEN).await;
    wait_for_sends(&p.outlet, 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(p.outlet.sent().len(), 2);
    assert!(p.outlet.descriptions().iter().all(|d| d.as_deref() == Some("reply")));
}

#[tokio::test]
async fn test_paused_bindings_drop_messages() {
    let p = pipeline().await;

    p.store.update(|b| b.bindings_paused = true).await.unwrap();
    deliver(&p.app, &text_event("P1", "while paused"), TOKEN).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(p.outlet.sent().is_empty());

    p.store.update(|b| b.bindings_paused = false).await.unwrap();
    deliver(&p.app, &text_event("P2", "after resume"), TOKEN).await;
    wait_for_sends(&p.outlet, 2).await;

    assert!(p.outlet.descriptions().iter().all(|d| d.as_deref() == Some("after resume")));
}
