//! Admin gating on the shared bot state.

use super::RecordingOutlet;
use crate::bindings::BindingStore;
use crate::discord::BotState;
use crate::relay::{Relay, RelayConfig};
use crate::whatsapp::WuzapiClient;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn state(admins: Option<HashSet<u64>>) -> (tempfile::TempDir, BotState) {
    let dir = tempfile::tempdir().unwrap();
    let store = BindingStore::load(dir.path().join("config.json")).await.unwrap();
    let whatsapp = Arc::new(WuzapiClient::new("http://127.0.0.1:1", "tok").unwrap());
    let relay = Arc::new(Relay::new(
        Arc::new(store),
        whatsapp.clone(),
        Arc::new(RecordingOutlet::new()),
        RelayConfig::default(),
    ));
    let state = BotState::new(relay, whatsapp, admins, CancellationToken::new());
    (dir, state)
}

#[tokio::test]
async fn test_everyone_is_admin_without_a_list() {
    let (_dir, state) = state(None).await;
    assert!(state.is_admin(1).await);
    assert!(state.is_admin(u64::MAX).await);

    state.add_admin(7).await;
    assert!(state.is_admin(8).await);
}

#[tokio::test]
async fn test_admin_list_is_enforced() {
    let (_dir, state) = state(Some(HashSet::from([5]))).await;
    assert!(state.is_admin(5).await);
    assert!(!state.is_admin(6).await);

    state.add_admin(6).await;
    assert!(state.is_admin(6).await);
    assert!(!state.is_admin(7).await);
}

#[tokio::test]
async fn test_builders_and_relay_share_bindings() {
    let (_dir, state) = state(Some(HashSet::new())).await;
    let state = state.with_sync_guild(Some(42)).with_test_commands(true);

    assert_eq!(state.sync_guild, Some(42));
    assert!(state.test_commands);
    assert!(state.relay.bindings().read().await.is_empty());
    assert!(!state.shutdown.is_cancelled());
}
