//! Chat/channel bindings
//!
//! Which WhatsApp chat forwards to which Discord channel, in which direction.
//! The whole table lives in one JSON file that is rewritten after every
//! mutation:
//!
//! ```json
//! {"bindings_paused": false,
//!  "bindings": {"123@g.us": {"4567": {"discord_to_whatsapp": true, "whatsapp_to_discord": true}}}}
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{RwLock, RwLockReadGuard};

/// Per-binding forwarding flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    #[serde(default)]
    pub discord_to_whatsapp: bool,
    #[serde(default)]
    pub whatsapp_to_discord: bool,
    /// Guild owning the channel; absent for bindings written by older versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
}

impl BindingConfig {
    pub fn new(direction: Direction, guild_id: Option<u64>) -> Self {
        Self {
            discord_to_whatsapp: matches!(
                direction,
                Direction::DiscordToWhatsApp | Direction::Bidirectional
            ),
            whatsapp_to_discord: matches!(
                direction,
                Direction::WhatsAppToDiscord | Direction::Bidirectional
            ),
            guild_id,
        }
    }

    /// `W <-> D` style arrow used in listings.
    pub fn arrow(&self) -> String {
        format!(
            "W {}-{} D",
            if self.discord_to_whatsapp { "<" } else { "" },
            if self.whatsapp_to_discord { ">" } else { "" }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    DiscordToWhatsApp,
    WhatsAppToDiscord,
    Bidirectional,
}

impl Direction {
    pub const ALL: [Direction; 3] = [
        Direction::DiscordToWhatsApp,
        Direction::WhatsAppToDiscord,
        Direction::Bidirectional,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::DiscordToWhatsApp => "Discord to WhatsApp",
            Self::WhatsAppToDiscord => "WhatsApp to Discord",
            Self::Bidirectional => "Bidirectional",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.label() == label)
    }
}

/// The persisted binding table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    #[serde(default)]
    pub bindings_paused: bool,
    /// Chat JID -> Discord channel id -> flags.
    #[serde(default)]
    pub bindings: BTreeMap<String, BTreeMap<u64, BindingConfig>>,
}

impl Bindings {
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Create or update a binding. Returns `true` when an existing binding was updated.
    pub fn set(&mut self, chat_jid: &str, channel_id: u64, config: BindingConfig) -> bool {
        self.bindings
            .entry(chat_jid.to_string())
            .or_default()
            .insert(channel_id, config)
            .is_some()
    }

    /// Remove every binding of `channel_id`. Returns the chats it was bound to.
    pub fn remove_channel(&mut self, channel_id: u64) -> Vec<String> {
        let mut chats = Vec::new();
        for (chat, channels) in self.bindings.iter_mut() {
            if channels.remove(&channel_id).is_some() {
                chats.push(chat.clone());
            }
        }
        self.prune();
        chats
    }

    /// Remove every binding matching `pred`. Returns the removed `(chat, channel)` pairs.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<(String, u64)>
    where
        F: FnMut(&str, u64, &BindingConfig) -> bool,
    {
        let mut removed = Vec::new();
        for (chat, channels) in self.bindings.iter_mut() {
            channels.retain(|&channel, config| {
                let drop = pred(chat, channel, config);
                if drop {
                    removed.push((chat.clone(), channel));
                }
                !drop
            });
        }
        self.prune();
        removed
    }

    /// Channels that receive messages from `chat_jid`.
    pub fn discord_targets(&self, chat_jid: &str) -> Vec<u64> {
        self.bindings
            .get(chat_jid)
            .map(|channels| {
                channels
                    .iter()
                    .filter(|(_, c)| c.whatsapp_to_discord)
                    .map(|(&id, _)| id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Chats that receive messages posted in `channel_id`.
    pub fn whatsapp_targets(&self, channel_id: u64) -> Vec<String> {
        self.bindings
            .iter()
            .filter(|(_, channels)| {
                channels
                    .get(&channel_id)
                    .is_some_and(|c| c.discord_to_whatsapp)
            })
            .map(|(chat, _)| chat.clone())
            .collect()
    }

    fn prune(&mut self) {
        self.bindings.retain(|_, channels| !channels.is_empty());
    }
}

/// [`Bindings`] backed by a JSON file.
pub struct BindingStore {
    path: PathBuf,
    state: RwLock<Bindings>,
}

impl BindingStore {
    /// Load the bindings file, starting empty when it does not exist.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                tracing::info!("Loading bindings from {}", path.display());
                serde_json::from_str(&text)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("Creating empty bindings configuration");
                Bindings::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Bindings> {
        self.state.read().await
    }

    /// Apply `f` and persist the result. The write lock is held across the
    /// save so concurrent updates are written in order. Nothing changes in
    /// memory unless the save succeeds.
    pub async fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Bindings) -> R,
    {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let result = f(&mut next);
        self.save(&next).await?;
        *state = next;
        Ok(result)
    }

    async fn save(&self, bindings: &Bindings) -> Result<()> {
        tracing::info!("Saving bindings to {}", self.path.display());

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(bindings)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = r#"{
        "bindings_paused": true,
        "bindings": {"123@g.us": {"4567": {"discord_to_whatsapp": false, "whatsapp_to_discord": true}}}
    }"#;

    #[test]
    fn test_direction_labels_round_trip() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_label(direction.label()), Some(direction));
        }
        assert_eq!(Direction::from_label("sideways"), None);
    }

    #[test]
    fn test_config_from_direction() {
        let both = BindingConfig::new(Direction::Bidirectional, Some(9));
        assert!(both.discord_to_whatsapp && both.whatsapp_to_discord);
        assert_eq!(both.arrow(), "W <-> D");

        let inbound = BindingConfig::new(Direction::WhatsAppToDiscord, None);
        assert!(!inbound.discord_to_whatsapp && inbound.whatsapp_to_discord);
        assert_eq!(inbound.arrow(), "W -> D");
    }

    #[test]
    fn test_legacy_format_parses() {
        let bindings: Bindings = serde_json::from_str(LEGACY).unwrap();
        assert!(bindings.bindings_paused);
        assert_eq!(bindings.discord_targets("123@g.us"), vec![4567]);
        assert!(bindings.whatsapp_targets(4567).is_empty());
        assert_eq!(bindings.bindings["123@g.us"][&4567].guild_id, None);

        assert_eq!(serde_json::from_str::<Bindings>("{}").unwrap(), Bindings::default());
    }

    #[test]
    fn test_set_reports_update() {
        let mut bindings = Bindings::default();
        let config = BindingConfig::new(Direction::WhatsAppToDiscord, None);
        assert!(!bindings.set("1@g.us", 10, config));
        let config = BindingConfig::new(Direction::Bidirectional, None);
        assert!(bindings.set("1@g.us", 10, config));
        assert_eq!(bindings.whatsapp_targets(10), vec!["1@g.us".to_string()]);
    }

    #[test]
    fn test_remove_channel_prunes_empty_chats() {
        let mut bindings = Bindings::default();
        let config = BindingConfig::new(Direction::Bidirectional, None);
        bindings.set("1@g.us", 10, config);
        bindings.set("1@g.us", 11, config);
        bindings.set("2@g.us", 10, config);

        assert_eq!(
            bindings.remove_channel(10),
            vec!["1@g.us".to_string(), "2@g.us".to_string()]
        );
        assert_eq!(bindings.bindings.len(), 1);
        assert!(bindings.remove_channel(10).is_empty());
    }

    #[test]
    fn test_remove_where_by_guild() {
        let mut bindings = Bindings::default();
        bindings.set("1@g.us", 10, BindingConfig::new(Direction::Bidirectional, Some(1)));
        bindings.set("1@g.us", 11, BindingConfig::new(Direction::Bidirectional, Some(2)));

        let removed = bindings.remove_where(|_, _, c| c.guild_id == Some(1));
        assert_eq!(removed, vec![("1@g.us".to_string(), 10)]);
        assert_eq!(bindings.discord_targets("1@g.us"), vec![11]);
    }

    #[tokio::test]
    async fn test_store_persists_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let store = BindingStore::load(&path).await.unwrap();
        assert!(store.read().await.is_empty());

        let updated = store
            .update(|b| b.set("1@g.us", 10, BindingConfig::new(Direction::Bidirectional, Some(3))))
            .await
            .unwrap();
        assert!(!updated);
        store.update(|b| b.bindings_paused = true).await.unwrap();

        let reloaded = BindingStore::load(&path).await.unwrap();
        let bindings = reloaded.read().await;
        assert!(bindings.bindings_paused);
        assert_eq!(bindings.bindings["1@g.us"][&10].guild_id, Some(3));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = BindingStore::load(&path).await.unwrap();

        // A directory in the way of the temporary file makes the write fail.
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
        let result = store
            .update(|b| b.set("1@g.us", 10, BindingConfig::new(Direction::Bidirectional, None)))
            .await;

        assert!(result.is_err());
        assert!(store.read().await.discord_targets("1@g.us").is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(BindingStore::load(&path).await.is_err());
    }
}
