//! Settings
//!
//! Layered with the `config` crate: built-in defaults, then the TOML settings
//! file, then `WDMTA__SECTION__KEY` environment variables. Command-line flags
//! are applied last by [`Settings::apply_cli`].

use crate::cli::Cli;
use crate::error::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "WDMTA";
const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// One of critical, error, warning, info, debug.
    pub level: String,
    pub format: LogFormat,
    /// Daily-rotated log file, in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordSettings {
    pub token: Option<String>,
    pub sync_to_guild: Option<u64>,
    /// Admins in addition to the application owner.
    pub owners: Vec<u64>,
    pub allow_all: bool,
    pub reconnect: bool,
    pub enable_test_commands: bool,
}

impl Default for DiscordSettings {
    fn default() -> Self {
        Self {
            token: None,
            sync_to_guild: None,
            owners: Vec::new(),
            allow_all: false,
            reconnect: true,
            enable_test_commands: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WuzapiSettings {
    pub url: String,
    pub token: Option<String>,
    pub webhook_host: String,
    pub webhook_port: u16,
    /// URL registered with WuzAPI. Derived from host and port when unset.
    pub webhook_url: Option<String>,
    pub media_max_size: u64,
    pub message_limit: usize,
    pub dump_file: Option<PathBuf>,
}

impl Default for WuzapiSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            token: None,
            webhook_host: "localhost".to_string(),
            webhook_port: 8000,
            webhook_url: None,
            media_max_size: 10_000_000,
            message_limit: 1000,
            dump_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The bindings JSON file.
    pub bindings_file: PathBuf,
    pub log: LogSettings,
    pub discord: DiscordSettings,
    pub wuzapi: WuzapiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bindings_file: PathBuf::from("config.json"),
            log: LogSettings::default(),
            discord: DiscordSettings::default(),
            wuzapi: WuzapiSettings::default(),
        }
    }
}

impl Settings {
    /// `<config dir>/wdmta/wdmta.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wdmta").join("wdmta.toml"))
    }

    /// Load settings. An explicit `path` must exist; the default location is
    /// optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                tracing::debug!("Loading settings from {}", path.display());
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
            None => {
                if let Some(path) = Self::default_path() {
                    builder = builder.add_source(
                        File::from(path.as_path())
                            .format(FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("discord.owners"),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Override with whatever was given on the command line.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(level) = &cli.log_level {
            self.log.level = level.clone();
        }
        if let Some(format) = cli.log_format {
            self.log.format = format;
        }
        if let Some(file) = &cli.log_file {
            self.log.file = Some(file.clone());
        }
        if let Some(path) = &cli.config {
            self.bindings_file = path.clone();
        }

        if let Some(token) = &cli.token {
            self.discord.token = Some(token.clone());
        }
        if let Some(guild) = cli.sync_to_guild {
            self.discord.sync_to_guild = Some(guild);
        }
        if !cli.owners.is_empty() {
            self.discord.owners = cli.owners.clone();
            self.discord.allow_all = false;
        }
        if cli.allow_all {
            self.discord.allow_all = true;
        }
        if cli.no_reconnect {
            self.discord.reconnect = false;
        }
        if cli.enable_test_commands {
            self.discord.enable_test_commands = true;
        }

        if let Some(url) = &cli.url {
            self.wuzapi.url = url.clone();
        }
        if let Some(token) = &cli.wuzapi_token {
            self.wuzapi.token = Some(token.clone());
        }
        if let Some(host) = &cli.webhook_host {
            self.wuzapi.webhook_host = host.clone();
        }
        if let Some(port) = cli.webhook_port {
            self.wuzapi.webhook_port = port;
        }
        if let Some(url) = &cli.webhook_url {
            self.wuzapi.webhook_url = Some(url.clone());
        }
        if let Some(size) = cli.media_maxsize {
            self.wuzapi.media_max_size = size;
        }
        if let Some(limit) = cli.message_limit {
            self.wuzapi.message_limit = limit;
        }
        if let Some(path) = &cli.dump_file {
            self.wuzapi.dump_file = Some(path.clone());
        }
    }

    pub fn webhook_url(&self) -> String {
        self.wuzapi.webhook_url.clone().unwrap_or_else(|| {
            format!(
                "http://{}:{}/",
                self.wuzapi.webhook_host, self.wuzapi.webhook_port
            )
        })
    }

    /// The initial admin set, or `None` when every user is an admin.
    pub fn admins(&self) -> Option<HashSet<u64>> {
        if self.discord.allow_all && self.discord.owners.is_empty() {
            None
        } else {
            Some(self.discord.owners.iter().copied().collect())
        }
    }

    /// The effective settings as TOML, with tokens hidden.
    pub fn to_redacted_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        let mut shown = self.clone();
        for token in [&mut shown.discord.token, &mut shown.wuzapi.token] {
            if token.is_some() {
                *token = Some(REDACTED.to_string());
            }
        }
        toml::to_string_pretty(&shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn settings_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = settings_file(
            r#"
bindings_file = "/var/lib/wdmta/bindings.json"

[discord]
owners = [1, 2]
reconnect = false

[wuzapi]
webhook_port = 9000
"#,
        );

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.bindings_file, PathBuf::from("/var/lib/wdmta/bindings.json"));
        assert_eq!(settings.discord.owners, vec![1, 2]);
        assert!(!settings.discord.reconnect);
        assert_eq!(settings.wuzapi.webhook_port, 9000);
        // Untouched values keep their defaults.
        assert_eq!(settings.wuzapi.url, "http://127.0.0.1:8080");
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = settings_file("[wuzapi]\nwebhook_host = \"0.0.0.0\"\nwebhook_port = 9000\n");
        let mut settings = Settings::load(Some(file.path())).unwrap();

        let cli = Cli::try_parse_from(["wdmta", "--webhook-port", "7000", "-o", "5", "-L", "debug"])
            .unwrap();
        settings.apply_cli(&cli);

        assert_eq!(settings.wuzapi.webhook_host, "0.0.0.0");
        assert_eq!(settings.wuzapi.webhook_port, 7000);
        assert_eq!(settings.webhook_url(), "http://0.0.0.0:7000/");
        assert_eq!(settings.log.level, "debug");
        assert_eq!(settings.admins(), Some(HashSet::from([5])));
    }

    #[test]
    fn test_admins() {
        let mut settings = Settings::default();
        assert_eq!(settings.admins(), Some(HashSet::new()));
        settings.discord.allow_all = true;
        assert_eq!(settings.admins(), None);
    }

    #[test]
    fn test_redacted_toml_hides_tokens() {
        let mut settings = Settings::default();
        settings.discord.token = Some("secret-discord".into());
        settings.wuzapi.token = Some("secret-wuzapi".into());

        let text = settings.to_redacted_toml().unwrap();
        assert!(!text.contains("secret"));
        assert!(text.contains(REDACTED));
        // Redaction does not touch the settings themselves.
        assert_eq!(settings.discord.token.as_deref(), Some("secret-discord"));
    }
}
