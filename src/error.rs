//! Crate-wide error type.

use thiserror::Error;

/// Errors produced by the relay, the WuzAPI client and the bindings store.
#[derive(Debug, Error)]
#[allow(clippy::large_enum_variant)] // serenity::Error is large but rarely constructed
pub enum Error {
    #[error("WuzAPI request to '{endpoint}' failed with HTTP {status}: {body}")]
    WuzapiStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("WuzAPI transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected WuzAPI payload: {0}")]
    Payload(String),

    #[error("Discord API error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("bindings file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("media exceeds size limit ({limit} bytes)")]
    MediaTooLarge { limit: u64 },
}

impl Error {
    /// Shorthand for a payload that did not have the expected shape.
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::Payload(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
