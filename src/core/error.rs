use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BadgeError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Invalid badge id '{0}': expected hex-encoded bytes")]
    InvalidBadgeId(String),
    #[error("Malformed command: {0:?}")]
    MalformedCommand(String),
    #[error("Unknown badge: {0}")]
    UnknownBadge(String),
    #[error("Action '{action}' failed: {reason}")]
    ActionDispatch { action: String, reason: String },
    #[error("Transport error: {0}")]
    TransportError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}
