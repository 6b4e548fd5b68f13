//! Controller configuration loaded from `badgectl.toml`.
//!
//! A missing file is not an error: every field has a default that matches the
//! installation's standard layout.

use crate::core::error::BadgeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_NAME: &str = "badgectl.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub store: StoreConfig,
    pub actions: ActionsConfig,
    pub provision: ProvisionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SerialConfig {
    pub device: PathBuf,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/ttyUSB0"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

/// Where the bonus-action programs live and what they are called.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub dir: PathBuf,
    pub wink_count: u32,
    /// Per-action program overrides, keyed by action name (e.g. `wink = "blink.sh"`).
    pub programs: BTreeMap<String, String>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            wink_count: 5,
            programs: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub charset: PathBuf,
    pub script: PathBuf,
    pub password_len: usize,
    pub token_len: usize,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            charset: PathBuf::from("../share/passchars"),
            script: PathBuf::from("../wireguard/add-client.sh"),
            password_len: 10,
            token_len: 10,
        }
    }
}

/// Load config from an explicit path, or from `badgectl.toml` in `dir` if present.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<Config, BadgeError> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                return Err(BadgeError::ConfigError(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            p.to_path_buf()
        }
        None => {
            let candidate = dir.join(DEFAULT_CONFIG_NAME);
            if !candidate.exists() {
                debug!("no {} found, using defaults", DEFAULT_CONFIG_NAME);
                return Ok(Config::default());
            }
            candidate
        }
    };

    let content = fs::read_to_string(&path).map_err(BadgeError::IoError)?;
    let config: Config = toml::from_str(&content)?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}
