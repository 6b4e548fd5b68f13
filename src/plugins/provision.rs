//! VPN access provisioning for badges that passed the challenge.
//!
//! `badgectl provision <user>` generates a client token and password and hands
//! both to the client-setup shell script. The `provision` bonus action runs
//! `wg-setup` unless `[actions.programs] provision` points somewhere else, so a
//! wrapper calling this command can be plugged in there.

use crate::core::config::ProvisionConfig;
use crate::core::error::BadgeError;
use rand::Rng;
use rand::seq::SliceRandom;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Read the password alphabet: every non-whitespace char in the file, in order.
pub fn load_charset(path: &Path) -> Result<Vec<char>, BadgeError> {
    let content = fs::read_to_string(path).map_err(|e| {
        BadgeError::ConfigError(format!("cannot read charset {}: {}", path.display(), e))
    })?;
    let chars: Vec<char> = content.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return Err(BadgeError::ConfigError(format!(
            "charset {} is empty",
            path.display()
        )));
    }
    Ok(chars)
}

pub fn generate_password<R: Rng>(rng: &mut R, charset: &[char], len: usize) -> String {
    (0..len)
        .filter_map(|_| charset.choose(rng).copied())
        .collect()
}

/// Uppercase ASCII letters only.
pub fn generate_token<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(rng.gen_range(b'A'..=b'Z'))).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub user: String,
    pub token: String,
    pub password: String,
}

pub fn new_client_credentials(
    config: &ProvisionConfig,
    user: &str,
) -> Result<ClientCredentials, BadgeError> {
    if user.trim().is_empty() {
        return Err(BadgeError::ValidationError("user missing".to_string()));
    }
    let charset = load_charset(&config.charset)?;
    let mut rng = rand::thread_rng();
    Ok(ClientCredentials {
        user: user.to_string(),
        token: generate_token(&mut rng, config.token_len),
        password: generate_password(&mut rng, &charset, config.password_len),
    })
}

/// Generate credentials for `user` and run `sh <script> <user> <token> <password>`.
pub fn provision(config: &ProvisionConfig, user: &str) -> Result<ClientCredentials, BadgeError> {
    let creds = new_client_credentials(config, user)?;

    let output = Command::new("sh")
        .arg(&config.script)
        .arg(&creds.user)
        .arg(&creds.token)
        .arg(&creds.password)
        .output()
        .map_err(|e| BadgeError::ActionDispatch {
            action: "provision".to_string(),
            reason: format!("spawn failed: {}", e),
        })?;

    if !output.status.success() {
        return Err(BadgeError::ActionDispatch {
            action: "provision".to_string(),
            reason: format!(
                "{} exited with {}: {}",
                config.script.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    info!(user = %creds.user, "client provisioned");
    Ok(creds)
}
