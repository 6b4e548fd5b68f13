//! Per-badge credential derivation.
//!
//! Everything here is a pure function of the badge id. The user id is an
//! obfuscated handle and the required error count a lightweight integrity check;
//! neither is a secret.

use crate::core::error::BadgeError;
use sha2::{Digest, Sha256};

const USER_PREFIX: &str = "u0x";
const DIGEST_PREFIX_LEN: usize = 8;

/// `u0x` followed by the first 8 lowercase hex chars of SHA-256 over the id text.
pub fn derive_user_id(rfid: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rfid.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}{}", USER_PREFIX, &digest[..DIGEST_PREFIX_LEN])
}

/// First 8 uppercase hex chars of SHA-256 over the id decoded as hex bytes.
pub fn derive_password(rfid: &str) -> Result<String, BadgeError> {
    let raw = hex::decode(rfid).map_err(|_| BadgeError::InvalidBadgeId(rfid.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&raw);
    let digest = format!("{:X}", hasher.finalize());
    Ok(digest[..DIGEST_PREFIX_LEN].to_string())
}

/// CRC-32 of the id text, reduced into `2..=5`.
pub fn required_error_count(rfid: &str) -> u32 {
    crc32fast::hash(rfid.as_bytes()) % 4 + 2
}

/// The full credential set shown to operators and stored on badge creation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Credentials {
    pub rfid: String,
    pub user_id: String,
    pub password: String,
    pub required_errors: u32,
}

pub fn derive_all(rfid: &str) -> Result<Credentials, BadgeError> {
    Ok(Credentials {
        rfid: rfid.to_string(),
        user_id: derive_user_id(rfid),
        password: derive_password(rfid)?,
        required_errors: required_error_count(rfid),
    })
}
