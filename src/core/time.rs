//! Shared timestamp/event helpers.

use ulid::Ulid;

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    format!("{}Z", now_secs() as u64)
}

/// Unix-epoch seconds with sub-second precision, the unit badge timestamps are stored in.
pub fn now_secs() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}
