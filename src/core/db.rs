use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn db_connect(db_path: &str) -> Result<Connection, error::BadgeError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::BadgeError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::BadgeError::RusqliteError)?;
    Ok(conn)
}

pub fn challenge_db_path(root: &Path) -> PathBuf {
    root.join(schemas::CHALLENGE_DB_NAME)
}

/// Creates the store root and both tables. Safe to call on every start.
pub fn initialize_challenge_db(root: &Path) -> Result<(), error::BadgeError> {
    fs::create_dir_all(root).map_err(error::BadgeError::IoError)?;
    let db_path = challenge_db_path(root);

    let broker = DbBroker::new(root);
    broker.with_conn(&db_path, "badgectl", "challenge.init", |conn| {
        conn.execute(schemas::CHALLENGE_DB_SCHEMA_PLAYERS, [])?;
        conn.execute(schemas::CHALLENGE_DB_SCHEMA_HIGHSCORES, [])?;
        Ok(())
    })?;

    debug!(path = %db_path.display(), "challenge database ready");
    Ok(())
}
