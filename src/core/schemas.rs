//! Database schema definitions.
//!
//! Both tables live in a single SQLite file, `challenge.db`, under the store root:
//! 1. `challenge`: one progression record per badge ever seen.
//! 2. `highscores`: append-only kids-game outcomes.

pub const CHALLENGE_DB_NAME: &str = "challenge.db";

pub const CHALLENGE_DB_SCHEMA_PLAYERS: &str = "
    CREATE TABLE IF NOT EXISTS challenge (
        id INTEGER PRIMARY KEY,
        rfid TEXT NOT NULL UNIQUE,
        start_ts REAL NOT NULL,
        result_ts REAL,
        user TEXT NOT NULL,
        pass TEXT NOT NULL,
        level INTEGER NOT NULL DEFAULT 1 CHECK (level BETWEEN 1 AND 7),
        token TEXT
    )
";

pub const CHALLENGE_DB_SCHEMA_HIGHSCORES: &str = "
    CREATE TABLE IF NOT EXISTS highscores (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts REAL NOT NULL,
        errors INTEGER NOT NULL,
        result REAL NOT NULL,
        token TEXT NOT NULL DEFAULT ''
    )
";

pub const BROKER_EVENTS_NAME: &str = "broker.events.jsonl";
pub const ACTION_EVENTS_NAME: &str = "actions.events.jsonl";
