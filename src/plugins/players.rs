//! Badge progression records.
//!
//! One row per badge ever seen, keyed by the RFID string. Credentials are
//! derived once at insert and never rewritten.

use crate::core::broker::DbBroker;
use crate::core::credentials;
use crate::core::db;
use crate::core::error::BadgeError;
use crate::core::store::Store;
use crate::core::time;
use clap::{Parser, Subcommand};
use colored::Colorize;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Stage of a badge in the seven-step progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Seen once; the challenge is open.
    Registered = 1,
    ChallengePassed = 2,
    DecryptionHint = 3,
    Stage4 = 4,
    Stage5 = 5,
    /// Every station cleared; the next announce issues the voucher.
    VoucherReady = 6,
    /// Voucher issued. Terminal.
    Redeemed = 7,
}

impl Level {
    pub const ALL: [Level; 7] = [
        Level::Registered,
        Level::ChallengePassed,
        Level::DecryptionHint,
        Level::Stage4,
        Level::Stage5,
        Level::VoucherReady,
        Level::Redeemed,
    ];

    pub fn number(self) -> i64 {
        self as i64
    }

    pub fn from_number(n: i64) -> Option<Level> {
        Level::ALL.into_iter().find(|l| l.number() == n)
    }
}

impl TryFrom<i64> for Level {
    type Error = BadgeError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        Level::from_number(n)
            .ok_or_else(|| BadgeError::ValidationError(format!("level {} outside 1..=7", n)))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadgeRecord {
    pub rfid: String,
    pub user_id: String,
    pub password: String,
    pub level: Level,
    pub start_ts: f64,
    pub result_ts: Option<f64>,
    pub token: Option<String>,
}

impl BadgeRecord {
    /// Whole seconds from creation to completion; 0 while unfinished.
    pub fn duration_secs(&self) -> i64 {
        match self.result_ts {
            Some(done) => (done - self.start_ts).trunc().max(0.0) as i64,
            None => 0,
        }
    }
}

/// Persistence interface the progression machine consumes.
pub trait PlayerStore {
    /// Create a level-1 record with freshly derived credentials.
    fn insert(&self, rfid: &str) -> Result<BadgeRecord, BadgeError>;
    fn fetch(&self, rfid: &str) -> Result<Option<BadgeRecord>, BadgeError>;
    /// Moving to [`Level::Redeemed`] also stamps the completion time of this badge.
    fn set_level(&self, rfid: &str, level: Level) -> Result<(), BadgeError>;
    /// Stamp the completion time if it is not set yet.
    fn record_result(&self, rfid: &str) -> Result<(), BadgeError>;
}

/// [`PlayerStore`] over the `challenge` table, one connection per call.
pub struct SqlitePlayerStore {
    root: PathBuf,
    db_path: PathBuf,
}

impl SqlitePlayerStore {
    pub fn new(store: &Store) -> Self {
        Self {
            root: store.root.clone(),
            db_path: db::challenge_db_path(&store.root),
        }
    }

    fn broker(&self) -> DbBroker {
        DbBroker::new(&self.root)
    }
}

const RESULT_STAMP_SQL: &str =
    "UPDATE challenge SET result_ts = ?1 WHERE rfid = ?2 AND result_ts IS NULL";

impl PlayerStore for SqlitePlayerStore {
    fn insert(&self, rfid: &str) -> Result<BadgeRecord, BadgeError> {
        let creds = credentials::derive_all(rfid)?;
        let record = BadgeRecord {
            rfid: rfid.to_string(),
            user_id: creds.user_id,
            password: creds.password,
            level: Level::Registered,
            start_ts: time::now_secs(),
            result_ts: None,
            token: None,
        };

        self.broker()
            .with_conn(&self.db_path, "badgectl", "players.insert", |conn| {
                conn.execute(
                    "INSERT INTO challenge(rfid, user, pass, level, start_ts) VALUES(?1, ?2, ?3, ?4, ?5)",
                    params![
                        record.rfid,
                        record.user_id,
                        record.password,
                        record.level.number(),
                        record.start_ts
                    ],
                )?;
                Ok(())
            })?;
        Ok(record)
    }

    fn fetch(&self, rfid: &str) -> Result<Option<BadgeRecord>, BadgeError> {
        let row = self
            .broker()
            .with_conn(&self.db_path, "badgectl", "players.fetch", |conn| {
                let row = conn
                    .query_row(
                        "SELECT rfid, user, pass, level, start_ts, result_ts, token FROM challenge WHERE rfid = ?1",
                        params![rfid],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, i64>(3)?,
                                row.get::<_, f64>(4)?,
                                row.get::<_, Option<f64>>(5)?,
                                row.get::<_, Option<String>>(6)?,
                            ))
                        },
                    )
                    .optional()?;
                Ok(row)
            })?;

        let Some((rfid, user_id, password, level, start_ts, result_ts, token)) = row else {
            return Ok(None);
        };
        Ok(Some(BadgeRecord {
            rfid,
            user_id,
            password,
            level: Level::try_from(level)?,
            start_ts,
            result_ts,
            token,
        }))
    }

    fn set_level(&self, rfid: &str, level: Level) -> Result<(), BadgeError> {
        self.broker()
            .with_conn(&self.db_path, "badgectl", "players.set_level", |conn| {
                let changed = conn.execute(
                    "UPDATE challenge SET level = ?1 WHERE rfid = ?2",
                    params![level.number(), rfid],
                )?;
                if changed == 0 {
                    return Err(BadgeError::NotFound(format!("badge {}", rfid)));
                }
                Ok(())
            })?;
        if level == Level::Redeemed {
            self.record_result(rfid)?;
        }
        Ok(())
    }

    fn record_result(&self, rfid: &str) -> Result<(), BadgeError> {
        let now = time::now_secs();
        self.broker()
            .with_conn(&self.db_path, "badgectl", "players.record_result", |conn| {
                conn.execute(RESULT_STAMP_SQL, params![now, rfid])?;
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM challenge WHERE rfid = ?1)",
                    params![rfid],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(BadgeError::NotFound(format!("badge {}", rfid)));
                }
                Ok(())
            })
    }
}

#[derive(Parser, Debug)]
#[clap(name = "badge", about = "Inspect or advance badge records")]
pub struct BadgeCli {
    #[clap(subcommand)]
    pub command: BadgeCommand,
}

#[derive(Subcommand, Debug)]
pub enum BadgeCommand {
    /// Show one badge record.
    Show {
        rfid: String,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Raise a badge to a later level (stations 3 to 6 unlock these).
    Promote {
        rfid: String,
        #[clap(long)]
        level: i64,
    },
}

pub fn run_badge_cli(store: &Store, cli: BadgeCli) -> Result<(), BadgeError> {
    let players = SqlitePlayerStore::new(store);
    match cli.command {
        BadgeCommand::Show { rfid, format } => {
            let rfid = rfid.to_uppercase();
            let record = players
                .fetch(&rfid)?
                .ok_or_else(|| BadgeError::NotFound(format!("badge {}", rfid)))?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("{} {}", "Badge".bold(), record.rfid.bright_white().bold());
                println!("  user:     {}", record.user_id);
                println!("  password: {}", record.password);
                println!("  level:    {}", record.level.to_string().bright_cyan());
                println!("  started:  {:.3}", record.start_ts);
                match record.result_ts {
                    Some(ts) => println!(
                        "  finished: {:.3} ({}s)",
                        ts,
                        record.duration_secs()
                    ),
                    None => println!("  finished: -"),
                }
            }
        }
        BadgeCommand::Promote { rfid, level } => {
            let rfid = rfid.to_uppercase();
            let level = Level::try_from(level)?;
            promote(&players, &rfid, level)?;
            println!("Badge {} now at level {}", rfid, level);
        }
    }
    Ok(())
}

/// Move a badge forward; levels never go down.
pub fn promote(players: &dyn PlayerStore, rfid: &str, level: Level) -> Result<(), BadgeError> {
    let record = players
        .fetch(rfid)?
        .ok_or_else(|| BadgeError::NotFound(format!("badge {}", rfid)))?;
    if level < record.level {
        return Err(BadgeError::ValidationError(format!(
            "badge {} is at level {}, refusing to lower it to {}",
            rfid, record.level, level
        )));
    }
    if level == record.level {
        return Ok(());
    }
    players.set_level(rfid, level)
}
