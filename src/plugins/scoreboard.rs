use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::BadgeError;
use crate::core::store::Store;
use clap::Parser;
use colored::Colorize;
use rusqlite::params;
use serde::Serialize;
use std::path::PathBuf;

/// One finished kids-game session. `token` is empty unless the run was error-free.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreboardEntry {
    pub id: i64,
    pub ts: f64,
    pub error_count: i64,
    pub elapsed_ms: f64,
    pub token: String,
}

/// Append-only outcome log.
pub trait ScoreboardStore {
    fn append(
        &self,
        ts: f64,
        error_count: i64,
        elapsed_ms: f64,
        token: &str,
    ) -> Result<(), BadgeError>;
}

pub struct SqliteScoreboard {
    root: PathBuf,
    db_path: PathBuf,
}

impl SqliteScoreboard {
    pub fn new(store: &Store) -> Self {
        Self {
            root: store.root.clone(),
            db_path: db::challenge_db_path(&store.root),
        }
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> Result<Vec<ScoreboardEntry>, BadgeError> {
        let broker = DbBroker::new(&self.root);
        broker.with_conn(&self.db_path, "badgectl", "scoreboard.entries", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ts, errors, result, token FROM highscores ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(ScoreboardEntry {
                    id: row.get(0)?,
                    ts: row.get(1)?,
                    error_count: row.get(2)?,
                    elapsed_ms: row.get(3)?,
                    token: row.get(4)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }
}

impl ScoreboardStore for SqliteScoreboard {
    fn append(
        &self,
        ts: f64,
        error_count: i64,
        elapsed_ms: f64,
        token: &str,
    ) -> Result<(), BadgeError> {
        let broker = DbBroker::new(&self.root);
        broker.with_conn(&self.db_path, "badgectl", "scoreboard.append", |conn| {
            conn.execute(
                "INSERT INTO highscores(ts, errors, result, token) VALUES(?1, ?2, ?3, ?4)",
                params![ts, error_count, elapsed_ms, token],
            )?;
            Ok(())
        })
    }
}

/// Best runs first: fewest errors, then fastest, then earliest.
pub fn leaders(entries: &[ScoreboardEntry], top: usize) -> Vec<ScoreboardEntry> {
    let mut ranked = entries.to_vec();
    ranked.sort_by(|a, b| {
        a.error_count
            .cmp(&b.error_count)
            .then(a.elapsed_ms.total_cmp(&b.elapsed_ms))
            .then(a.id.cmp(&b.id))
    });
    ranked.truncate(top);
    ranked
}

#[derive(Parser, Debug)]
#[clap(name = "scoreboard", about = "Show kids-game results")]
pub struct ScoreboardCli {
    /// Show only the N best runs instead of every run in order.
    #[clap(long)]
    pub top: Option<usize>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

pub fn run_scoreboard_cli(store: &Store, cli: ScoreboardCli) -> Result<(), BadgeError> {
    let board = SqliteScoreboard::new(store);
    let entries = board.entries()?;
    let shown = match cli.top {
        Some(n) => leaders(&entries, n),
        None => entries,
    };

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No kids-game results yet.");
        return Ok(());
    }
    for (rank, entry) in shown.iter().enumerate() {
        let token = if entry.token.is_empty() {
            "-".dimmed().to_string()
        } else {
            entry.token.bright_green().to_string()
        };
        println!(
            "{:>3}. errors {:>2}  time {:>8.3}s  token {}",
            rank + 1,
            entry.error_count,
            entry.elapsed_ms / 1000.0,
            token
        );
    }
    Ok(())
}
