//! badgectl: controller for the badge challenge installation.
//!
//! An embedded reader sits on a serial line and reports two things: a badge
//! was presented (`N<id>`), or a quiz/game attempt finished
//! (`R<id>,<errors>,<ms>`). badgectl answers each line, keeps one progression
//! record per badge in SQLite and triggers the installation's bonus actions
//! (receipts, hints, vouchers, the wink light).
//!
//! # Architecture
//!
//! - [`core::protocol`]: byte stream to lines to typed commands
//! - [`core::machine`]: the seven-level progression as a transition table
//! - [`core::credentials`]: user id, password and required error count per badge
//! - [`core::external_action`]: the bonus-action capability set and its script runner
//! - [`core::session`]: the single-threaded reader loop
//! - [`plugins`]: badge records, kids-game scoreboard, VPN provisioning
//!
//! All state access goes through `DbBroker`, one connection per operation.
//!
//! # Examples
//!
//! ```bash
//! # Create the database
//! badgectl init
//!
//! # Talk to the reader
//! badgectl run --device /dev/ttyUSB0
//!
//! # Replay a capture without firing any bonus action
//! badgectl run --stdio --dry-run < capture.txt
//! ```

mod cli;
pub mod core;
pub mod plugins;

use crate::cli::{Cli, Command, CredentialsCli, RunCli};
use crate::core::config::{self, Config};
use crate::core::external_action::{ActionDispatcher, NullDispatcher, ScriptDispatcher};
use crate::core::machine::ProgressionMachine;
use crate::core::protocol::ReadMode;
use crate::core::store::Store;
use crate::core::{credentials, db, error, logging, session};
use crate::plugins::players::{self, SqlitePlayerStore};
use crate::plugins::scoreboard::{self, SqliteScoreboard};
use crate::plugins::provision;

use clap::Parser;
use colored::Colorize;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::info;

/// Open a serial device for reading and writing. The line settings (baud rate,
/// raw mode) are expected to be configured on the device already.
pub fn open_device(path: &Path) -> Result<(File, File), error::BadgeError> {
    let writer = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| {
            error::BadgeError::TransportError(format!(
                "could not open serial port {}: {}",
                path.display(),
                e
            ))
        })?;
    let reader = writer.try_clone()?;
    Ok((reader, writer))
}

fn run_controller(config: &Config, store: &Store, run: RunCli) -> Result<(), error::BadgeError> {
    db::initialize_challenge_db(&store.root)?;

    let players = SqlitePlayerStore::new(store);
    let scores = SqliteScoreboard::new(store);
    let dispatcher: Box<dyn ActionDispatcher> = if run.dry_run {
        Box::new(NullDispatcher)
    } else {
        Box::new(ScriptDispatcher::new(config.actions.clone(), &store.root))
    };
    let mut machine = ProgressionMachine::new(&players, &scores, dispatcher.as_ref());

    let stats = if run.stdio {
        info!("speaking the protocol on stdin/stdout");
        session::run_session(std::io::stdin().lock(), std::io::stdout().lock(), &mut machine)?
    } else {
        let device = run.device.unwrap_or_else(|| config.serial.device.clone());
        let (reader, writer) = open_device(&device)?;
        info!(device = %device.display(), "serial port open");
        session::run_session_with(reader, writer, &mut machine, ReadMode::Device)?
    };

    info!(?stats, "session ended");
    Ok(())
}

fn print_credentials(cli: CredentialsCli) -> Result<(), error::BadgeError> {
    let creds = credentials::derive_all(&cli.rfid.to_uppercase())?;
    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&creds)?);
    } else {
        println!("RFID:   {}", creds.rfid.bright_white().bold());
        println!("USER:   {}", creds.user_id);
        println!("PASS:   {}", creds.password);
        println!("ERRORS: {}", creds.required_errors);
    }
    Ok(())
}

pub fn run() -> Result<(), error::BadgeError> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_file.as_deref())?;

    let current_dir = std::env::current_dir()?;
    let config = config::load_config(cli.config.as_deref(), &current_dir)?;
    let store = Store::new(cli.store.clone().unwrap_or_else(|| config.store.root.clone()));

    match cli.command {
        Command::Run(run) => run_controller(&config, &store, run)?,
        Command::Init => {
            db::initialize_challenge_db(&store.root)?;
            println!(
                "Challenge database initialized at {}",
                db::challenge_db_path(&store.root).display()
            );
        }
        Command::Credentials(creds) => print_credentials(creds)?,
        Command::Badge(badge_cli) => {
            db::initialize_challenge_db(&store.root)?;
            players::run_badge_cli(&store, badge_cli)?;
        }
        Command::Scoreboard(board_cli) => {
            db::initialize_challenge_db(&store.root)?;
            scoreboard::run_scoreboard_cli(&store, board_cli)?;
        }
        Command::Provision(p) => {
            let creds = provision::provision(&config.provision, &p.user)?;
            println!("Provisioned {}", creds.user);
        }
    }
    Ok(())
}
