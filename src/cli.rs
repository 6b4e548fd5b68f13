//! CLI struct definitions for the badgectl command-line interface.
//!
//! Top-level clap-derived types live here; subsystem subcommands live next to
//! the subsystem that runs them.

use crate::plugins::{players, scoreboard};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "badgectl",
    version = env!("CARGO_PKG_VERSION"),
    about = "Serial controller for the badge challenge: reads reader commands, tracks badge progression and fires bonus actions."
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./badgectl.toml when present).
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    /// Store root holding challenge.db and the event logs (overrides config).
    #[clap(long, global = true)]
    pub store: Option<PathBuf>,
    /// Log filter, e.g. `info` or `badgectl=debug`.
    #[clap(long, global = true, default_value = "info")]
    pub log_level: String,
    /// Append logs to this file instead of stderr.
    #[clap(long, global = true)]
    pub log_file: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug)]
pub(crate) struct RunCli {
    /// Serial device to open (overrides config).
    #[clap(long, conflicts_with = "stdio")]
    pub device: Option<PathBuf>,
    /// Speak the protocol on stdin/stdout instead of a serial device.
    #[clap(long)]
    pub stdio: bool,
    /// Log bonus actions instead of running them.
    #[clap(long)]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug)]
pub(crate) struct CredentialsCli {
    /// Badge id (8 hex chars).
    pub rfid: String,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ProvisionCli {
    /// Derived user id to provision (e.g. u0x34b8d380).
    pub user: String,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Run the serial protocol loop.
    Run(RunCli),
    /// Create the challenge database and tables.
    Init,
    /// Print the derived credentials for a badge id.
    Credentials(CredentialsCli),
    /// Inspect or advance badge records.
    Badge(players::BadgeCli),
    /// Show kids-game results.
    Scoreboard(scoreboard::ScoreboardCli),
    /// Create VPN client credentials for a user.
    Provision(ProvisionCli),
}
