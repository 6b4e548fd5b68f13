//! The reader loop: one line in, one command handled, at most one reply out.

use crate::core::error::BadgeError;
use crate::core::machine::ProgressionMachine;
use crate::core::protocol::{Command, ReadMode, WireLines};
use serde::Serialize;
use std::io::{Read, Write};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub lines: u64,
    pub commands: u64,
    pub malformed: u64,
    pub responses: u64,
}

/// Drive the machine from `reader` until end of input, replying on `writer`.
///
/// Commands are processed strictly one at a time; the next byte is not read
/// until the previous command, including its bonus actions, has finished.
pub fn run_session<R: Read, W: Write>(
    reader: R,
    writer: W,
    machine: &mut ProgressionMachine<'_>,
) -> Result<SessionStats, BadgeError> {
    run_session_with(reader, writer, machine, ReadMode::Stream)
}

/// [`run_session`] with an explicit [`ReadMode`]. A serial device runs in
/// [`ReadMode::Device`] and only stops on a transport error.
pub fn run_session_with<R: Read, W: Write>(
    reader: R,
    mut writer: W,
    machine: &mut ProgressionMachine<'_>,
    mode: ReadMode,
) -> Result<SessionStats, BadgeError> {
    let mut stats = SessionStats::default();

    for line in WireLines::with_mode(reader, mode) {
        let line = line?;
        stats.lines += 1;
        debug!(raw = %line, "line received");

        let command = Command::parse(&line);
        match command {
            Command::Malformed { .. } => stats.malformed += 1,
            _ => stats.commands += 1,
        }

        if let Some(response) = machine.handle(&command) {
            writer
                .write_all(response.as_wire())
                .and_then(|_| writer.flush())
                .map_err(|e| BadgeError::TransportError(format!("write failed: {}", e)))?;
            stats.responses += 1;
            debug!(response = response.as_str(), "response sent");
        }
    }

    info!(
        lines = stats.lines,
        commands = stats.commands,
        malformed = stats.malformed,
        responses = stats.responses,
        "input closed"
    );
    Ok(stats)
}
