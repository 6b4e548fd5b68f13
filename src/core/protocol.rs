//! Line protocol spoken by the badge reader.
//!
//! Inbound traffic is ASCII lines terminated by `\r` or `\n`. [`LineBuffer`]
//! turns arbitrary read chunks into complete lines, [`WireLines`] drives it
//! from a reader, and [`Command::parse`] tokenizes one line.

use crate::core::error::BadgeError;
use regex::Regex;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::sync::OnceLock;
use tracing::{trace, warn};

/// Reserved badge id of the anonymous kids game.
pub const KIDS_GAME_ID: &str = "00000000";
pub const BADGE_ID_LEN: usize = 8;
/// Longest line kept; anything longer is discarded up to its terminator.
pub const MAX_LINE_LEN: usize = 256;

const READ_CHUNK: usize = 64;

fn badge_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-F]{8}$").expect("static badge id regex"))
}

/// Accumulates bytes across reads until a terminator completes a line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    overflowed: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read chunk; returns every line the chunk completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if self.overflowed {
                    self.overflowed = false;
                    continue;
                }
                let line = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                lines.push(line);
            } else if self.overflowed {
                continue;
            } else if self.pending.len() >= MAX_LINE_LEN {
                warn!(limit = MAX_LINE_LEN, "line too long, discarding until next terminator");
                self.pending.clear();
                self.overflowed = true;
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Bytes seen since the last terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// What a zero-length read means for the source being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Pipes and files: a zero-length read is end of input.
    #[default]
    Stream,
    /// A tty with a read timeout returns zero bytes when the line is idle.
    Device,
}

/// Lazy sequence of raw lines read from a byte stream.
///
/// Read timeouts are not errors: the iterator simply reads again. In
/// [`ReadMode::Stream`] end of input ends the sequence; a partial line left in
/// the buffer at that point is dropped. In [`ReadMode::Device`] the sequence
/// only ends on a read error.
pub struct WireLines<R> {
    reader: R,
    mode: ReadMode,
    buffer: LineBuffer,
    ready: VecDeque<String>,
    done: bool,
}

impl<R: Read> WireLines<R> {
    pub fn new(reader: R) -> Self {
        Self::with_mode(reader, ReadMode::Stream)
    }

    pub fn with_mode(reader: R, mode: ReadMode) -> Self {
        Self {
            reader,
            mode,
            buffer: LineBuffer::new(),
            ready: VecDeque::new(),
            done: false,
        }
    }
}

impl<R: Read> Iterator for WireLines<R> {
    type Item = Result<String, BadgeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(Ok(line));
            }
            if self.done {
                return None;
            }
            match self.reader.read(&mut chunk) {
                Ok(0) if self.mode == ReadMode::Device => continue,
                Ok(0) => {
                    if self.buffer.pending_len() > 0 {
                        trace!(bytes = self.buffer.pending_len(), "dropping unterminated tail");
                    }
                    self.done = true;
                }
                Ok(n) => self.ready.extend(self.buffer.push(&chunk[..n])),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(BadgeError::TransportError(e.to_string())));
                }
            }
        }
    }
}

/// Which line shape failed to tokenize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// `N` line without an 8-char hex badge id.
    Announce,
    /// `R` line with the wrong field count or non-numeric fields.
    Result,
    /// Empty, or neither `N` nor `R`.
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    NewPlayer {
        badge_id: String,
    },
    Result {
        badge_id: String,
        error_count: i64,
        elapsed_ms: f64,
    },
    Malformed {
        raw_line: String,
        kind: MalformedKind,
    },
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim();
        let mut chars = line.chars();
        let Some(tag) = chars.next() else {
            return malformed(line, MalformedKind::Unrecognized);
        };
        let payload = chars.as_str().trim().to_uppercase();

        match tag.to_ascii_uppercase() {
            'N' => parse_announce(line, &payload),
            'R' => parse_result(line, &payload),
            _ => malformed(line, MalformedKind::Unrecognized),
        }
    }

    pub fn is_kids_game(&self) -> bool {
        matches!(self, Command::Result { badge_id, .. } if badge_id == KIDS_GAME_ID)
    }
}

fn malformed(line: &str, kind: MalformedKind) -> Command {
    Command::Malformed {
        raw_line: line.to_string(),
        kind,
    }
}

fn parse_announce(line: &str, payload: &str) -> Command {
    if !badge_id_re().is_match(payload) {
        return malformed(line, MalformedKind::Announce);
    }
    Command::NewPlayer {
        badge_id: payload.to_string(),
    }
}

fn parse_result(line: &str, payload: &str) -> Command {
    let fields: Vec<&str> = payload.split(',').map(str::trim).collect();
    let [uid, errors, elapsed] = fields.as_slice() else {
        return malformed(line, MalformedKind::Result);
    };
    let (Ok(error_count), Ok(elapsed_ms)) = (errors.parse::<i64>(), elapsed.parse::<f64>())
    else {
        return malformed(line, MalformedKind::Result);
    };
    if !elapsed_ms.is_finite() {
        return malformed(line, MalformedKind::Result);
    }
    Command::Result {
        badge_id: uid.to_string(),
        error_count,
        elapsed_ms,
    }
}
