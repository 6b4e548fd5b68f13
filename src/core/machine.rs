//! Badge progression state machine.
//!
//! [`plan`] is pure: it maps a command and the badge's current record to a
//! [`Transition`] (wire response plus ordered steps). [`ProgressionMachine`]
//! looks the record up, plans, and carries the steps out against the stores and
//! the action dispatcher.
//!
//! Store failures abort the remaining steps and suppress the response. Action
//! failures are logged and never undo a step that already ran.

use crate::core::credentials;
use crate::core::error::BadgeError;
use crate::core::external_action::{ActionDispatcher, ActionKind};
use crate::core::protocol::{Command, KIDS_GAME_ID, MalformedKind};
use crate::core::time;
use crate::plugins::players::{BadgeRecord, Level, PlayerStore};
use crate::plugins::scoreboard::ScoreboardStore;
use tracing::{debug, error, info, warn};

/// Reply written back to the reader, terminated with `\r` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Acknowledged, no level change.
    Zero,
    /// Acknowledged, the challenge is available.
    One,
    /// Result recorded (not necessarily passed).
    Ack,
    /// Result line could not be parsed.
    Nack,
}

impl Response {
    pub fn as_str(self) -> &'static str {
        match self {
            Response::Zero => "0",
            Response::One => "1",
            Response::Ack => "ACK",
            Response::Nack => "NACK",
        }
    }

    pub fn as_wire(self) -> &'static [u8] {
        match self {
            Response::Zero => b"0\r",
            Response::One => b"1\r",
            Response::Ack => b"ACK\r",
            Response::Nack => b"NACK\r",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateBadge,
    SetLevel(Level),
    AppendScore,
    Action(ActionKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub response: Option<Response>,
    pub steps: Vec<Step>,
}

impl Transition {
    fn reply(response: Response, steps: &[Step]) -> Self {
        Self {
            response: Some(response),
            steps: steps.to_vec(),
        }
    }

    fn silent() -> Self {
        Self {
            response: None,
            steps: Vec::new(),
        }
    }
}

struct AnnounceRow {
    level: Level,
    response: Response,
    steps: &'static [Step],
}

/// Announce of a known badge, one row per level.
const ANNOUNCE_TABLE: [AnnounceRow; 7] = [
    AnnounceRow {
        level: Level::Registered,
        response: Response::One,
        steps: &[],
    },
    AnnounceRow {
        level: Level::ChallengePassed,
        response: Response::Zero,
        steps: &[Step::Action(ActionKind::NothingHere)],
    },
    AnnounceRow {
        level: Level::DecryptionHint,
        response: Response::Zero,
        steps: &[Step::Action(ActionKind::DecryptionHint)],
    },
    AnnounceRow {
        level: Level::Stage4,
        response: Response::Zero,
        steps: &[Step::Action(ActionKind::NothingHere)],
    },
    AnnounceRow {
        level: Level::Stage5,
        response: Response::Zero,
        steps: &[Step::Action(ActionKind::NothingHere)],
    },
    AnnounceRow {
        level: Level::VoucherReady,
        response: Response::Zero,
        steps: &[
            Step::SetLevel(Level::Redeemed),
            Step::Action(ActionKind::ShirtVoucher),
            Step::Action(ActionKind::Wink),
        ],
    },
    AnnounceRow {
        level: Level::Redeemed,
        response: Response::Zero,
        steps: &[Step::Action(ActionKind::OnlyOneShirt)],
    },
];

fn announce_row(level: Level) -> &'static AnnounceRow {
    &ANNOUNCE_TABLE[(level.number() - 1) as usize]
}

/// Decide what a command does, given the badge's record (if the command names one).
///
/// `record` is ignored for malformed lines and kids-game results.
pub fn plan(command: &Command, record: Option<&BadgeRecord>) -> Transition {
    match command {
        Command::NewPlayer { .. } => match record {
            None => Transition::reply(Response::One, &[Step::CreateBadge]),
            Some(record) => {
                let row = announce_row(record.level);
                debug_assert_eq!(row.level, record.level);
                Transition::reply(row.response, row.steps)
            }
        },
        Command::Result { badge_id, .. } if badge_id == KIDS_GAME_ID => Transition::reply(
            Response::Ack,
            &[Step::AppendScore, Step::Action(ActionKind::KidsGame)],
        ),
        Command::Result {
            badge_id,
            error_count,
            ..
        } => match record {
            None => Transition::silent(),
            Some(record) if *error_count == i64::from(credentials::required_error_count(badge_id)) => {
                let mut steps = Vec::with_capacity(3);
                if record.level < Level::ChallengePassed {
                    steps.push(Step::SetLevel(Level::ChallengePassed));
                }
                steps.push(Step::Action(ActionKind::ChallengeAck));
                steps.push(Step::Action(ActionKind::Provision));
                Transition {
                    response: Some(Response::Ack),
                    steps,
                }
            }
            Some(_) => Transition::reply(Response::Ack, &[Step::Action(ActionKind::ChallengeNak)]),
        },
        Command::Malformed { kind, .. } => match kind {
            MalformedKind::Announce => Transition::reply(Response::Zero, &[]),
            MalformedKind::Result => Transition::reply(Response::Nack, &[]),
            MalformedKind::Unrecognized => Transition::silent(),
        },
    }
}

/// Source of kids-game reward tokens.
pub trait TokenSource {
    fn mint(&mut self) -> String;
}

/// Six random bytes, hex encoded.
#[derive(Debug, Default)]
pub struct RandomTokens;

impl TokenSource for RandomTokens {
    fn mint(&mut self) -> String {
        let bytes: [u8; 6] = rand::random();
        hex::encode(bytes)
    }
}

pub struct ProgressionMachine<'a> {
    players: &'a dyn PlayerStore,
    scores: &'a dyn ScoreboardStore,
    actions: &'a dyn ActionDispatcher,
    tokens: Box<dyn TokenSource + 'a>,
}

impl<'a> ProgressionMachine<'a> {
    pub fn new(
        players: &'a dyn PlayerStore,
        scores: &'a dyn ScoreboardStore,
        actions: &'a dyn ActionDispatcher,
    ) -> Self {
        Self {
            players,
            scores,
            actions,
            tokens: Box::new(RandomTokens),
        }
    }

    pub fn with_tokens(mut self, tokens: impl TokenSource + 'a) -> Self {
        self.tokens = Box::new(tokens);
        self
    }

    /// Process one command to completion. `None` means nothing goes on the wire.
    pub fn handle(&mut self, command: &Command) -> Option<Response> {
        match self.process(command) {
            Ok(response) => response,
            Err(e @ BadgeError::UnknownBadge(_)) => {
                warn!(error = %e, "not answering");
                None
            }
            Err(e) => {
                error!(?command, error = %e, "command aborted, no response sent");
                None
            }
        }
    }

    /// Like [`ProgressionMachine::handle`], but reports why a command got no
    /// answer. A result for a badge never announced is [`BadgeError::UnknownBadge`].
    pub fn process(&mut self, command: &Command) -> Result<Option<Response>, BadgeError> {
        let record = match command {
            Command::NewPlayer { badge_id } => self.players.fetch(badge_id)?,
            Command::Result { badge_id, .. } if badge_id != KIDS_GAME_ID => {
                self.players.fetch(badge_id)?
            }
            _ => None,
        };

        if let (Command::Result { badge_id, .. }, None) = (command, &record) {
            if badge_id != KIDS_GAME_ID {
                return Err(BadgeError::UnknownBadge(badge_id.clone()));
            }
        }

        let transition = plan(command, record.as_ref());
        self.log_decision(command, record.as_ref(), &transition);

        let token = match command {
            Command::Result {
                badge_id,
                error_count: 0,
                ..
            } if badge_id == KIDS_GAME_ID => self.tokens.mint(),
            _ => String::new(),
        };

        for step in &transition.steps {
            self.run_step(*step, command, &token)?;
        }
        Ok(transition.response)
    }

    fn log_decision(
        &self,
        command: &Command,
        record: Option<&BadgeRecord>,
        transition: &Transition,
    ) {
        match command {
            Command::NewPlayer { badge_id } => match record {
                Some(r) => info!(badge = %badge_id, level = %r.level, "player announced"),
                None => info!(badge = %badge_id, "new player"),
            },
            Command::Result {
                badge_id,
                error_count,
                elapsed_ms,
            } if badge_id == KIDS_GAME_ID => {
                info!(error_count, elapsed_secs = elapsed_ms / 1000.0, "kids game finished");
            }
            Command::Result {
                badge_id,
                error_count,
                ..
            } => {
                let required = credentials::required_error_count(badge_id);
                if transition.steps.contains(&Step::Action(ActionKind::ChallengeAck)) {
                    info!(badge = %badge_id, error_count, "challenge passed");
                } else {
                    info!(badge = %badge_id, error_count, required, "challenge failed: wrong error count");
                }
            }
            Command::Malformed { raw_line, kind } => {
                warn!(raw = %raw_line, ?kind, "malformed line");
            }
        }
    }

    fn run_step(&mut self, step: Step, command: &Command, token: &str) -> Result<(), BadgeError> {
        let badge_id = match command {
            Command::NewPlayer { badge_id } | Command::Result { badge_id, .. } => badge_id.as_str(),
            Command::Malformed { raw_line, .. } => {
                return Err(BadgeError::MalformedCommand(raw_line.clone()));
            }
        };

        match step {
            Step::CreateBadge => {
                let record = self.players.insert(badge_id)?;
                info!(badge = %badge_id, user = %record.user_id, "player created at level 1");
            }
            Step::SetLevel(level) => {
                self.players.set_level(badge_id, level)?;
                info!(badge = %badge_id, %level, "level updated");
            }
            Step::AppendScore => {
                let (error_count, elapsed_ms) = result_fields(command);
                self.scores
                    .append(time::now_secs(), error_count, elapsed_ms, token)?;
                debug!(error_count, elapsed_ms, token, "highscore written");
            }
            Step::Action(kind) => {
                if let Err(e) = self.dispatch(kind, badge_id, command, token) {
                    warn!(action = kind.as_str(), badge = %badge_id, error = %e, "bonus action failed");
                }
            }
        }
        Ok(())
    }

    fn dispatch(
        &self,
        kind: ActionKind,
        badge_id: &str,
        command: &Command,
        token: &str,
    ) -> Result<(), BadgeError> {
        let (error_count, elapsed_ms) = result_fields(command);
        match kind {
            ActionKind::NothingHere => self.actions.hint_nothing_here(),
            ActionKind::DecryptionHint => self.actions.hint_decryption(),
            ActionKind::ChallengeAck => self.actions.challenge_ack(error_count, elapsed_ms),
            ActionKind::ChallengeNak => self.actions.challenge_nak(error_count, elapsed_ms),
            ActionKind::ShirtVoucher => {
                let duration = match self.players.fetch(badge_id) {
                    Ok(record) => record.map(|r| r.duration_secs()).unwrap_or(0),
                    Err(e) => {
                        warn!(badge = %badge_id, error = %e, "duration lookup failed, reporting 0");
                        0
                    }
                };
                self.actions
                    .issue_voucher(&credentials::derive_user_id(badge_id), duration)
            }
            ActionKind::OnlyOneShirt => self
                .actions
                .only_one_voucher(&credentials::derive_user_id(badge_id)),
            ActionKind::KidsGame => self.actions.kids_game_outcome(error_count, elapsed_ms, token),
            ActionKind::Provision => self
                .actions
                .provision_access(&credentials::derive_user_id(badge_id)),
            ActionKind::Wink => self.actions.wink(),
        }
    }
}

fn result_fields(command: &Command) -> (i64, f64) {
    match command {
        Command::Result {
            error_count,
            elapsed_ms,
            ..
        } => (*error_count, *elapsed_ms),
        _ => (0, 0.0),
    }
}
