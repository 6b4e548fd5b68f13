//! Bonus actions: the side effects the progression machine asks for.
//!
//! The machine only sees [`ActionDispatcher`]. [`ScriptDispatcher`] runs the
//! installation's helper programs, one per action, and records each run in
//! `actions.events.jsonl`; [`NullDispatcher`] only logs.

use crate::core::config::ActionsConfig;
use crate::core::error::BadgeError;
use crate::core::schemas;
use crate::core::time;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Capability set the progression machine is given. Every call may fail on its
/// own; callers log failures and carry on.
pub trait ActionDispatcher {
    fn hint_nothing_here(&self) -> Result<(), BadgeError>;
    fn hint_decryption(&self) -> Result<(), BadgeError>;
    fn challenge_ack(&self, error_count: i64, elapsed_ms: f64) -> Result<(), BadgeError>;
    fn challenge_nak(&self, error_count: i64, elapsed_ms: f64) -> Result<(), BadgeError>;
    fn issue_voucher(&self, user_id: &str, duration_secs: i64) -> Result<(), BadgeError>;
    fn only_one_voucher(&self, user_id: &str) -> Result<(), BadgeError>;
    fn kids_game_outcome(
        &self,
        error_count: i64,
        elapsed_ms: f64,
        token: &str,
    ) -> Result<(), BadgeError>;
    fn provision_access(&self, user_id: &str) -> Result<(), BadgeError>;
    fn wink(&self) -> Result<(), BadgeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    NothingHere,
    DecryptionHint,
    ChallengeAck,
    ChallengeNak,
    ShirtVoucher,
    OnlyOneShirt,
    KidsGame,
    Provision,
    Wink,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::NothingHere => "nothing_here",
            ActionKind::DecryptionHint => "decryption_hint",
            ActionKind::ChallengeAck => "challenge_ack",
            ActionKind::ChallengeNak => "challenge_nak",
            ActionKind::ShirtVoucher => "shirt_voucher",
            ActionKind::OnlyOneShirt => "only_one_shirt",
            ActionKind::KidsGame => "kidsgame",
            ActionKind::Provision => "provision",
            ActionKind::Wink => "wink",
        }
    }

    fn default_program(self) -> &'static str {
        match self {
            ActionKind::NothingHere => "bon_nothing_here.py",
            ActionKind::DecryptionHint => "bon_decryption_hint.py",
            ActionKind::ChallengeAck => "bon_challenge_ack.py",
            ActionKind::ChallengeNak => "bon_challenge_nak.py",
            ActionKind::ShirtVoucher => "bon_shirt_voucher.py",
            ActionKind::OnlyOneShirt => "bon_only_one_shirt.py",
            ActionKind::KidsGame => "bon_kidsgame.py",
            ActionKind::Provision => "wg-setup",
            ActionKind::Wink => "wink.py",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActionEvent {
    pub ts: String,
    pub event_id: String,
    pub action: String,
    pub program: String,
    pub args: Vec<String>,
    pub status: String,
    pub exit_code: Option<i32>,
}

fn result_args(error_count: i64, elapsed_ms: f64) -> Vec<String> {
    vec![
        "--time".to_string(),
        elapsed_ms.to_string(),
        "--errors".to_string(),
        error_count.to_string(),
    ]
}

/// Runs one helper program per action, blocking until it exits.
pub struct ScriptDispatcher {
    config: ActionsConfig,
    events_path: PathBuf,
}

impl ScriptDispatcher {
    pub fn new(config: ActionsConfig, store_root: &Path) -> Self {
        Self {
            config,
            events_path: store_root.join(schemas::ACTION_EVENTS_NAME),
        }
    }

    /// Program path for an action, after applying config overrides.
    pub fn program_for(&self, kind: ActionKind) -> PathBuf {
        let name = self
            .config
            .programs
            .get(kind.as_str())
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_program());
        self.config.dir.join(name)
    }

    fn execute(&self, kind: ActionKind, args: Vec<String>) -> Result<(), BadgeError> {
        let program = self.program_for(kind);
        // Relative programs resolve against our cwd, not the child's.
        let program = std::path::absolute(&program).unwrap_or(program);
        debug!(action = kind.as_str(), program = %program.display(), ?args, "running action");

        let outcome = Command::new(&program)
            .args(&args)
            .current_dir(&self.config.dir)
            .output();

        let (status, exit_code, result) = match outcome {
            Ok(output) if output.status.success() => ("success", output.status.code(), Ok(())),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let reason = format!("exit status {}: {}", output.status, stderr);
                ("error", output.status.code(), Err(reason))
            }
            Err(e) => ("error", None, Err(format!("spawn failed: {}", e))),
        };

        let event = ActionEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            action: kind.as_str().to_string(),
            program: program.to_string_lossy().to_string(),
            args,
            status: status.to_string(),
            exit_code,
        };
        if let Err(e) = self.log_event(&event) {
            warn!(action = kind.as_str(), error = %e, "action event log write failed");
        }

        result.map_err(|reason| BadgeError::ActionDispatch {
            action: kind.as_str().to_string(),
            reason,
        })
    }

    fn log_event(&self, event: &ActionEvent) -> Result<(), BadgeError> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)?;
        writeln!(f, "{}", serde_json::to_string(event)?)?;
        Ok(())
    }
}

impl ActionDispatcher for ScriptDispatcher {
    fn hint_nothing_here(&self) -> Result<(), BadgeError> {
        self.execute(ActionKind::NothingHere, vec![])
    }

    fn hint_decryption(&self) -> Result<(), BadgeError> {
        self.execute(ActionKind::DecryptionHint, vec![])
    }

    fn challenge_ack(&self, error_count: i64, elapsed_ms: f64) -> Result<(), BadgeError> {
        self.execute(ActionKind::ChallengeAck, result_args(error_count, elapsed_ms))
    }

    fn challenge_nak(&self, error_count: i64, elapsed_ms: f64) -> Result<(), BadgeError> {
        self.execute(ActionKind::ChallengeNak, result_args(error_count, elapsed_ms))
    }

    fn issue_voucher(&self, user_id: &str, duration_secs: i64) -> Result<(), BadgeError> {
        self.execute(
            ActionKind::ShirtVoucher,
            vec![
                "--user".to_string(),
                user_id.to_string(),
                "--time".to_string(),
                duration_secs.to_string(),
            ],
        )
    }

    fn only_one_voucher(&self, user_id: &str) -> Result<(), BadgeError> {
        self.execute(
            ActionKind::OnlyOneShirt,
            vec!["--user".to_string(), user_id.to_string()],
        )
    }

    fn kids_game_outcome(
        &self,
        error_count: i64,
        elapsed_ms: f64,
        token: &str,
    ) -> Result<(), BadgeError> {
        let mut args = result_args(error_count, elapsed_ms);
        if !token.is_empty() {
            args.push("--token".to_string());
            args.push(token.to_string());
        }
        self.execute(ActionKind::KidsGame, args)
    }

    fn provision_access(&self, user_id: &str) -> Result<(), BadgeError> {
        self.execute(ActionKind::Provision, vec![user_id.to_string()])
    }

    fn wink(&self) -> Result<(), BadgeError> {
        self.execute(
            ActionKind::Wink,
            vec!["--winkings".to_string(), self.config.wink_count.to_string()],
        )
    }
}

/// Dispatcher for dry runs: every action succeeds and is only logged.
#[derive(Debug, Default)]
pub struct NullDispatcher;

impl ActionDispatcher for NullDispatcher {
    fn hint_nothing_here(&self) -> Result<(), BadgeError> {
        info!(action = "nothing_here", "dry run");
        Ok(())
    }

    fn hint_decryption(&self) -> Result<(), BadgeError> {
        info!(action = "decryption_hint", "dry run");
        Ok(())
    }

    fn challenge_ack(&self, error_count: i64, elapsed_ms: f64) -> Result<(), BadgeError> {
        info!(action = "challenge_ack", error_count, elapsed_ms, "dry run");
        Ok(())
    }

    fn challenge_nak(&self, error_count: i64, elapsed_ms: f64) -> Result<(), BadgeError> {
        info!(action = "challenge_nak", error_count, elapsed_ms, "dry run");
        Ok(())
    }

    fn issue_voucher(&self, user_id: &str, duration_secs: i64) -> Result<(), BadgeError> {
        info!(action = "shirt_voucher", user_id, duration_secs, "dry run");
        Ok(())
    }

    fn only_one_voucher(&self, user_id: &str) -> Result<(), BadgeError> {
        info!(action = "only_one_shirt", user_id, "dry run");
        Ok(())
    }

    fn kids_game_outcome(
        &self,
        error_count: i64,
        elapsed_ms: f64,
        token: &str,
    ) -> Result<(), BadgeError> {
        info!(action = "kidsgame", error_count, elapsed_ms, token, "dry run");
        Ok(())
    }

    fn provision_access(&self, user_id: &str) -> Result<(), BadgeError> {
        info!(action = "provision", user_id, "dry run");
        Ok(())
    }

    fn wink(&self) -> Result<(), BadgeError> {
        info!(action = "wink", "dry run");
        Ok(())
    }
}
