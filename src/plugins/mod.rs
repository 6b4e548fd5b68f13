//! Subsystems with their own storage and CLI surface.

pub mod players;
pub mod provision;
pub mod scoreboard;
