//! Fermi poker game engine.
//!
//! This module holds the pure game logic:
//! - Session data model and the phase graph
//! - Betting resolver (turn order, calls, raises, folds)
//! - Outcome resolver (winner, pot, meta-game predictions)
//! - Phase engine returning transitions plus timer requests
//!
//! Nothing here performs I/O. The [`crate::session`] actor applies these
//! functions and persists the results.

pub mod betting;
pub mod config;
pub mod constants;
pub mod entities;
pub mod errors;
pub mod outcome;
pub mod state_machine;

pub use betting::{BetAction, RoundStatus};
pub use config::{PotPolicy, SessionConfig};
pub use entities::{
    BettingRound, Chips, Difficulty, Guess, Hint, Phase, PhaseKind, Player, PlayerId,
    PlayerState, Prediction, Question, QuestionResult, SessionId, SessionRecord, SessionStatus,
};
pub use errors::{GameError, GameResult};
pub use outcome::{Standing, determine_winner, standings};
pub use state_machine::{PhaseTimer, Transition};
