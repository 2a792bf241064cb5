//! Session actor message types.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::game::{
    betting::BetAction,
    entities::{PlayerId, Question, SessionRecord},
    errors::GameResult,
    state_machine::PhaseTimer,
};

/// Reply channel for actions that return the updated session
pub type Reply = oneshot::Sender<GameResult<SessionRecord>>;

/// Messages that can be sent to a SessionActor
#[derive(Debug)]
pub enum SessionMessage {
    /// Take a seat
    Join {
        player_id: PlayerId,
        username: String,
        response: Reply,
    },

    /// Give up a seat before the game starts
    Leave {
        player_id: PlayerId,
        response: Reply,
    },

    /// Creator starts the game
    Start {
        player_id: PlayerId,
        response: Reply,
    },

    /// Range estimate for the current question
    SubmitGuess {
        player_id: PlayerId,
        lower_bound: f64,
        upper_bound: f64,
        response: Reply,
    },

    /// Meta-game prediction of the current question's winner
    SubmitPrediction {
        player_id: PlayerId,
        predicted_winner_id: PlayerId,
        response: Reply,
    },

    /// Fold, call or raise
    Act {
        player_id: PlayerId,
        action: BetAction,
        response: Reply,
    },

    /// Creator moves on from the reveal
    AdvanceQuestion {
        player_id: PlayerId,
        response: Reply,
    },

    /// Creator starts a new game after game over
    Reset {
        player_id: PlayerId,
        questions: Vec<Question>,
        response: Reply,
    },

    /// Current session state
    GetState { response: Reply },

    /// A phase timer expired
    TimerFired(PhaseTimer),

    /// Delete the session and stop the actor
    Close {
        response: oneshot::Sender<GameResult<()>>,
    },
}

/// What happened to a stored session
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// Change feed entry, published after every successful store write
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: SessionRecord,
}
