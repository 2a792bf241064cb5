//! Phase engine.
//!
//! Every function here is a pure `(record, event) -> Transition`. Nothing in
//! this module sleeps, spawns or touches the store; a [`Transition`] names
//! the timer the caller must arm, and the session actor does the rest.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

use super::betting::{self, BetAction, RoundStatus};
use super::entities::{
    BettingRound, Hint, Phase, PhaseKind, Player, PlayerId, Question, SessionRecord,
    SessionStatus,
};
use super::errors::{GameError, GameResult};
use super::outcome;

/// A timer request. The epoch pins the timer to one phase instance, so a
/// timer that outlives its phase is recognized and discarded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PhaseTimer {
    pub epoch: u64,
    pub phase: PhaseKind,
    pub delay: Duration,
}

/// Result of applying an event to a session.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub record: SessionRecord,
    pub timer: Option<PhaseTimer>,
}

impl Transition {
    fn new(record: SessionRecord) -> Self {
        Self {
            record,
            timer: None,
        }
    }

    fn with_timer(record: SessionRecord, timer: PhaseTimer) -> Self {
        Self {
            record,
            timer: Some(timer),
        }
    }
}

impl From<SessionRecord> for Transition {
    fn from(record: SessionRecord) -> Self {
        Self::new(record)
    }
}

/// Move to `phase` and bump the phase epoch.
fn enter(record: &mut SessionRecord, phase: Phase) -> GameResult<()> {
    let from = record.phase_kind();
    let to = phase.kind();
    if !from.can_transition_to(to) {
        log::error!(
            "Session {}: illegal phase transition {} -> {}",
            record.id,
            from,
            to
        );
        return Err(GameError::InvalidPhase {
            expected: "a legal transition",
            actual: from,
        });
    }

    record.phase = phase;
    record.phase_epoch += 1;
    log::debug!(
        "Session {}: {} -> {} (epoch {})",
        record.id,
        from,
        to,
        record.phase_epoch
    );
    Ok(())
}

fn require_creator(record: &SessionRecord, actor: PlayerId, action: &str) -> GameResult<()> {
    if record.is_creator(actor) {
        Ok(())
    } else {
        Err(GameError::NotAuthorized(format!(
            "only the session creator can {action}"
        )))
    }
}

fn require_phase(
    record: &SessionRecord,
    phase: PhaseKind,
    expected: &'static str,
) -> GameResult<()> {
    let actual = record.phase_kind();
    if actual == phase {
        Ok(())
    } else {
        Err(GameError::InvalidPhase { expected, actual })
    }
}

/// Seat a player. Joining a session one is already seated in changes nothing.
pub fn join(
    record: &SessionRecord,
    player_id: PlayerId,
    username: &str,
) -> GameResult<SessionRecord> {
    if record.players.contains_key(&player_id) {
        return Ok(record.clone());
    }

    if record.status != SessionStatus::Waiting {
        return Err(GameError::SessionNotJoinable);
    }

    if record.players.len() >= record.config.max_players {
        return Err(GameError::SessionFull);
    }

    if username.trim().is_empty() {
        return Err(GameError::InvalidInput("Username is required".to_string()));
    }

    let mut next = record.clone();
    next.players.insert(
        player_id,
        Player::new(player_id, username, record.config.starting_chips),
    );
    Ok(next)
}

/// Give up a seat before the game starts.
pub fn leave(record: &SessionRecord, player_id: PlayerId) -> GameResult<SessionRecord> {
    require_phase(record, PhaseKind::Waiting, "waiting")?;

    if !record.players.contains_key(&player_id) {
        return Err(GameError::PlayerNotFound(player_id));
    }

    if record.is_creator(player_id) {
        return Err(GameError::NotAuthorized(
            "the session creator cannot leave".to_string(),
        ));
    }

    let mut next = record.clone();
    next.players.remove(&player_id);
    Ok(next)
}

/// Open the current question and return the guess timer.
fn open_question(record: &mut SessionRecord, now: DateTime<Utc>) -> GameResult<PhaseTimer> {
    if record.current_question().is_none() {
        return Err(GameError::InvalidInput(format!(
            "No question at index {}",
            record.current_question_index
        )));
    }

    let guess_seconds = record.config.guess_seconds;
    let delay = Duration::from_secs(guess_seconds);
    let ends_at = i64::try_from(guess_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|window| now.checked_add_signed(window))
        .ok_or_else(|| {
            GameError::InvalidInput(format!("Guess time of {guess_seconds} seconds is too long"))
        })?;
    enter(record, Phase::Question { ends_at })?;

    Ok(PhaseTimer {
        epoch: record.phase_epoch,
        phase: PhaseKind::Question,
        delay,
    })
}

/// Creator starts the game: first question, guess timer armed.
pub fn start_session(
    record: &SessionRecord,
    actor: PlayerId,
    now: DateTime<Utc>,
) -> GameResult<Transition> {
    require_creator(record, actor, "start the game")?;
    require_phase(record, PhaseKind::Waiting, "waiting")?;

    let needed = record.config.min_players;
    let current = record.players.len();
    if current < needed {
        return Err(GameError::NotEnoughPlayers { needed, current });
    }

    let mut next = record.clone();
    next.status = SessionStatus::InProgress;
    next.current_question_index = 0;
    let timer = open_question(&mut next, now)?;

    log::info!(
        "Session {} started with {} players",
        next.id,
        next.players.len()
    );
    Ok(Transition::with_timer(next, timer))
}

/// Settle the question and show the answer.
fn reveal(record: &mut SessionRecord) -> GameResult<()> {
    let rejoined = outcome::settle_question(record)?;
    for player_id in rejoined {
        log::info!("Session {}: player {} is back in the game", record.id, player_id);
    }
    enter(record, Phase::Reveal)
}

/// Open a betting round, or skip straight to the reveal if nobody is left to
/// bet.
fn begin_betting_round<R: Rng + ?Sized>(
    record: &mut SessionRecord,
    round: BettingRound,
    rng: &mut R,
) -> GameResult<()> {
    match betting::pick_first_bettor(record, rng) {
        Some(bettor) => enter(record, Phase::Betting { round, bettor }),
        None => {
            log::debug!("Session {}: nobody left to bet, revealing", record.id);
            reveal(record)
        }
    }
}

/// Apply a betting action and advance the phase when the round ends.
pub fn act(
    record: &SessionRecord,
    player_id: PlayerId,
    action: BetAction,
    hint_delay: Duration,
) -> GameResult<Transition> {
    let round = match record.phase {
        Phase::Betting { round, .. } => round,
        _ => {
            return Err(GameError::InvalidPhase {
                expected: "a betting round",
                actual: record.phase_kind(),
            });
        }
    };

    let (mut next, status) = betting::apply_action(record, player_id, action)?;
    log::debug!("Session {}: player {} {}", next.id, player_id, action);

    match status {
        RoundStatus::Continue { next_bettor } => {
            next.phase = Phase::Betting {
                round,
                bettor: next_bettor,
            };
            Ok(Transition::new(next))
        }
        RoundStatus::Complete => {
            let hint = match round {
                BettingRound::First => Hint::First,
                BettingRound::Second => Hint::Second,
                BettingRound::Third => {
                    reveal(&mut next)?;
                    return Ok(Transition::new(next));
                }
            };
            enter(&mut next, Phase::Hint { hint })?;
            let timer = PhaseTimer {
                epoch: next.phase_epoch,
                phase: next.phase_kind(),
                delay: hint_delay,
            };
            Ok(Transition::with_timer(next, timer))
        }
        RoundStatus::Abandoned => {
            reveal(&mut next)?;
            Ok(Transition::new(next))
        }
    }
}

/// Handle an expired timer. Timers from a phase the session already left
/// fail with [`GameError::StaleTimer`] and change nothing.
pub fn on_timer<R: Rng + ?Sized>(
    record: &SessionRecord,
    timer: PhaseTimer,
    rng: &mut R,
) -> GameResult<Transition> {
    if timer.epoch != record.phase_epoch || timer.phase != record.phase_kind() {
        return Err(GameError::StaleTimer { epoch: timer.epoch });
    }

    let round = match timer.phase {
        PhaseKind::Question => BettingRound::First,
        PhaseKind::Hint1 => BettingRound::Second,
        PhaseKind::Hint2 => BettingRound::Third,
        _ => return Err(GameError::StaleTimer { epoch: timer.epoch }),
    };

    let mut next = record.clone();
    begin_betting_round(&mut next, round, rng)?;
    Ok(Transition::new(next))
}

/// Creator moves on from the reveal: next question, or game over after the
/// last one.
pub fn advance_question(
    record: &SessionRecord,
    actor: PlayerId,
    now: DateTime<Utc>,
) -> GameResult<Transition> {
    require_creator(record, actor, "advance to the next question")?;
    require_phase(record, PhaseKind::Reveal, "reveal")?;

    let mut next = record.clone();

    if next.is_last_question() {
        enter(&mut next, Phase::GameOver)?;
        next.status = SessionStatus::Completed;
        log::info!("Session {} is over", next.id);
        return Ok(Transition::new(next));
    }

    for player_id in outcome::clear_for_next_question(&mut next) {
        log::info!("Session {}: player {} is bankrupt", next.id, player_id);
    }
    next.current_question_index += 1;
    let timer = open_question(&mut next, now)?;
    Ok(Transition::with_timer(next, timer))
}

/// Creator starts over after game over with a fresh question set.
pub fn reset_session(
    record: &SessionRecord,
    actor: PlayerId,
    questions: Vec<Question>,
) -> GameResult<SessionRecord> {
    require_creator(record, actor, "start a new game")?;
    require_phase(record, PhaseKind::GameOver, "game over")?;

    let mut next = record.clone();
    outcome::reset_players(&mut next);
    next.questions = questions;
    next.current_question_index = 0;
    next.status = SessionStatus::Waiting;
    enter(&mut next, Phase::Waiting)?;
    Ok(next)
}

/// The timer a freshly loaded session needs, if any. Used when an actor
/// takes over a session whose previous timers died with another process.
pub fn pending_timer(
    record: &SessionRecord,
    now: DateTime<Utc>,
    hint_delay: Duration,
) -> Option<PhaseTimer> {
    let delay = match record.phase {
        Phase::Question { ends_at } => (ends_at - now).to_std().unwrap_or(Duration::ZERO),
        Phase::Hint { .. } => hint_delay,
        _ => return None,
    };

    Some(PhaseTimer {
        epoch: record.phase_epoch,
        phase: record.phase_kind(),
        delay,
    })
}
