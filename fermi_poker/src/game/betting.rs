//! Betting resolver: turn order, bet validation, pot accrual and the
//! round-completion check.
//!
//! Functions here never touch the phase itself beyond reading it; the phase
//! engine in [`super::state_machine`] decides what a finished round leads to.

use rand::{Rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::entities::{Chips, PlayerId, SessionRecord};
use super::errors::{GameError, GameResult};

/// A betting decision by the current bettor
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "action", content = "amount", rename_all = "lowercase")]
pub enum BetAction {
    Fold,
    Call,
    /// Raise the question's bet to this total.
    Raise(Chips),
}

impl fmt::Display for BetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fold => write!(f, "fold"),
            Self::Call => write!(f, "call"),
            Self::Raise(amount) => write!(f, "raise to {amount}"),
        }
    }
}

/// Where the betting round stands after an action
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoundStatus {
    /// Someone still owes chips; this player acts next.
    Continue { next_bettor: PlayerId },
    /// Every remaining player has matched, or only one player is left.
    Complete,
    /// Nobody is left in the hand.
    Abandoned,
}

/// Eligible players other than `excluding`, in id order.
pub fn eligible_bettors(record: &SessionRecord, excluding: Option<PlayerId>) -> Vec<PlayerId> {
    record
        .eligible_players()
        .into_iter()
        .filter(|id| Some(*id) != excluding)
        .collect()
}

/// Uniformly random eligible player, or `None` if nobody is in the hand.
pub fn pick_first_bettor<R: Rng + ?Sized>(
    record: &SessionRecord,
    rng: &mut R,
) -> Option<PlayerId> {
    record.eligible_players().choose(rng).copied()
}

/// The first eligible player after `actor` in id order, wrapping around.
pub fn next_bettor(record: &SessionRecord, actor: PlayerId) -> Option<PlayerId> {
    let others = eligible_bettors(record, Some(actor));
    others
        .iter()
        .copied()
        .find(|id| *id > actor)
        .or_else(|| others.first().copied())
}

/// Whether every eligible player other than `excluding` has matched the
/// current bet.
pub fn is_round_complete(record: &SessionRecord, excluding: Option<PlayerId>) -> bool {
    eligible_bettors(record, excluding)
        .into_iter()
        .all(|id| record.bet_of(id) >= record.current_bet)
}

/// Chips `player_id` must add to stay in at the current bet.
pub fn amount_to_call(record: &SessionRecord, player_id: PlayerId) -> Chips {
    (record.current_bet - record.bet_of(player_id)).max(0)
}

/// Validate and apply a betting action, returning the updated record and
/// the round status. The input record is never modified, so a rejected
/// action leaves the session exactly as it was.
pub fn apply_action(
    record: &SessionRecord,
    player_id: PlayerId,
    action: BetAction,
) -> GameResult<(SessionRecord, RoundStatus)> {
    let phase = record.phase_kind();
    if !phase.is_betting() {
        return Err(GameError::InvalidPhase {
            expected: "a betting round",
            actual: phase,
        });
    }

    let player = record
        .player(player_id)
        .ok_or(GameError::PlayerNotFound(player_id))?;

    if record.current_bettor() != Some(player_id) {
        return Err(GameError::NotYourTurn);
    }

    let mut next = record.clone();
    let question_index = record.current_question_index;

    match action {
        BetAction::Fold => {
            if let Some(p) = next.players.get_mut(&player_id) {
                p.folded_question_indices.insert(question_index);
            }
        }
        BetAction::Call => {
            let amount = amount_to_call(record, player_id);
            if amount > player.chips {
                return Err(GameError::InsufficientChips {
                    required: amount,
                    available: player.chips,
                });
            }
            transfer_to_pot(&mut next, player_id, amount)?;
            next.current_bets.insert(player_id, record.current_bet);
        }
        BetAction::Raise(amount) => {
            if amount <= record.current_bet {
                return Err(GameError::InvalidInput(format!(
                    "Raise must exceed the current bet of {}",
                    record.current_bet
                )));
            }
            let transfer = amount - record.bet_of(player_id);
            if transfer > player.chips {
                return Err(GameError::InsufficientChips {
                    required: transfer,
                    available: player.chips,
                });
            }
            transfer_to_pot(&mut next, player_id, transfer)?;
            next.current_bets.insert(player_id, amount);
            next.current_bet = amount;
        }
    }

    let status = round_status(&next, player_id);
    Ok((next, status))
}

/// Round status after `actor` has acted on `record`.
fn round_status(record: &SessionRecord, actor: PlayerId) -> RoundStatus {
    let remaining = record.eligible_players();
    if remaining.is_empty() {
        return RoundStatus::Abandoned;
    }

    // A lone player has nobody left to bet against.
    if remaining.len() == 1 || is_round_complete(record, Some(actor)) {
        return RoundStatus::Complete;
    }

    match next_bettor(record, actor) {
        Some(next_bettor) => RoundStatus::Continue { next_bettor },
        None => RoundStatus::Complete,
    }
}

/// Move `amount` from the player's stack into the pot. Fails without
/// touching either when the pot would overflow.
fn transfer_to_pot(
    record: &mut SessionRecord,
    player_id: PlayerId,
    amount: Chips,
) -> GameResult<()> {
    let pot = record
        .pot
        .checked_add(amount)
        .ok_or_else(|| GameError::InvalidInput("Bet exceeds the chip limit".to_string()))?;
    let player = record
        .players
        .get_mut(&player_id)
        .ok_or(GameError::PlayerNotFound(player_id))?;
    player.chips = player
        .chips
        .checked_sub(amount)
        .ok_or_else(|| GameError::InvalidInput("Bet exceeds the chip limit".to_string()))?;
    record.pot = pot;
    Ok(())
}
