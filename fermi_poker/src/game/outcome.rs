//! Outcome resolver: guesses and predictions, winner determination, pot
//! distribution, meta-game scoring and question-boundary maintenance.

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap};

use super::config::PotPolicy;
use super::entities::{
    Chips, Guess, PhaseKind, Player, PlayerId, PlayerState, Prediction, QuestionResult,
    SessionRecord,
};
use super::errors::{GameError, GameResult};

/// Pick the question winner.
///
/// Players whose range contains the answer win by narrowest range; if
/// nobody's range contains it, the closest midpoint wins. Bankrupt players
/// and players without a guess are never picked. Ties go to the earlier
/// submission.
pub fn determine_winner(
    guesses: &BTreeMap<PlayerId, Guess>,
    correct_answer: f64,
    players: &BTreeMap<PlayerId, Player>,
) -> Option<PlayerId> {
    let candidates: Vec<(PlayerId, &Guess)> = players
        .values()
        .filter(|p| p.state != PlayerState::Bankrupt)
        .filter_map(|p| guesses.get(&p.id).map(|g| (p.id, g)))
        .collect();

    let in_range: Vec<(PlayerId, &Guess)> = candidates
        .iter()
        .copied()
        .filter(|(_, g)| g.contains(correct_answer))
        .collect();

    if !in_range.is_empty() {
        return best_by(&in_range, |g| g.width());
    }

    best_by(&candidates, |g| (g.midpoint() - correct_answer).abs())
}

/// Lowest score wins; equal scores fall back to submission order.
fn best_by(candidates: &[(PlayerId, &Guess)], score: impl Fn(&Guess) -> f64) -> Option<PlayerId> {
    candidates
        .iter()
        .min_by(|(_, a), (_, b)| {
            score(a)
                .partial_cmp(&score(b))
                .unwrap_or(Ordering::Equal)
                .then(a.order.cmp(&b.order))
        })
        .map(|(id, _)| *id)
}

/// Pay out the pot, score predictions and record the question result.
///
/// Mutates `record` in place; callers hand in a working copy. Returns the
/// players restored from bankruptcy by the meta-game.
pub fn settle_question(record: &mut SessionRecord) -> GameResult<Vec<PlayerId>> {
    let correct_answer = record
        .current_question()
        .map(|q| q.answer)
        .ok_or_else(|| {
            GameError::InvalidInput(format!(
                "No question at index {}",
                record.current_question_index
            ))
        })?;

    let winner = determine_winner(&record.guesses, correct_answer, &record.players);
    let pot = record.pot;

    let payout = match winner {
        Some(winner_id) => {
            let payout = pot
                .checked_add(record.carry_over)
                .ok_or_else(chip_overflow)?;
            if let Some(p) = record.players.get_mut(&winner_id) {
                p.chips = p.chips.checked_add(payout).ok_or_else(chip_overflow)?;
            }
            record.pot = 0;
            record.carry_over = 0;
            log::debug!(
                "Session {}: player {} wins {} chips (answer {})",
                record.id,
                winner_id,
                payout,
                correct_answer
            );
            payout
        }
        None => {
            match record.config.pot_policy {
                PotPolicy::Forfeit => {
                    record.pot = 0;
                    log::debug!("Session {}: no winner, {} chips forfeited", record.id, pot);
                }
                PotPolicy::RollOver => {
                    record.carry_over = record
                        .carry_over
                        .checked_add(pot)
                        .ok_or_else(chip_overflow)?;
                    record.pot = 0;
                    log::debug!(
                        "Session {}: no winner, carrying {} chips",
                        record.id,
                        record.carry_over
                    );
                }
            }
            0
        }
    };

    record.last_question_result = Some(QuestionResult {
        winner_id: winner,
        correct_answer,
        payout,
    });

    let rejoined = match winner {
        Some(winner_id) if record.config.meta_game_enabled => {
            score_predictions(record, winner_id)
        }
        _ => Vec::new(),
    };

    Ok(rejoined)
}

fn chip_overflow() -> GameError {
    GameError::InvalidInput("Payout exceeds the chip limit".to_string())
}

/// Credit every correct prediction and restore bankrupt predictors who
/// reached the rejoin threshold. Returns the restored players.
pub fn score_predictions(record: &mut SessionRecord, winner_id: PlayerId) -> Vec<PlayerId> {
    let min_predictions = record.config.min_rejoin_predictions;
    let rejoin_chips = record.config.min_rejoin_chips;
    let mut rejoined = Vec::new();

    let correct: Vec<PlayerId> = record
        .predictions
        .iter()
        .filter(|(_, prediction)| prediction.predicted_winner_id == winner_id)
        .map(|(id, _)| *id)
        .collect();

    for predictor_id in correct {
        let Some(player) = record.players.get_mut(&predictor_id) else {
            continue;
        };
        player.correct_predictions += 1;

        if player.state == PlayerState::Bankrupt && player.correct_predictions >= min_predictions {
            player.state = PlayerState::Active;
            player.chips = rejoin_chips;
            player.correct_predictions = 0;
            rejoined.push(predictor_id);
            log::info!(
                "Session {}: player {} rejoined with {} chips",
                record.id,
                predictor_id,
                rejoin_chips
            );
        }
    }

    rejoined
}

/// Record a guess for the current question.
pub fn submit_guess(
    record: &SessionRecord,
    player_id: PlayerId,
    lower_bound: f64,
    upper_bound: f64,
) -> GameResult<SessionRecord> {
    let phase = record.phase_kind();
    if phase != PhaseKind::Question {
        return Err(GameError::InvalidPhase {
            expected: "question",
            actual: phase,
        });
    }

    if !record.players.contains_key(&player_id) {
        return Err(GameError::PlayerNotFound(player_id));
    }

    if !lower_bound.is_finite() || !upper_bound.is_finite() {
        return Err(GameError::InvalidInput(
            "Bounds must be finite numbers".to_string(),
        ));
    }

    if lower_bound < 0.0 || upper_bound < 0.0 {
        return Err(GameError::InvalidInput(
            "Bounds must be positive numbers".to_string(),
        ));
    }

    if lower_bound >= upper_bound {
        return Err(GameError::InvalidInput(
            "Lower bound must be less than upper bound".to_string(),
        ));
    }

    if record.guesses.contains_key(&player_id) {
        return Err(GameError::AlreadySubmitted("guess"));
    }

    let mut next = record.clone();
    let order = next.guesses.len() as u32;
    next.guesses.insert(
        player_id,
        Guess {
            lower_bound,
            upper_bound,
            order,
        },
    );
    Ok(next)
}

/// Record a meta-game prediction for the current question.
pub fn submit_prediction(
    record: &SessionRecord,
    player_id: PlayerId,
    predicted_winner_id: PlayerId,
) -> GameResult<SessionRecord> {
    if !record.config.meta_game_enabled {
        return Err(GameError::InvalidInput(
            "Meta-game is not enabled for this session".to_string(),
        ));
    }

    let phase = record.phase_kind();
    if !matches!(
        phase,
        PhaseKind::Question
            | PhaseKind::BettingRound1
            | PhaseKind::Hint1
            | PhaseKind::BettingRound2
            | PhaseKind::Hint2
            | PhaseKind::BettingRound3
    ) {
        return Err(GameError::InvalidPhase {
            expected: "an open question",
            actual: phase,
        });
    }

    if !record.players.contains_key(&player_id) {
        return Err(GameError::PlayerNotFound(player_id));
    }

    if !record.players.contains_key(&predicted_winner_id) {
        return Err(GameError::InvalidInput(
            "Please select a player in this session".to_string(),
        ));
    }

    if record.predictions.contains_key(&player_id) {
        return Err(GameError::AlreadySubmitted("prediction"));
    }

    let mut next = record.clone();
    next.predictions.insert(
        player_id,
        Prediction {
            predicted_winner_id,
        },
    );
    Ok(next)
}

/// Question-boundary maintenance: bankrupt empty stacks, clear folds and
/// clear the per-question hand state.
pub fn clear_for_next_question(record: &mut SessionRecord) -> Vec<PlayerId> {
    let mut bankrupted = Vec::new();
    for player in record.players.values_mut() {
        if player.state == PlayerState::Active && player.chips <= 0 {
            player.state = PlayerState::Bankrupt;
            bankrupted.push(player.id);
        }
        player.folded_question_indices.clear();
    }

    clear_hand(record);
    bankrupted
}

/// Reset every player for a fresh game.
pub fn reset_players(record: &mut SessionRecord) {
    let starting_chips = record.config.starting_chips;
    for player in record.players.values_mut() {
        player.chips = starting_chips;
        player.state = PlayerState::Active;
        player.folded_question_indices.clear();
        player.correct_predictions = 0;
    }

    clear_hand(record);
    record.carry_over = 0;
    record.last_question_result = None;
}

fn clear_hand(record: &mut SessionRecord) {
    record.guesses.clear();
    record.predictions.clear();
    record.current_bets.clear();
    record.pot = 0;
    record.current_bet = 0;
}

/// One line of the leaderboard
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Standing {
    pub rank: usize,
    pub player_id: PlayerId,
    pub username: String,
    pub chips: Chips,
    pub state: PlayerState,
}

/// Players by chips, richest first; ties by player id.
pub fn standings(record: &SessionRecord) -> Vec<Standing> {
    let mut players: Vec<&Player> = record.players.values().collect();
    players.sort_by(|a, b| b.chips.cmp(&a.chips).then(a.id.cmp(&b.id)));

    players
        .into_iter()
        .enumerate()
        .map(|(i, p)| Standing {
            rank: i + 1,
            player_id: p.id,
            username: p.username.clone(),
            chips: p.chips,
            state: p.state_for(record.current_question_index),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        config::SessionConfig,
        entities::{Difficulty, Phase, Question},
    };
    use chrono::Utc;

    fn guess(lower: f64, upper: f64, order: u32) -> Guess {
        Guess {
            lower_bound: lower,
            upper_bound: upper,
            order,
        }
    }

    fn players(ids: &[PlayerId]) -> BTreeMap<PlayerId, Player> {
        ids.iter()
            .map(|&id| (id, Player::new(id, &format!("p{id}"), 100)))
            .collect()
    }

    fn question(answer: f64) -> Question {
        Question {
            text: "How many?".to_string(),
            answer,
            hint1: "h1".to_string(),
            hint2: "h2".to_string(),
            category: "test".to_string(),
            difficulty: Difficulty::Easy,
        }
    }

    fn record_with(ids: &[PlayerId], answer: f64) -> SessionRecord {
        let mut record = SessionRecord::new(
            "test",
            "AAAAAA".to_string(),
            ids[0],
            "p",
            SessionConfig {
                meta_game_enabled: true,
                ..SessionConfig::default()
            },
            vec![question(answer)],
        );
        record.players = players(ids);
        record.phase = Phase::Question {
            ends_at: Utc::now(),
        };
        record
    }

    #[test]
    fn test_narrowest_in_range_wins() {
        let mut guesses = BTreeMap::new();
        guesses.insert(1, guess(100.0, 200.0, 1));
        guesses.insert(2, guess(50.0, 500.0, 0));
        assert_eq!(determine_winner(&guesses, 150.0, &players(&[1, 2])), Some(1));
    }

    #[test]
    fn test_closest_midpoint_when_nobody_in_range() {
        let mut guesses = BTreeMap::new();
        guesses.insert(1, guess(0.0, 10.0, 0));
        guesses.insert(2, guess(100.0, 120.0, 1));
        assert_eq!(determine_winner(&guesses, 50.0, &players(&[1, 2])), Some(1));
    }

    #[test]
    fn test_tie_goes_to_earliest_submission() {
        let mut guesses = BTreeMap::new();
        guesses.insert(1, guess(100.0, 200.0, 1));
        guesses.insert(2, guess(120.0, 220.0, 0));
        assert_eq!(determine_winner(&guesses, 150.0, &players(&[1, 2])), Some(2));
    }

    #[test]
    fn test_bankrupt_and_silent_players_never_win() {
        let mut all = players(&[1, 2, 3]);
        all.get_mut(&1).unwrap().state = PlayerState::Bankrupt;
        let mut guesses = BTreeMap::new();
        guesses.insert(1, guess(149.0, 151.0, 0));
        guesses.insert(2, guess(0.0, 1.0, 1));
        assert_eq!(determine_winner(&guesses, 150.0, &all), Some(2));
        assert_eq!(determine_winner(&BTreeMap::new(), 150.0, &all), None);
    }

    #[test]
    fn test_winner_takes_whole_pot() {
        let mut record = record_with(&[1, 2], 150.0);
        record.guesses.insert(1, guess(100.0, 200.0, 0));
        record.pot = 60;
        record.players.get_mut(&1).unwrap().chips = 70;
        record.players.get_mut(&2).unwrap().chips = 70;

        settle_question(&mut record).unwrap();
        assert_eq!(record.players[&1].chips, 130);
        assert_eq!(record.pot, 0);
        let result = record.last_question_result.unwrap();
        assert_eq!(result.winner_id, Some(1));
        assert_eq!(result.payout, 60);
    }

    #[test]
    fn test_no_guesses_forfeits_pot() {
        let mut record = record_with(&[1, 2], 150.0);
        record.pot = 40;
        let before: Chips = record.players.values().map(|p| p.chips).sum();

        settle_question(&mut record).unwrap();
        let after: Chips = record.players.values().map(|p| p.chips).sum();
        assert_eq!(before, after);
        assert_eq!(record.pot, 0);
        assert_eq!(record.carry_over, 0);
        let result = record.last_question_result.unwrap();
        assert_eq!(result.winner_id, None);
        assert_eq!(result.correct_answer, 150.0);
    }

    #[test]
    fn test_roll_over_pays_next_winner() {
        let mut record = record_with(&[1, 2], 150.0);
        record.config.pot_policy = PotPolicy::RollOver;
        record.pot = 40;
        settle_question(&mut record).unwrap();
        assert_eq!(record.carry_over, 40);

        record.pot = 10;
        record.guesses.insert(2, guess(0.0, 1.0, 0));
        settle_question(&mut record).unwrap();
        assert_eq!(record.players[&2].chips, 150);
        assert_eq!(record.carry_over, 0);
    }

    #[test]
    fn test_overflowing_payout_is_rejected_without_paying() {
        let mut record = record_with(&[1, 2], 150.0);
        record.guesses.insert(1, guess(100.0, 200.0, 0));
        record.players.get_mut(&1).unwrap().chips = Chips::MAX - 10;
        record.pot = 20;

        assert!(matches!(
            settle_question(&mut record),
            Err(GameError::InvalidInput(_))
        ));
        assert_eq!(record.players[&1].chips, Chips::MAX - 10);
        assert_eq!(record.pot, 20);
        assert!(record.last_question_result.is_none());

        record.players.get_mut(&1).unwrap().chips = 0;
        record.pot = Chips::MAX;
        record.carry_over = 1;
        assert!(settle_question(&mut record).is_err());
        assert_eq!(record.carry_over, 1);
    }

    #[test]
    fn test_third_correct_prediction_rejoins_bankrupt_player() {
        let mut record = record_with(&[1, 2, 3], 150.0);
        {
            let broke = record.players.get_mut(&3).unwrap();
            broke.chips = 0;
            broke.state = PlayerState::Bankrupt;
            broke.correct_predictions = 2;
        }
        record.guesses.insert(1, guess(100.0, 200.0, 0));
        record.predictions.insert(3, Prediction { predicted_winner_id: 1 });
        record.predictions.insert(2, Prediction { predicted_winner_id: 2 });

        let rejoined = settle_question(&mut record).unwrap();
        assert_eq!(rejoined, vec![3]);
        let player = &record.players[&3];
        assert_eq!(player.state, PlayerState::Active);
        assert_eq!(player.chips, 50);
        assert_eq!(player.correct_predictions, 0);
        assert_eq!(record.players[&2].correct_predictions, 0);
    }

    #[test]
    fn test_predictions_ignored_without_meta_game() {
        let mut record = record_with(&[1, 2], 150.0);
        record.config.meta_game_enabled = false;
        record.guesses.insert(1, guess(100.0, 200.0, 0));
        record.predictions.insert(2, Prediction { predicted_winner_id: 1 });
        settle_question(&mut record).unwrap();
        assert_eq!(record.players[&2].correct_predictions, 0);
    }

    #[test]
    fn test_guess_validation() {
        let record = record_with(&[1, 2], 150.0);
        assert!(matches!(
            submit_guess(&record, 1, 10.0, 10.0),
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            submit_guess(&record, 1, 20.0, 10.0),
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            submit_guess(&record, 1, -5.0, 10.0),
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            submit_guess(&record, 9, 1.0, 10.0),
            Err(GameError::PlayerNotFound(9))
        ));

        let record = submit_guess(&record, 1, 1.0, 10.0).unwrap();
        assert!(matches!(
            submit_guess(&record, 1, 2.0, 20.0),
            Err(GameError::AlreadySubmitted("guess"))
        ));
        let record = submit_guess(&record, 2, 2.0, 20.0).unwrap();
        assert_eq!(record.guesses[&2].order, 1);
    }

    #[test]
    fn test_prediction_only_once() {
        let record = record_with(&[1, 2], 150.0);
        let record = submit_prediction(&record, 1, 2).unwrap();
        assert!(matches!(
            submit_prediction(&record, 1, 1),
            Err(GameError::AlreadySubmitted("prediction"))
        ));
        assert!(matches!(
            submit_prediction(&record, 2, 42),
            Err(GameError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_boundary_bankrupts_and_clears() {
        let mut record = record_with(&[1, 2], 150.0);
        record.players.get_mut(&1).unwrap().chips = 0;
        record
            .players
            .get_mut(&2)
            .unwrap()
            .folded_question_indices
            .insert(0);
        record.current_bets.insert(2, 10);
        record.current_bet = 10;
        record.guesses.insert(2, guess(1.0, 2.0, 0));

        let bankrupted = clear_for_next_question(&mut record);
        assert_eq!(bankrupted, vec![1]);
        assert_eq!(record.players[&1].state, PlayerState::Bankrupt);
        assert!(record.players[&2].folded_question_indices.is_empty());
        assert!(record.guesses.is_empty());
        assert!(record.current_bets.is_empty());
        assert_eq!(record.current_bet, 0);
    }

    #[test]
    fn test_standings_sorted_by_chips() {
        let mut record = record_with(&[1, 2, 3], 150.0);
        record.players.get_mut(&1).unwrap().chips = 10;
        record.players.get_mut(&3).unwrap().chips = 300;
        let table = standings(&record);
        let order: Vec<PlayerId> = table.iter().map(|s| s.player_id).collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(table[0].rank, 1);
    }
}
