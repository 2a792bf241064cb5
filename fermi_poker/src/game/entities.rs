use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use super::{config::SessionConfig, constants};

pub type PlayerId = i64;
pub type SessionId = i64;

/// Type alias for chip amounts. Stacks never go negative, but the signed
/// type keeps bankruptcy checks (`chips <= 0`) honest.
pub type Chips = i64;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Active,
    /// Only ever reported by [`Player::state_for`]; folding is tracked per
    /// question through `folded_question_indices`.
    Folded,
    Bankrupt,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Active => "active",
            Self::Folded => "folded",
            Self::Bankrupt => "bankrupt",
        };
        write!(f, "{repr}")
    }
}

/// Normalize a display name: whitespace becomes underscores and the result
/// is truncated to [`constants::MAX_USERNAME_LENGTH`] characters.
pub fn normalize_username(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .take(constants::MAX_USERNAME_LENGTH)
        .collect()
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub chips: Chips,
    pub state: PlayerState,
    pub folded_question_indices: BTreeSet<usize>,
    pub correct_predictions: u32,
}

impl Player {
    pub fn new(id: PlayerId, username: &str, chips: Chips) -> Self {
        Self {
            id,
            username: normalize_username(username),
            chips,
            state: PlayerState::Active,
            folded_question_indices: BTreeSet::new(),
            correct_predictions: 0,
        }
    }

    pub fn has_folded(&self, question_index: usize) -> bool {
        self.folded_question_indices.contains(&question_index)
    }

    /// Active and still in the hand for this question.
    pub fn is_eligible(&self, question_index: usize) -> bool {
        self.state == PlayerState::Active && !self.has_folded(question_index)
    }

    /// State as seen by other players during a question.
    pub fn state_for(&self, question_index: usize) -> PlayerState {
        match self.state {
            PlayerState::Active if self.has_folded(question_index) => PlayerState::Folded,
            state => state,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        };
        write!(f, "{repr}")
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// A Fermi-estimate question. Never mutated once drawn into a session.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Question {
    pub text: String,
    pub answer: f64,
    pub hint1: String,
    pub hint2: String,
    pub category: String,
    pub difficulty: Difficulty,
}

/// A player's estimate for the current question.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Guess {
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Submission ordinal within the question, used to break ties.
    pub order: u32,
}

impl Guess {
    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }

    pub fn midpoint(&self) -> f64 {
        (self.lower_bound + self.upper_bound) / 2.0
    }

    pub fn contains(&self, answer: f64) -> bool {
        self.lower_bound <= answer && answer <= self.upper_bound
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Prediction {
    pub predicted_winner_id: PlayerId,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct QuestionResult {
    pub winner_id: Option<PlayerId>,
    pub correct_answer: f64,
    /// Chips paid to the winner (zero when nobody won).
    pub payout: Chips,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    InProgress,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BettingRound {
    First,
    Second,
    Third,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hint {
    First,
    Second,
}

/// Session phase. Data that only matters in one phase lives in that
/// phase's variant.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Question { ends_at: DateTime<Utc> },
    Betting { round: BettingRound, bettor: PlayerId },
    Hint { hint: Hint },
    Reveal,
    GameOver,
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Self::Waiting => PhaseKind::Waiting,
            Self::Question { .. } => PhaseKind::Question,
            Self::Betting { round, .. } => match round {
                BettingRound::First => PhaseKind::BettingRound1,
                BettingRound::Second => PhaseKind::BettingRound2,
                BettingRound::Third => PhaseKind::BettingRound3,
            },
            Self::Hint { hint } => match hint {
                Hint::First => PhaseKind::Hint1,
                Hint::Second => PhaseKind::Hint2,
            },
            Self::Reveal => PhaseKind::Reveal,
            Self::GameOver => PhaseKind::GameOver,
        }
    }
}

/// Payload-free phase tag, used for transition checks and timers.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Waiting,
    Question,
    BettingRound1,
    Hint1,
    BettingRound2,
    Hint2,
    BettingRound3,
    Reveal,
    GameOver,
}

impl PhaseKind {
    /// Whether `self -> next` is a legal edge of the phase graph.
    pub fn can_transition_to(self, next: PhaseKind) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Question)
                | (Self::Question, Self::BettingRound1)
                | (Self::BettingRound1, Self::Hint1)
                | (Self::Hint1, Self::BettingRound2)
                | (Self::BettingRound2, Self::Hint2)
                | (Self::Hint2, Self::BettingRound3)
                | (
                    Self::Question
                        | Self::BettingRound1
                        | Self::Hint1
                        | Self::BettingRound2
                        | Self::Hint2
                        | Self::BettingRound3,
                    Self::Reveal
                )
                | (Self::Reveal, Self::Question)
                | (Self::Reveal, Self::GameOver)
                | (Self::GameOver, Self::Waiting)
        )
    }

    pub fn is_betting(self) -> bool {
        matches!(
            self,
            PhaseKind::BettingRound1 | PhaseKind::BettingRound2 | PhaseKind::BettingRound3
        )
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Question => "question",
            Self::BettingRound1 => "betting_round_1",
            Self::Hint1 => "hint_1",
            Self::BettingRound2 => "betting_round_2",
            Self::Hint2 => "hint_2",
            Self::BettingRound3 => "betting_round_3",
            Self::Reveal => "reveal",
            Self::GameOver => "game_over",
        };
        write!(f, "{repr}")
    }
}

/// The complete mutable state of one game.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub name: String,
    pub invite_code: String,
    pub creator_id: PlayerId,
    pub status: SessionStatus,
    pub phase: Phase,
    /// Bumped on every phase change. Timers capture it to detect staleness.
    pub phase_epoch: u64,
    /// Bumped on every persisted write. Backs compare-and-swap in the store.
    pub version: u64,
    pub current_question_index: usize,
    pub questions: Vec<Question>,
    pub players: BTreeMap<PlayerId, Player>,
    /// Chips each player has put in during the current question.
    pub current_bets: BTreeMap<PlayerId, Chips>,
    /// Highest total bet of the current question.
    pub current_bet: Chips,
    pub pot: Chips,
    /// Unclaimed chips waiting for the next winner under
    /// [`super::config::PotPolicy::RollOver`].
    #[serde(default)]
    pub carry_over: Chips,
    pub guesses: BTreeMap<PlayerId, Guess>,
    pub predictions: BTreeMap<PlayerId, Prediction>,
    pub last_question_result: Option<QuestionResult>,
    pub config: SessionConfig,
}

impl SessionRecord {
    /// Create a waiting session with the creator in the first seat.
    pub fn new(
        name: &str,
        invite_code: String,
        creator_id: PlayerId,
        creator_name: &str,
        config: SessionConfig,
        questions: Vec<Question>,
    ) -> Self {
        let mut players = BTreeMap::new();
        players.insert(
            creator_id,
            Player::new(creator_id, creator_name, config.starting_chips),
        );

        Self {
            id: 0,
            name: name.trim().chars().take(constants::MAX_SESSION_NAME_LENGTH).collect(),
            invite_code,
            creator_id,
            status: SessionStatus::Waiting,
            phase: Phase::Waiting,
            phase_epoch: 0,
            version: 0,
            current_question_index: 0,
            questions,
            players,
            current_bets: BTreeMap::new(),
            current_bet: 0,
            pot: 0,
            carry_over: 0,
            guesses: BTreeMap::new(),
            predictions: BTreeMap::new(),
            last_question_result: None,
            config,
        }
    }

    pub fn phase_kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    pub fn current_bettor(&self) -> Option<PlayerId> {
        match self.phase {
            Phase::Betting { bettor, .. } => Some(bettor),
            _ => None,
        }
    }

    pub fn is_creator(&self, player_id: PlayerId) -> bool {
        self.creator_id == player_id
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    /// Ids of players still in the hand, in id order.
    pub fn eligible_players(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.is_eligible(self.current_question_index))
            .map(|p| p.id)
            .collect()
    }

    pub fn bet_of(&self, player_id: PlayerId) -> Chips {
        self.current_bets.get(&player_id).copied().unwrap_or(0)
    }

    /// Chips in stacks plus chips in the pot.
    pub fn chips_in_play(&self) -> Chips {
        self.players.values().map(|p| p.chips).sum::<Chips>() + self.pot
    }

    pub fn is_last_question(&self) -> bool {
        self.current_question_index + 1 >= self.config.num_questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_normalization() {
        assert_eq!(normalize_username("  ada lovelace "), "ada_lovelace");
        assert_eq!(normalize_username(&"x".repeat(100)).len(), constants::MAX_USERNAME_LENGTH);
    }

    #[test]
    fn test_folded_player_is_reported_folded_only_for_that_question() {
        let mut player = Player::new(1, "ada", 100);
        player.folded_question_indices.insert(2);
        assert_eq!(player.state_for(2), PlayerState::Folded);
        assert_eq!(player.state_for(3), PlayerState::Active);
        assert!(!player.is_eligible(2));
        assert!(player.is_eligible(3));
    }

    #[test]
    fn test_guess_geometry() {
        let guess = Guess {
            lower_bound: 100.0,
            upper_bound: 200.0,
            order: 0,
        };
        assert_eq!(guess.width(), 100.0);
        assert_eq!(guess.midpoint(), 150.0);
        assert!(guess.contains(100.0));
        assert!(guess.contains(200.0));
        assert!(!guess.contains(200.5));
    }

    #[test]
    fn test_phase_graph() {
        use PhaseKind as K;
        assert!(K::Waiting.can_transition_to(K::Question));
        assert!(K::Question.can_transition_to(K::BettingRound1));
        assert!(K::BettingRound2.can_transition_to(K::Reveal));
        assert!(K::Reveal.can_transition_to(K::GameOver));
        assert!(!K::Waiting.can_transition_to(K::BettingRound1));
        assert!(!K::Hint1.can_transition_to(K::BettingRound3));
        assert!(!K::BettingRound3.can_transition_to(K::Hint2));
        assert!(!K::GameOver.can_transition_to(K::Question));
    }

    #[test]
    fn test_phase_serializes_as_tagged_union() {
        let phase = Phase::Betting {
            round: BettingRound::Second,
            bettor: 4,
        };
        let json = serde_json::to_value(&phase).unwrap();
        assert_eq!(json["kind"], "betting");
        assert_eq!(json["round"], "second");
        assert_eq!(phase.kind(), PhaseKind::BettingRound2);
    }

    #[test]
    fn test_record_round_trips_through_json_with_integer_keys() {
        let mut record = SessionRecord::new(
            "Friday",
            "ABC234".to_string(),
            10,
            "host",
            SessionConfig::default(),
            vec![],
        );
        record.players.insert(11, Player::new(11, "guest", 1000));
        record.current_bets.insert(11, 20);

        let json = serde_json::to_string(&record).unwrap();
        let back: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
