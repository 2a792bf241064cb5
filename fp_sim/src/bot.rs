//! Simulated players: noisy estimates, predictions and betting decisions.

use fermi_poker::{
    BetAction, PlayerId, SessionRecord,
    game::{Guess, betting},
};
use rand::{Rng, seq::IndexedRandom};

/// Decision thresholds, expressed as a confidence in [0.0, 1.0].
#[derive(Debug, Clone)]
pub struct BotDecisionConfig {
    /// Confidence below this folds when chips are owed.
    pub fold_threshold: f64,

    /// Confidence above this considers raising.
    pub raise_threshold: f64,

    /// Chance of raising once above the raise threshold.
    pub raise_probability: f64,

    /// Chance of calling below the fold threshold anyway.
    pub bluff_call_probability: f64,

    /// Raise size as a fraction of the pot, on top of the current bet.
    pub raise_pot_fraction: f64,

    /// Smallest raise increment.
    pub min_raise: i64,
}

impl Default for BotDecisionConfig {
    fn default() -> Self {
        Self {
            fold_threshold: 0.25,
            raise_threshold: 0.7,
            raise_probability: 0.5,
            bluff_call_probability: 0.15,
            raise_pot_fraction: 0.5,
            min_raise: 10,
        }
    }
}

/// A seated bot.
///
/// `skill` is how many orders of magnitude its point estimate may be off by;
/// `spread` widens the range around that estimate.
#[derive(Debug, Clone)]
pub struct Bot {
    pub id: PlayerId,
    pub name: String,
    pub skill: f64,
    pub spread: f64,
}

impl Bot {
    pub fn new<R: Rng + ?Sized>(id: PlayerId, rng: &mut R) -> Self {
        Self {
            id,
            name: format!("bot{id}"),
            skill: rng.random_range(0.1..1.0),
            spread: rng.random_range(1.2..4.0),
        }
    }

    /// A range around a noisy estimate of `answer`.
    pub fn guess<R: Rng + ?Sized>(&self, answer: f64, rng: &mut R) -> (f64, f64) {
        if !answer.is_finite() || answer <= 0.0 {
            return (0.0, 1.0);
        }
        let estimate = answer * 10f64.powf(rng.random_range(-self.skill..=self.skill));
        (estimate / self.spread, estimate * self.spread)
    }

    /// Pick another seated player to back as the winner.
    pub fn predict<R: Rng + ?Sized>(
        &self,
        record: &SessionRecord,
        rng: &mut R,
    ) -> Option<PlayerId> {
        let others: Vec<PlayerId> = record
            .players
            .keys()
            .copied()
            .filter(|id| *id != self.id)
            .collect();
        others.choose(rng).copied()
    }
}

/// How sure a bot is that `guess` wins, given the true answer.
///
/// Bots peek at the answer; a containing range scores by how tight it is,
/// a missing one by how close its nearer bound landed.
pub fn confidence(guess: Option<&Guess>, answer: f64) -> f64 {
    let Some(guess) = guess else {
        return 0.0;
    };
    let upper = guess.upper_bound.max(f64::MIN_POSITIVE);
    let lower = guess.lower_bound.max(f64::MIN_POSITIVE);

    if guess.contains(answer) {
        let decades = (upper / lower).log10();
        (1.0 - decades / 4.0).clamp(0.5, 1.0)
    } else {
        let miss = if answer < lower {
            (lower / answer.max(f64::MIN_POSITIVE)).log10()
        } else {
            (answer / upper).log10()
        };
        (0.4 - miss / 2.0).clamp(0.0, 0.4)
    }
}

/// Bot decision maker
pub struct BotDecisionMaker {
    config: BotDecisionConfig,
}

impl Default for BotDecisionMaker {
    fn default() -> Self {
        Self::with_config(BotDecisionConfig::default())
    }
}

impl BotDecisionMaker {
    pub fn with_config(config: BotDecisionConfig) -> Self {
        Self { config }
    }

    /// Choose an action for `bot` as the current bettor of `record`.
    pub fn decide<R: Rng + ?Sized>(
        &self,
        bot: &Bot,
        record: &SessionRecord,
        rng: &mut R,
    ) -> BetAction {
        let Some(player) = record.player(bot.id) else {
            return BetAction::Fold;
        };
        let to_call = betting::amount_to_call(record, bot.id);
        if to_call > player.chips {
            return BetAction::Fold;
        }

        let answer = record.current_question().map_or(0.0, |q| q.answer);
        let strength = confidence(record.guesses.get(&bot.id), answer);

        if strength >= self.config.raise_threshold
            && rng.random_bool(self.config.raise_probability)
        {
            let increment = ((record.pot as f64 * self.config.raise_pot_fraction) as i64)
                .max(self.config.min_raise);
            let target = record.current_bet + increment;
            let affordable = record.bet_of(bot.id) + player.chips;
            if target.min(affordable) > record.current_bet {
                return BetAction::Raise(target.min(affordable));
            }
            return BetAction::Call;
        }

        if to_call == 0 || strength >= self.config.fold_threshold {
            return BetAction::Call;
        }

        if rng.random_bool(self.config.bluff_call_probability) {
            BetAction::Call
        } else {
            BetAction::Fold
        }
    }
}
