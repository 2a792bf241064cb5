//! Question supply and invite codes.

use async_trait::async_trait;
use rand::{Rng, seq::SliceRandom};

use crate::game::{
    constants::{INVITE_CODE_ALPHABET, INVITE_CODE_LEN},
    entities::Question,
};
use crate::store::StoreResult;

pub mod bank;
pub mod postgres;

pub use bank::{BuiltinQuestions, builtin_questions};
pub use postgres::PgQuestionSource;

/// Trait for question bank operations
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Up to `count` questions in random order
    async fn fetch_questions(&self, count: usize) -> StoreResult<Vec<Question>>;
}

/// Draw `count` questions for a new game.
///
/// Falls back to the shuffled built-in set when the source fails or comes up
/// short.
pub async fn draw_questions(source: &dyn QuestionSource, count: usize) -> Vec<Question> {
    let fetched = match source.fetch_questions(count).await {
        Ok(questions) if questions.len() >= count => Some(questions),
        Ok(questions) => {
            log::warn!(
                "Question source returned {} of {} questions, using built-in set",
                questions.len(),
                count
            );
            None
        }
        Err(e) => {
            log::warn!("Question source failed, using built-in set: {}", e);
            None
        }
    };

    let mut rng = rand::rng();
    match fetched {
        Some(questions) => pick_questions(questions, count, &mut rng),
        None => pick_questions(builtin_questions(), count, &mut rng),
    }
}

/// Shuffle `pool` and take `count` questions, cycling through the pool again
/// if it is smaller than `count`.
pub fn pick_questions<R: Rng + ?Sized>(
    mut pool: Vec<Question>,
    count: usize,
    rng: &mut R,
) -> Vec<Question> {
    if pool.is_empty() {
        return Vec::new();
    }

    pool.shuffle(rng);
    pool.iter().cycle().take(count).cloned().collect()
}

/// A fresh invite code, e.g. `K7QXM2`. Excludes look-alike characters.
pub fn generate_invite_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_CODE_ALPHABET[rng.random_range(0..INVITE_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form of a user-typed invite code, or `None` if it cannot be one.
pub fn normalize_invite_code(code: &str) -> Option<String> {
    let code = code.trim().to_ascii_uppercase();
    (code.len() == INVITE_CODE_LEN && code.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use rand::{SeedableRng, rngs::StdRng};

    struct FailingSource;

    #[async_trait]
    impl QuestionSource for FailingSource {
        async fn fetch_questions(&self, _count: usize) -> StoreResult<Vec<Question>> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_builtin_set_has_ten_questions() {
        let questions = builtin_questions();
        assert_eq!(questions.len(), 10);
        assert!(questions.iter().all(|q| q.answer > 0.0));
    }

    #[tokio::test]
    async fn test_failing_source_falls_back_to_builtin() {
        let questions = draw_questions(&FailingSource, 5).await;
        assert_eq!(questions.len(), 5);
        let builtin = builtin_questions();
        assert!(questions.iter().all(|q| builtin.contains(q)));
    }

    #[tokio::test]
    async fn test_short_source_falls_back_and_cycles() {
        let questions = draw_questions(&BuiltinQuestions, 12).await;
        assert_eq!(questions.len(), 12);
    }

    #[test]
    fn test_pick_questions_without_repeats_when_pool_suffices() {
        let mut rng = StdRng::seed_from_u64(11);
        let picked = pick_questions(builtin_questions(), 10, &mut rng);
        let mut texts: Vec<&str> = picked.iter().map(|q| q.text.as_str()).collect();
        texts.sort();
        texts.dedup();
        assert_eq!(texts.len(), 10);
    }

    #[test]
    fn test_invite_codes() {
        let mut rng = StdRng::seed_from_u64(3);
        let code = generate_invite_code(&mut rng);
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert!(code.bytes().all(|b| INVITE_CODE_ALPHABET.contains(&b)));
        assert_eq!(normalize_invite_code(" k7qxm2 "), Some("K7QXM2".to_string()));
        assert_eq!(normalize_invite_code("K7QX"), None);
    }
}
