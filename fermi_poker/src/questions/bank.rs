//! Built-in Fermi questions, used whenever the question source cannot
//! supply a full set.

use async_trait::async_trait;

use super::QuestionSource;
use crate::game::entities::{Difficulty, Question};
use crate::store::StoreResult;

const BUILTIN: &[(&str, f64, &str, &str, &str, Difficulty)] = &[
    (
        "How many piano tuners are there in Chicago?",
        125.0,
        "The population of Chicago is about 2.7 million",
        "The average piano tuner services about 200 pianos per year",
        "population",
        Difficulty::Medium,
    ),
    (
        "How many sheets of paper are used in the U.S. annually?",
        10_000_000_000.0,
        "There are about 330 million people in the U.S.",
        "The average office worker uses about 10,000 sheets per year",
        "consumption",
        Difficulty::Medium,
    ),
    (
        "How many grains of sand would it take to cover Manhattan?",
        1_000_000_000_000_000.0,
        "Manhattan is about 59 square kilometers",
        "A grain of sand is about 0.5mm in diameter",
        "physical",
        Difficulty::Hard,
    ),
    (
        "How many heartbeats does the average person have in their lifetime?",
        2_500_000_000.0,
        "The average heart rate is about 70 beats per minute",
        "The average human lifespan is about 75 years",
        "biology",
        Difficulty::Easy,
    ),
    (
        "How many pizzas are consumed in the U.S. each day?",
        3_000_000.0,
        "Americans eat about 350 slices of pizza per second",
        "The average pizza has 8 slices",
        "food",
        Difficulty::Medium,
    ),
    (
        "How many commercial flights take off worldwide each day?",
        100_000.0,
        "There are about 20,000 commercial aircraft in service",
        "The average commercial aircraft performs 3-5 flights per day",
        "transportation",
        Difficulty::Medium,
    ),
    (
        "How many breaths will you take in your lifetime?",
        500_000_000.0,
        "The average person breathes about 12-20 times per minute",
        "The average human lifespan is about 75 years",
        "biology",
        Difficulty::Easy,
    ),
    (
        "How many words are in all Harry Potter books combined?",
        1_084_170.0,
        "There are 7 Harry Potter books",
        "The average novel has about 90,000 words",
        "literature",
        Difficulty::Medium,
    ),
    (
        "How many stars are in our galaxy?",
        100_000_000_000.0,
        "Our galaxy is the Milky Way",
        "The diameter of the Milky Way is about 100,000 light years",
        "astronomy",
        Difficulty::Hard,
    ),
    (
        "How many seconds have passed since the year 1900?",
        3_800_000_000.0,
        "There are 86,400 seconds in a day",
        "There are about 365.25 days in a year",
        "time",
        Difficulty::Easy,
    ),
];

/// The ten built-in questions, in a fixed order.
pub fn builtin_questions() -> Vec<Question> {
    BUILTIN
        .iter()
        .map(|&(text, answer, hint1, hint2, category, difficulty)| Question {
            text: text.to_string(),
            answer,
            hint1: hint1.to_string(),
            hint2: hint2.to_string(),
            category: category.to_string(),
            difficulty,
        })
        .collect()
}

/// Question source that always serves the built-in set.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinQuestions;

#[async_trait]
impl QuestionSource for BuiltinQuestions {
    async fn fetch_questions(&self, count: usize) -> StoreResult<Vec<Question>> {
        Ok(builtin_questions().into_iter().take(count).collect())
    }
}
