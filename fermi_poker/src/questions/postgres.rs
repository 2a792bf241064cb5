use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::{QuestionSource, builtin_questions};
use crate::game::entities::{Difficulty, Question};
use crate::store::StoreResult;

/// Questions stored in the `fermi_questions` table.
pub struct PgQuestionSource {
    pool: PgPool,
}

impl PgQuestionSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a question to the bank, returning its row id
    pub async fn add_question(&self, question: &Question) -> StoreResult<i64> {
        let row = sqlx::query(
            "INSERT INTO fermi_questions (question_text, answer, hint1, hint2, category, difficulty)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&question.text)
        .bind(question.answer)
        .bind(&question.hint1)
        .bind(&question.hint2)
        .bind(&question.category)
        .bind(question.difficulty.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    /// Stock an empty bank with the built-in questions. Returns how many
    /// were added.
    pub async fn seed_builtin(&self) -> StoreResult<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM fermi_questions")
            .fetch_one(&self.pool)
            .await?;
        let existing: i64 = row.try_get("n")?;
        if existing > 0 {
            return Ok(0);
        }

        let questions = builtin_questions();
        for question in &questions {
            self.add_question(question).await?;
        }
        log::info!("Seeded question bank with {} questions", questions.len());
        Ok(questions.len())
    }
}

#[async_trait]
impl QuestionSource for PgQuestionSource {
    async fn fetch_questions(&self, count: usize) -> StoreResult<Vec<Question>> {
        let rows = sqlx::query(
            "SELECT question_text, answer, hint1, hint2, category, difficulty
             FROM fermi_questions ORDER BY RANDOM() LIMIT $1",
        )
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            let difficulty: String = row.try_get("difficulty")?;
            questions.push(Question {
                text: row.try_get("question_text")?,
                answer: row.try_get("answer")?,
                hint1: row.try_get("hint1")?,
                hint2: row.try_get("hint2")?,
                category: row.try_get("category")?,
                // Unknown labels read as medium.
                difficulty: difficulty.parse().unwrap_or(Difficulty::Medium),
            });
        }

        Ok(questions)
    }
}
