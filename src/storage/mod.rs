//! Persistence Gateway: durable records of finished practice sessions.
//!
//! A [`SessionSnapshot`] is written once per attempt when a session
//! completes (or is abandoned with partial results). Records are
//! append-only and keyed by session id, so saving the same snapshot twice
//! returns the existing record instead of writing a duplicate.

mod sqlite;

pub use sqlite::SqliteStorage;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::Response;
use crate::error::{PersistError, PersistResult};
use crate::evaluator::Evaluation;
use crate::question::Question;

/// Tolerance when comparing the aggregate with the sum of scores.
const SCORE_EPSILON: f64 = 1e-6;

/// How a recorded session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Every question was evaluated.
    Complete,
    /// Abandoned with results for a prefix of the questions.
    Partial,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Complete => "complete",
            SessionOutcome::Partial => "partial",
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionOutcome {
    type Err = PersistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "complete" => Ok(SessionOutcome::Complete),
            "partial" => Ok(SessionOutcome::Partial),
            other => Err(PersistError::Validation {
                message: format!("Unknown session outcome '{}'", other),
            }),
        }
    }
}

/// One question with whatever the learner and evaluator produced for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question: Question,
    pub response: Option<Response>,
    pub evaluation: Option<Evaluation>,
}

impl QuestionResult {
    /// Score awarded, zero when never evaluated.
    pub fn score(&self) -> f64 {
        self.evaluation.as_ref().map_or(0.0, |e| e.score)
    }
}

/// Everything persisted about one session attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_id: String,
    pub outcome: SessionOutcome,
    pub questions: Vec<QuestionResult>,
    /// Sum of evaluation scores.
    pub aggregate_score: f64,
    /// Sum of question maximums.
    pub max_score: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Number of questions that received an evaluation.
    pub fn answered_count(&self) -> usize {
        self.questions.iter().filter(|q| q.evaluation.is_some()).count()
    }

    /// Check the snapshot is internally consistent before writing it.
    pub fn validate(&self) -> PersistResult<()> {
        let invalid = |message: String| Err(PersistError::Validation { message });

        if self.session_id.trim().is_empty() {
            return invalid("Session id is empty".to_string());
        }
        if self.user_id.trim().is_empty() {
            return invalid("User id is empty".to_string());
        }

        for result in &self.questions {
            if let Some(evaluation) = &result.evaluation {
                if evaluation.question_id != result.question.id {
                    return invalid(format!(
                        "Evaluation for '{}' attached to question '{}'",
                        evaluation.question_id, result.question.id
                    ));
                }
                if !(0.0..=result.question.max_score as f64).contains(&evaluation.score) {
                    return invalid(format!(
                        "Score {} for question '{}' is outside 0..={}",
                        evaluation.score, result.question.id, result.question.max_score
                    ));
                }
            }
        }

        let sum: f64 = self.questions.iter().map(QuestionResult::score).sum();
        if (sum - self.aggregate_score).abs() > SCORE_EPSILON {
            return invalid(format!(
                "Aggregate score {} does not match the sum of scores {}",
                self.aggregate_score, sum
            ));
        }

        let max: u32 = self.questions.iter().map(|q| q.question.max_score).sum();
        if max != self.max_score {
            return invalid(format!(
                "Max score {} does not match the sum of question maximums {}",
                self.max_score, max
            ));
        }

        if self.outcome == SessionOutcome::Complete && self.answered_count() != self.questions.len() {
            return invalid("A complete session must evaluate every question".to_string());
        }

        Ok(())
    }
}

/// Identifier of a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A row of the learner's session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub outcome: SessionOutcome,
    pub aggregate_score: f64,
    pub max_score: u32,
    pub question_count: usize,
    pub answered_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Durable store for session snapshots.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Write a snapshot. Saving an already stored session id returns the
    /// existing record unchanged.
    async fn save(&self, snapshot: &SessionSnapshot) -> PersistResult<RecordId>;

    /// Read a stored snapshot back.
    async fn load(&self, id: &RecordId) -> PersistResult<Option<SessionSnapshot>>;

    /// Most recent sessions of a user, newest first.
    async fn history(&self, user_id: &str, limit: u32) -> PersistResult<Vec<SessionSummary>>;
}
