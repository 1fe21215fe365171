//! Evaluator Adapter: turns a frozen response into a scored evaluation.
//!
//! Two interchangeable strategies sit behind [`EvaluatorAdapter`]:
//!
//! - [`HeuristicEvaluator`]: deterministic keyword, exact-match and
//!   test-case scoring, no network
//! - [`RemoteEvaluator`]: asks an LLM for a structured verdict
//!
//! The adapter never fails. When a strategy errors or times out the
//! question still receives an [`Evaluation`], marked degraded with a zero
//! score, so the session can always move on.

mod heuristic;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collector::Response;
use crate::error::{EvaluatorError, EvaluatorResult};
use crate::question::Question;

pub use heuristic::{HeuristicEvaluator, NO_ANSWER_IMPROVEMENT, POINTS_PER_COVERED_POINT};
pub use remote::RemoteEvaluator;

/// Structured feedback attached to an evaluation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Feedback {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub narrative: String,
}

/// The scored result for one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub question_id: String,
    /// Always within `0..=max_score`.
    pub score: f64,
    pub max_score: u32,
    pub feedback: Feedback,
    /// True when produced as a fallback after an evaluator failure.
    pub degraded: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl Evaluation {
    /// Create an evaluation, clamping the score into range.
    pub fn new(question_id: impl Into<String>, score: f64, max_score: u32, feedback: Feedback) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, max_score as f64)
        } else {
            0.0
        };

        Self {
            question_id: question_id.into(),
            score,
            max_score,
            feedback,
            degraded: false,
            evaluated_at: Utc::now(),
        }
    }

    /// Fallback evaluation after a strategy failure.
    pub fn degraded(question: &Question, error: &EvaluatorError) -> Self {
        let mut evaluation = Self::new(
            &question.id,
            0.0,
            question.max_score,
            Feedback {
                strengths: Vec::new(),
                improvements: vec!["Automatic evaluation was unavailable for this answer".to_string()],
                narrative: format!("Evaluation could not be completed: {}", error),
            },
        );
        evaluation.degraded = true;
        evaluation
    }
}

/// A scoring strategy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Score one response to `question`.
    async fn evaluate(&self, question: &Question, response: &Response) -> EvaluatorResult<Evaluation>;
}

/// The configured scoring strategy.
#[derive(Clone)]
pub enum EvaluatorAdapter {
    /// Local heuristic scoring
    Local(HeuristicEvaluator),
    /// LLM-backed scoring
    Remote(RemoteEvaluator),
    /// Any other strategy
    Custom(Arc<dyn Evaluator>),
}

impl Default for EvaluatorAdapter {
    fn default() -> Self {
        Self::Local(HeuristicEvaluator::new())
    }
}

impl std::fmt::Debug for EvaluatorAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.strategy())
    }
}

impl EvaluatorAdapter {
    /// Short name of the active strategy.
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
            Self::Custom(_) => "custom",
        }
    }

    /// Score a response. Never fails.
    ///
    /// Empty answers are scored locally without consulting the strategy.
    pub async fn evaluate(&self, question: &Question, response: &Response) -> Evaluation {
        if response.payload.is_empty() {
            debug!(question_id = %question.id, "Scoring empty answer locally");
            return heuristic::empty_answer(question);
        }

        let result = match self {
            Self::Local(local) => Ok(local.score(question, response)),
            Self::Remote(remote) => remote.evaluate(question, response).await,
            Self::Custom(custom) => custom.evaluate(question, response).await,
        };

        match result {
            Ok(mut evaluation) => {
                // Strategies may not bypass the range invariant.
                evaluation.score = if evaluation.score.is_finite() {
                    evaluation.score.clamp(0.0, question.max_score as f64)
                } else {
                    0.0
                };
                evaluation.max_score = question.max_score;
                evaluation.question_id = question.id.clone();
                evaluation
            }
            Err(e) => {
                warn!(
                    question_id = %question.id,
                    strategy = self.strategy(),
                    error = %e,
                    "Evaluation failed, recording degraded result"
                );
                Evaluation::degraded(question, &e)
            }
        }
    }
}
