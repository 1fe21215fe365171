//! Question model and the Question Provider seam.
//!
//! A provider turns [`FetchParams`] into an ordered, validated list of
//! [`Question`]s. The session never cares where they came from: the
//! static bank, the builtin set and the LLM generator all return the same
//! shape.

mod bank;
mod builtins;
mod generated;

pub use bank::StaticQuestionBank;
pub use builtins::builtin_questions;
pub use generated::GeneratedQuestionProvider;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};

/// Default per-question maximum score.
pub const DEFAULT_MAX_SCORE: u32 = 10;

/// Kind of answer a question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Pick one of the listed options.
    MultipleChoice,
    /// Written or transcribed spoken answer.
    FreeText,
    /// Program source in a selected language.
    Code,
}

impl QuestionKind {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::FreeText => "free_text",
            QuestionKind::Code => "code",
        }
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "multiple_choice" | "mcq" => Ok(QuestionKind::MultipleChoice),
            "free_text" | "text" => Ok(QuestionKind::FreeText),
            "code" => Ok(QuestionKind::Code),
            _ => Err(format!("Unknown question kind: {}", s)),
        }
    }
}

/// Question difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("Unknown difficulty: {}", s)),
        }
    }
}

/// One input/expected-output pair for a code question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// Expected-answer data. Never shown to the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerKey {
    /// The correct option of a multiple-choice question.
    Choice { correct: String },
    /// Expected discussion points of a free-text question.
    Rubric { points: Vec<String> },
    /// Test cases a code answer must pass.
    TestCases { cases: Vec<TestCase> },
}

/// A question as created by a provider at session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Identifier, unique within a session.
    pub id: String,
    pub kind: QuestionKind,
    /// Display text.
    pub prompt: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Visible options for multiple-choice questions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Per-question budget; absent means the session timer governs.
    #[serde(default)]
    pub time_limit_seconds: Option<u64>,
    #[serde(default = "default_max_score")]
    pub max_score: u32,
    pub answer_key: AnswerKey,
}

fn default_max_score() -> u32 {
    DEFAULT_MAX_SCORE
}

/// The learner-facing part of a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentedQuestion {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub time_limit_seconds: Option<u64>,
    pub max_score: u32,
}

impl Question {
    /// Create a free-text question scored against expected discussion points.
    pub fn free_text(id: impl Into<String>, prompt: impl Into<String>, points: Vec<String>) -> Self {
        Self::new(id, QuestionKind::FreeText, prompt, AnswerKey::Rubric { points })
    }

    /// Create a multiple-choice question.
    pub fn multiple_choice(
        id: impl Into<String>,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct: impl Into<String>,
    ) -> Self {
        let mut question = Self::new(
            id,
            QuestionKind::MultipleChoice,
            prompt,
            AnswerKey::Choice {
                correct: correct.into(),
            },
        );
        question.options = options;
        question
    }

    /// Create a code question with test cases.
    pub fn code(id: impl Into<String>, prompt: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self::new(id, QuestionKind::Code, prompt, AnswerKey::TestCases { cases })
    }

    fn new(
        id: impl Into<String>,
        kind: QuestionKind,
        prompt: impl Into<String>,
        answer_key: AnswerKey,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            prompt: prompt.into(),
            topic: None,
            company: None,
            difficulty: Difficulty::default(),
            options: Vec::new(),
            time_limit_seconds: None,
            max_score: DEFAULT_MAX_SCORE,
            answer_key,
        }
    }

    /// Set the topic
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the company
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Set the difficulty
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Set the per-question time limit
    pub fn with_time_limit(mut self, seconds: u64) -> Self {
        self.time_limit_seconds = Some(seconds);
        self
    }

    /// Set the maximum score
    pub fn with_max_score(mut self, max_score: u32) -> Self {
        self.max_score = max_score;
        self
    }

    /// Strip the answer key for display.
    pub fn presented(&self) -> PresentedQuestion {
        PresentedQuestion {
            id: self.id.clone(),
            kind: self.kind,
            prompt: self.prompt.clone(),
            options: self.options.clone(),
            time_limit_seconds: self.time_limit_seconds,
            max_score: self.max_score,
        }
    }

    /// Check the question is internally consistent.
    pub fn validate(&self) -> ProviderResult<()> {
        let malformed = |message: String| ProviderError::Malformed { message };

        if self.id.trim().is_empty() {
            return Err(malformed("question id cannot be empty".to_string()));
        }
        if self.prompt.trim().is_empty() {
            return Err(malformed(format!("question {} has an empty prompt", self.id)));
        }
        if self.max_score == 0 {
            return Err(malformed(format!("question {} has a zero max score", self.id)));
        }
        if self.time_limit_seconds == Some(0) {
            return Err(malformed(format!("question {} has a zero time limit", self.id)));
        }

        match (&self.kind, &self.answer_key) {
            (QuestionKind::MultipleChoice, AnswerKey::Choice { correct }) => {
                if self.options.len() < 2 {
                    return Err(malformed(format!(
                        "multiple-choice question {} needs at least two options",
                        self.id
                    )));
                }
                if !self.options.iter().any(|o| o == correct) {
                    return Err(malformed(format!(
                        "correct answer of question {} is not one of its options",
                        self.id
                    )));
                }
            }
            (QuestionKind::FreeText, AnswerKey::Rubric { .. }) => {}
            (QuestionKind::Code, AnswerKey::TestCases { .. }) => {}
            (kind, _) => {
                return Err(malformed(format!(
                    "question {} of kind {} has a mismatched answer key",
                    self.id, kind
                )));
            }
        }

        Ok(())
    }
}

/// Validate a fetched set: non-empty, unique ids, each question consistent.
pub fn validate_question_set(questions: &[Question]) -> ProviderResult<()> {
    if questions.is_empty() {
        return Err(ProviderError::Empty);
    }

    let mut seen = HashSet::new();
    for question in questions {
        question.validate()?;
        if !seen.insert(question.id.as_str()) {
            return Err(ProviderError::Malformed {
                message: format!("duplicate question id {}", question.id),
            });
        }
    }

    Ok(())
}

/// Parameters for fetching a question set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchParams {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    /// Role the learner is preparing for (used by generated sets).
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// Desired number of questions.
    pub count: usize,
}

impl FetchParams {
    /// Create params asking for `count` questions
    pub fn new(count: usize) -> Self {
        Self {
            count,
            ..Default::default()
        }
    }

    /// Set the topic
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the company
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Set the position
    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    /// Set the difficulty
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }
}

/// Source of question sets. Stateless apart from its backing source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    /// Fetch an ordered, validated, non-empty question set.
    async fn fetch_questions(&self, params: &FetchParams) -> ProviderResult<Vec<Question>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_kind_round_trips_through_str() {
        for kind in [
            QuestionKind::MultipleChoice,
            QuestionKind::FreeText,
            QuestionKind::Code,
        ] {
            assert_eq!(kind.as_str().parse::<QuestionKind>().unwrap(), kind);
        }
        assert_eq!("mcq".parse::<QuestionKind>().unwrap(), QuestionKind::MultipleChoice);
        assert!("essay".parse::<QuestionKind>().is_err());
    }

    #[test]
    fn test_presented_hides_answer_key() {
        let question = Question::multiple_choice(
            "q1",
            "Which tool builds containers?",
            vec!["Docker".to_string(), "Make".to_string()],
            "Docker",
        );
        let value = serde_json::to_value(question.presented()).unwrap();
        assert!(value.get("answer_key").is_none());
        assert_eq!(value["options"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_validate_rejects_mismatched_key() {
        let mut question = Question::free_text("q1", "Explain arrays", vec![]);
        question.kind = QuestionKind::Code;
        assert!(matches!(
            question.validate(),
            Err(ProviderError::Malformed { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_correct_answer_outside_options() {
        let question = Question::multiple_choice(
            "q1",
            "Pick one",
            vec!["a".to_string(), "b".to_string()],
            "c",
        );
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_validate_question_set_rejects_duplicates() {
        let questions = vec![
            Question::free_text("q1", "One", vec![]),
            Question::free_text("q1", "Two", vec![]),
        ];
        let err = validate_question_set(&questions).unwrap_err();
        assert!(err.to_string().contains("duplicate question id q1"));
    }

    #[test]
    fn test_validate_question_set_rejects_empty() {
        assert!(matches!(
            validate_question_set(&[]),
            Err(ProviderError::Empty)
        ));
    }

    #[test]
    fn test_question_deserializes_with_defaults() {
        let question: Question = serde_json::from_value(serde_json::json!({
            "id": "q1",
            "kind": "free_text",
            "prompt": "Explain hashing",
            "answer_key": {"type": "rubric", "points": ["hash function"]}
        }))
        .unwrap();

        assert_eq!(question.max_score, DEFAULT_MAX_SCORE);
        assert_eq!(question.difficulty, Difficulty::Medium);
        assert!(question.time_limit_seconds.is_none());
        assert!(question.validate().is_ok());
    }
}
