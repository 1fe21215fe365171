use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{builtin_questions, validate_question_set, FetchParams, Question, QuestionProvider};
use crate::error::{ProviderError, ProviderResult};

/// In-memory question table keyed by question id.
///
/// Presentation order is table order; filtering never reorders.
#[derive(Debug, Clone, Default)]
pub struct StaticQuestionBank {
    questions: Vec<Question>,
}

impl StaticQuestionBank {
    /// Build a bank from a list of questions.
    ///
    /// # Errors
    /// Returns `Malformed` if any question is inconsistent or ids repeat.
    pub fn new(questions: Vec<Question>) -> ProviderResult<Self> {
        if !questions.is_empty() {
            validate_question_set(&questions)?;
        }

        Ok(Self { questions })
    }

    /// Bank holding the builtin question set.
    pub fn builtin() -> ProviderResult<Self> {
        Self::new(builtin_questions())
    }

    /// Load a bank from a JSON array of questions.
    pub fn from_json_file(path: &Path) -> ProviderResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ProviderError::Network {
            message: format!("Failed to read question bank {}: {}", path.display(), e),
        })?;
        let bank = Self::from_json_str(&raw)?;

        info!(path = %path.display(), questions = bank.len(), "Question bank loaded");
        Ok(bank)
    }

    /// Parse a bank from a JSON array of questions.
    pub fn from_json_str(raw: &str) -> ProviderResult<Self> {
        let questions: Vec<Question> =
            serde_json::from_str(raw).map_err(|e| ProviderError::Malformed {
                message: format!("Failed to parse question bank: {}", e),
            })?;
        Self::new(questions)
    }

    /// Number of questions in the bank.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the bank holds no questions.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// All questions in table order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Distinct topics in table order.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = Vec::new();
        for topic in self.questions.iter().filter_map(|q| q.topic.as_deref()) {
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        topics
    }

    fn matches(question: &Question, params: &FetchParams) -> bool {
        let field_matches = |wanted: &Option<String>, actual: &Option<String>| match wanted {
            None => true,
            Some(w) => actual
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(w.trim())),
        };

        field_matches(&params.topic, &question.topic)
            && field_matches(&params.company, &question.company)
            && params.difficulty.map_or(true, |d| d == question.difficulty)
    }
}

#[async_trait]
impl QuestionProvider for StaticQuestionBank {
    async fn fetch_questions(&self, params: &FetchParams) -> ProviderResult<Vec<Question>> {
        let selected: Vec<Question> = self
            .questions
            .iter()
            .filter(|q| Self::matches(q, params))
            .take(params.count)
            .cloned()
            .collect();

        debug!(
            topic = ?params.topic,
            company = ?params.company,
            requested = params.count,
            selected = selected.len(),
            "Selected questions from bank"
        );

        if selected.is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::Difficulty;

    fn bank() -> StaticQuestionBank {
        StaticQuestionBank::new(vec![
            Question::free_text("a1", "Arrays one", vec![]).with_topic("Arrays"),
            Question::free_text("a2", "Arrays two", vec![])
                .with_topic("Arrays")
                .with_difficulty(Difficulty::Hard),
            Question::free_text("g1", "Google culture", vec![])
                .with_topic("HR")
                .with_company("Google"),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_filters_by_topic_case_insensitively() {
        let questions = bank()
            .fetch_questions(&FetchParams::new(10).with_topic("arrays"))
            .await
            .unwrap();
        let ids: Vec<_> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn test_fetch_respects_count_and_order() {
        let questions = bank().fetch_questions(&FetchParams::new(2)).await.unwrap();
        let ids: Vec<_> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn test_fetch_filters_by_company_and_difficulty() {
        let bank = bank();
        let google = bank
            .fetch_questions(&FetchParams::new(5).with_company("google"))
            .await
            .unwrap();
        assert_eq!(google.len(), 1);
        assert_eq!(google[0].id, "g1");

        let hard = bank
            .fetch_questions(&FetchParams::new(5).with_difficulty(Difficulty::Hard))
            .await
            .unwrap();
        assert_eq!(hard[0].id, "a2");
    }

    #[tokio::test]
    async fn test_fetch_without_matches_is_empty_error() {
        let result = bank()
            .fetch_questions(&FetchParams::new(5).with_topic("Graphs"))
            .await;
        assert!(matches!(result, Err(ProviderError::Empty)));
    }

    #[test]
    fn test_topics_are_distinct_in_order() {
        assert_eq!(bank().topics(), vec!["Arrays", "HR"]);
    }

    #[test]
    fn test_from_json_str_rejects_garbage() {
        let result = StaticQuestionBank::from_json_str("{not json");
        assert!(matches!(result, Err(ProviderError::Malformed { .. })));
    }

    #[test]
    fn test_builtin_bank_is_valid() {
        let bank = StaticQuestionBank::builtin().unwrap();
        assert!(!bank.is_empty());
    }
}
