//! Response Collector: buffers the learner's answer to the active question.
//!
//! The buffer is last-write-wins with no history. `submit` freezes it into
//! an immutable [`Response`] and clears it, so a repeated submit without
//! new input finds nothing to send.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::question::{Question, QuestionKind};
use crate::runner::TestCaseResult;

/// Submitted answer data, shaped by the question kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Choice { option: String },
    Text { text: String },
    Code { code: String, language: Option<String> },
}

impl Payload {
    /// The raw answer text regardless of kind.
    pub fn text(&self) -> &str {
        match self {
            Payload::Choice { option } => option,
            Payload::Text { text } => text,
            Payload::Code { code, .. } => code,
        }
    }

    /// Whether the answer has no content.
    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }

    /// Selected language of a code answer.
    pub fn language(&self) -> Option<&str> {
        match self {
            Payload::Code { language, .. } => language.as_deref(),
            _ => None,
        }
    }
}

/// A frozen answer. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Back-reference to the question answered.
    pub question_id: String,
    pub payload: Payload,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    /// True when the timer submitted on the learner's behalf.
    pub auto_submitted: bool,
    /// Test-case results recorded for code answers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_results: Vec<TestCaseResult>,
}

impl Response {
    /// Seconds between presentation and submission.
    pub fn time_on_question_secs(&self) -> i64 {
        (self.submitted_at - self.started_at).num_seconds().max(0)
    }
}

/// The question currently accepting input.
#[derive(Debug, Clone)]
struct ActiveQuestion {
    id: String,
    kind: QuestionKind,
    options: Vec<String>,
    started_at: DateTime<Utc>,
}

/// Buffer for the active question's answer.
#[derive(Debug, Clone, Default)]
pub struct ResponseCollector {
    active: Option<ActiveQuestion>,
    buffer: String,
    language: Option<String>,
    test_results: Vec<TestCaseResult>,
}

impl ResponseCollector {
    /// Create an idle collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start collecting for `question`, discarding any previous buffer.
    pub fn activate(&mut self, question: &Question) {
        self.active = Some(ActiveQuestion {
            id: question.id.clone(),
            kind: question.kind,
            options: question.options.clone(),
            started_at: Utc::now(),
        });
        self.clear();
    }

    /// Stop collecting without producing a response.
    pub fn deactivate(&mut self) {
        self.active = None;
        self.clear();
    }

    /// Id of the question being answered, if any.
    pub fn active_question_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.id.as_str())
    }

    /// Overwrite the buffer.
    pub fn set_payload(&mut self, value: impl Into<String>) {
        self.buffer = value.into();
        // Edited code invalidates earlier test runs.
        if matches!(self.active.as_ref().map(|a| a.kind), Some(QuestionKind::Code)) {
            self.test_results.clear();
        }
    }

    /// Current buffer contents.
    pub fn payload(&self) -> &str {
        &self.buffer
    }

    /// Choose the language of a code answer.
    pub fn select_language(&mut self, language: impl Into<String>) {
        let language = language.into();
        self.language = (!language.trim().is_empty()).then(|| language.trim().to_string());
    }

    /// Selected language, if any.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Attach test-case results for the current code buffer.
    pub fn record_test_results(&mut self, results: Vec<TestCaseResult>) {
        self.test_results = results;
    }

    /// Test-case results recorded for the current buffer.
    pub fn test_results(&self) -> &[TestCaseResult] {
        &self.test_results
    }

    /// Validate and freeze the buffer.
    ///
    /// Returns `Ok(None)` when no question is active. A rejected submit
    /// leaves the buffer untouched so the learner can fix it.
    pub fn submit(&mut self) -> Result<Option<Response>, ValidationError> {
        let Some(active) = &self.active else {
            return Ok(None);
        };

        if self.buffer.trim().is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        match active.kind {
            QuestionKind::Code if self.language.is_none() => {
                return Err(ValidationError::MissingLanguage);
            }
            QuestionKind::MultipleChoice
                if !active.options.iter().any(|o| o.trim() == self.buffer.trim()) =>
            {
                return Err(ValidationError::UnknownOption {
                    option: self.buffer.trim().to_string(),
                });
            }
            _ => {}
        }

        Ok(self.freeze(false))
    }

    /// Freeze whatever is buffered, even if empty. Used on timer expiry.
    pub fn force_submit(&mut self) -> Option<Response> {
        self.freeze(true)
    }

    fn freeze(&mut self, auto_submitted: bool) -> Option<Response> {
        let active = self.active.take()?;
        let text = std::mem::take(&mut self.buffer);

        let payload = match active.kind {
            QuestionKind::MultipleChoice => Payload::Choice {
                option: text.trim().to_string(),
            },
            QuestionKind::FreeText => Payload::Text { text },
            QuestionKind::Code => Payload::Code {
                code: text,
                language: self.language.clone(),
            },
        };

        let response = Response {
            question_id: active.id,
            payload,
            started_at: active.started_at,
            submitted_at: Utc::now(),
            auto_submitted,
            test_results: std::mem::take(&mut self.test_results),
        };
        self.clear();
        Some(response)
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.test_results.clear();
    }
}
