use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::{validate_question_set, FetchParams, Question, QuestionProvider, TestCase};
use crate::error::{LlmError, ProviderError, ProviderResult};
use crate::llm::{extract_json, ChatRequest, LlmClient, Message};
use crate::prompts::{generation_request, QUESTION_GENERATION_PROMPT};

const DEFAULT_CODE_LIMIT_SECS: u64 = 1200;
const DEFAULT_DSA_LIMIT_SECS: u64 = 900;
const DEFAULT_HR_LIMIT_SECS: u64 = 300;

/// Question provider that asks an LLM for a company-specific set.
#[derive(Clone)]
pub struct GeneratedQuestionProvider {
    llm: LlmClient,
}

/// One element of the generated JSON array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedQuestion {
    #[serde(rename = "type")]
    kind: String,
    question: String,
    #[serde(default)]
    time_limit: Option<u64>,
    #[serde(default)]
    expected_answer: Option<String>,
    #[serde(default)]
    evaluation_criteria: Vec<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    correct_answer: Option<String>,
    #[serde(default)]
    test_cases: Vec<GeneratedTestCase>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedTestCase {
    input: String,
    expected_output: String,
}

/// Some models wrap the array in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeneratedSet {
    Bare(Vec<GeneratedQuestion>),
    Wrapped { questions: Vec<GeneratedQuestion> },
}

impl GeneratedQuestionProvider {
    /// Create a provider backed by the given client
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    fn convert(index: usize, raw: GeneratedQuestion, params: &FetchParams) -> Question {
        let id = format!("gen-{}", index + 1);
        let kind = raw.kind.to_lowercase();

        let mut question = match kind.as_str() {
            "mcq" | "multiple_choice" if !raw.options.is_empty() => Question::multiple_choice(
                id,
                raw.question,
                raw.options,
                raw.correct_answer.unwrap_or_default(),
            ),
            "code" => Question::code(
                id,
                raw.question,
                raw.test_cases
                    .into_iter()
                    .map(|c| TestCase {
                        input: c.input,
                        expected_output: c.expected_output,
                    })
                    .collect(),
            ),
            _ => {
                let mut points = raw.evaluation_criteria;
                if points.is_empty() {
                    points.extend(raw.expected_answer.filter(|a| !a.trim().is_empty()));
                }
                Question::free_text(id, raw.question, points)
            }
        };

        let default_limit = match kind.as_str() {
            "code" => DEFAULT_CODE_LIMIT_SECS,
            "dsa" => DEFAULT_DSA_LIMIT_SECS,
            _ => DEFAULT_HR_LIMIT_SECS,
        };
        question.time_limit_seconds = Some(raw.time_limit.filter(|&t| t > 0).unwrap_or(default_limit));
        question.topic = params.topic.clone();
        question.company = params.company.clone();
        if let Some(difficulty) = params.difficulty {
            question.difficulty = difficulty;
        }
        question
    }

    /// Parse a completion into validated questions.
    fn parse_completion(completion: &str, params: &FetchParams) -> ProviderResult<Vec<Question>> {
        let set: GeneratedSet =
            serde_json::from_str(extract_json(completion)).map_err(|e| ProviderError::Malformed {
                message: format!("Generated questions are not valid JSON: {}", e),
            })?;

        let raw = match set {
            GeneratedSet::Bare(q) | GeneratedSet::Wrapped { questions: q } => q,
        };

        let questions: Vec<Question> = raw
            .into_iter()
            .take(params.count.max(1))
            .enumerate()
            .map(|(i, q)| Self::convert(i, q, params))
            .collect();

        validate_question_set(&questions)?;
        Ok(questions)
    }
}

fn provider_error(err: LlmError) -> ProviderError {
    match err {
        LlmError::Unavailable {
            last_status: Some(429),
            message,
            ..
        } => ProviderError::Quota { message },
        LlmError::InvalidResponse { message } => ProviderError::Malformed { message },
        other => ProviderError::Network {
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl QuestionProvider for GeneratedQuestionProvider {
    async fn fetch_questions(&self, params: &FetchParams) -> ProviderResult<Vec<Question>> {
        let company = params.company.as_deref().unwrap_or("a leading tech company");
        let position = params
            .position
            .as_deref()
            .or(params.topic.as_deref())
            .unwrap_or("Software Engineer");

        let request = ChatRequest::new(
            self.llm.model(),
            vec![
                Message::system(QUESTION_GENERATION_PROMPT),
                Message::user(generation_request(company, position, params.count)),
            ],
        )
        .with_temperature(0.7)
        .with_max_tokens(2000);

        let response = self.llm.chat(request).await.map_err(provider_error)?;
        let completion = response.content().ok_or_else(|| ProviderError::Malformed {
            message: "Completion has no choices".to_string(),
        })?;

        match Self::parse_completion(completion, params) {
            Ok(questions) => {
                info!(
                    company = %company,
                    position = %position,
                    questions = questions.len(),
                    "Generated question set"
                );
                Ok(questions)
            }
            Err(e) => {
                warn!(error = %e, "Rejected generated question set");
                Err(e)
            }
        }
    }
}
