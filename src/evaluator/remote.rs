use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Evaluation, Evaluator, Feedback};
use crate::collector::{Payload, Response};
use crate::error::{EvaluatorError, EvaluatorResult, LlmError};
use crate::llm::{extract_json, ChatRequest, LlmClient, Message};
use crate::prompts::{evaluation_request, EVALUATION_PROMPT};
use crate::question::{AnswerKey, Question};

/// LLM-backed evaluator.
///
/// The whole call, retries included, is bounded by `timeout`.
#[derive(Clone)]
pub struct RemoteEvaluator {
    llm: LlmClient,
    timeout: Duration,
}

/// Verdict JSON returned by the model.
#[derive(Debug, Deserialize)]
struct RemoteVerdict {
    score: f64,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvements: Vec<String>,
    #[serde(default, alias = "detailedAnalysis")]
    feedback: String,
}

impl RemoteEvaluator {
    /// Create a remote evaluator with a total time budget in milliseconds.
    pub fn new(llm: LlmClient, timeout_ms: u64) -> Self {
        Self {
            llm,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn expected_points(question: &Question) -> String {
        match &question.answer_key {
            AnswerKey::Rubric { points } => points
                .iter()
                .map(|p| format!("- {}", p))
                .collect::<Vec<_>>()
                .join("\n"),
            AnswerKey::Choice { correct } => format!(
                "Options: {}\nCorrect option: {}",
                question.options.join(", "),
                correct
            ),
            AnswerKey::TestCases { cases } => cases
                .iter()
                .map(|c| format!("- input: {} => output: {}", c.input, c.expected_output))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    fn answer_text(response: &Response) -> String {
        let mut answer = response.payload.text().to_string();
        if !response.test_results.is_empty() {
            answer.push_str("\n\nTest results:\n");
            for (i, result) in response.test_results.iter().enumerate() {
                answer.push_str(&format!("Test Case {}: {}\n", i + 1, result.message()));
            }
        }
        answer
    }

    fn build_request(&self, question: &Question, response: &Response) -> ChatRequest {
        let language = match &response.payload {
            Payload::Code { language, .. } => language.as_deref(),
            _ => None,
        };

        ChatRequest::new(
            self.llm.model(),
            vec![
                Message::system(EVALUATION_PROMPT),
                Message::user(evaluation_request(
                    question.kind.as_str(),
                    &question.prompt,
                    &Self::expected_points(question),
                    question.max_score,
                    language,
                    &Self::answer_text(response),
                )),
            ],
        )
        .with_temperature(0.3)
        .with_max_tokens(1000)
        .with_json_output()
    }

    fn parse_verdict(question: &Question, completion: &str) -> EvaluatorResult<Evaluation> {
        let verdict: RemoteVerdict = serde_json::from_str(extract_json(completion)).map_err(|e| {
            EvaluatorError::MalformedResponse {
                message: format!("Verdict is not valid JSON: {}", e),
            }
        })?;

        if !verdict.score.is_finite() {
            return Err(EvaluatorError::MalformedResponse {
                message: "Verdict score is not a number".to_string(),
            });
        }

        Ok(Evaluation::new(
            &question.id,
            verdict.score,
            question.max_score,
            Feedback {
                strengths: verdict.strengths,
                improvements: verdict.improvements,
                narrative: verdict.feedback,
            },
        ))
    }
}

fn evaluator_error(err: LlmError) -> EvaluatorError {
    match err {
        LlmError::Timeout { timeout_ms } => EvaluatorError::Timeout { timeout_ms },
        LlmError::InvalidResponse { message } => EvaluatorError::MalformedResponse { message },
        other => EvaluatorError::Network {
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl Evaluator for RemoteEvaluator {
    async fn evaluate(&self, question: &Question, response: &Response) -> EvaluatorResult<Evaluation> {
        let start = Instant::now();
        let request = self.build_request(question, response);

        debug!(question_id = %question.id, model = %request.model, "Requesting remote evaluation");

        let chat = tokio::time::timeout(self.timeout, self.llm.chat(request))
            .await
            .map_err(|_| EvaluatorError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(evaluator_error)?;

        let completion = chat.content().ok_or_else(|| EvaluatorError::MalformedResponse {
            message: "Completion has no choices".to_string(),
        })?;

        let evaluation = Self::parse_verdict(question, completion)?;

        info!(
            question_id = %question.id,
            score = evaluation.score,
            max_score = evaluation.max_score,
            latency_ms = start.elapsed().as_millis(),
            "Remote evaluation completed"
        );
        Ok(evaluation)
    }
}
