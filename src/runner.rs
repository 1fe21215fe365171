//! Remote code execution for code questions.
//!
//! [`JdoodleRunner`] talks to a JDoodle-compatible `/v1/execute` endpoint.
//! [`run_test_cases`] runs a submission against each test case in turn and
//! compares trimmed output, producing the results the code evaluator scores.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{RequestConfig, RunnerConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::question::TestCase;

/// Output of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOutput {
    pub output: String,
    pub error: Option<String>,
    pub memory: Option<String>,
    pub cpu_time: Option<String>,
}

/// Outcome of one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestCaseResult {
    /// A passing result whose output matched.
    pub fn passed(input: impl Into<String>, output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            input: input.into(),
            expected_output: output.clone(),
            actual_output: output,
            passed: true,
            error: None,
        }
    }

    /// A failing result.
    pub fn failed(
        input: impl Into<String>,
        expected_output: impl Into<String>,
        actual_output: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            actual_output: actual_output.into(),
            passed: false,
            error: None,
        }
    }

    /// Human-readable one-line summary.
    pub fn message(&self) -> String {
        match (&self.error, self.passed) {
            (Some(error), _) => format!("Error: {}", error),
            (None, true) => "Test case passed!".to_string(),
            (None, false) => format!(
                "Expected: {}, Got: {}",
                self.expected_output.trim(),
                self.actual_output.trim()
            ),
        }
    }
}

/// Executes source code remotely.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeRunner: Send + Sync {
    /// Run `code` written in `language` with `stdin` as input.
    async fn run(&self, code: &str, language: &str, stdin: &str) -> RunnerResult<RunOutput>;
}

/// Map a learner-facing language name to the execution service's id.
pub fn language_alias(language: &str) -> String {
    match language.to_lowercase().as_str() {
        "javascript" | "js" => "nodejs".to_string(),
        "python" | "py" => "python3".to_string(),
        "cpp" | "c++" => "cpp17".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    script: &'a str,
    language: String,
    version_index: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    stdin: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    memory: Option<serde_json::Value>,
    #[serde(default)]
    cpu_time: Option<serde_json::Value>,
}

/// Client for a JDoodle-compatible execution API
#[derive(Clone)]
pub struct JdoodleRunner {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl JdoodleRunner {
    /// Create a runner, or `None` when credentials are not configured.
    pub fn from_config(
        config: &RunnerConfig,
        request_config: &RequestConfig,
    ) -> RunnerResult<Option<Self>> {
        let Some((client_id, client_secret)) = config.credentials() else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(|e| RunnerError::Network {
                message: e.to_string(),
            })?;

        Ok(Some(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }))
    }
}

#[async_trait]
impl CodeRunner for JdoodleRunner {
    async fn run(&self, code: &str, language: &str, stdin: &str) -> RunnerResult<RunOutput> {
        let url = format!("{}/v1/execute", self.base_url);
        let start = Instant::now();

        let request = ExecuteRequest {
            script: code,
            language: language_alias(language),
            version_index: "0",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            stdin,
        };

        debug!(language = %request.language, "Executing code");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RunnerError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Code execution rejected");
            return Err(RunnerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ExecuteResponse = response.json().await.map_err(|e| RunnerError::Api {
            status: status.as_u16(),
            message: format!("Failed to parse execution response: {}", e),
        })?;

        info!(
            language = %request.language,
            latency_ms = start.elapsed().as_millis(),
            "Code execution finished"
        );

        Ok(RunOutput {
            output: body.output.unwrap_or_default(),
            error: body.error,
            memory: body.memory.map(|v| value_text(&v)),
            cpu_time: body.cpu_time.map(|v| value_text(&v)),
        })
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Run `code` against each test case sequentially.
///
/// Transport failures abort the run; execution errors reported by the
/// service fail only their own case.
pub async fn run_test_cases(
    runner: &dyn CodeRunner,
    code: &str,
    language: &str,
    cases: &[TestCase],
) -> RunnerResult<Vec<TestCaseResult>> {
    let mut results = Vec::with_capacity(cases.len());

    for case in cases {
        let output = runner.run(code, language, &case.input).await?;

        let result = match output.error {
            Some(error) => TestCaseResult {
                input: case.input.clone(),
                expected_output: case.expected_output.clone(),
                actual_output: output.output,
                passed: false,
                error: Some(error),
            },
            None if output.output.trim() == case.expected_output.trim() => TestCaseResult {
                input: case.input.clone(),
                expected_output: case.expected_output.clone(),
                actual_output: output.output,
                passed: true,
                error: None,
            },
            None => TestCaseResult::failed(&case.input, &case.expected_output, output.output),
        };
        results.push(result);
    }

    debug!(
        cases = results.len(),
        passed = results.iter().filter(|r| r.passed).count(),
        "Test cases finished"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cases() -> Vec<TestCase> {
        vec![
            TestCase {
                input: "2 7 11 15\n9".to_string(),
                expected_output: "0 1".to_string(),
            },
            TestCase {
                input: "3 2 4\n6".to_string(),
                expected_output: "1 2".to_string(),
            },
        ]
    }

    #[test]
    fn test_language_alias() {
        assert_eq!(language_alias("JavaScript"), "nodejs");
        assert_eq!(language_alias("python"), "python3");
        assert_eq!(language_alias("cpp"), "cpp17");
        assert_eq!(language_alias("java"), "java");
    }

    #[test]
    fn test_result_messages() {
        assert_eq!(TestCaseResult::passed("1", "1").message(), "Test case passed!");
        assert_eq!(
            TestCaseResult::failed("1", "2", "3\n").message(),
            "Expected: 2, Got: 3"
        );
    }

    #[tokio::test]
    async fn test_run_test_cases_compares_trimmed_output() {
        let mut runner = MockCodeRunner::new();
        runner
            .expect_run()
            .times(2)
            .returning(|_, _, stdin| {
                let output = if stdin.starts_with("2 7") { "0 1\n" } else { "0 2\n" };
                Ok(RunOutput {
                    output: output.to_string(),
                    ..Default::default()
                })
            });

        let results = run_test_cases(&runner, "code", "python", &cases()).await.unwrap();
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert_eq!(results[1].actual_output, "0 2\n");
    }

    #[tokio::test]
    async fn test_run_test_cases_marks_execution_errors_failed() {
        let mut runner = MockCodeRunner::new();
        runner.expect_run().returning(|_, _, _| {
            Ok(RunOutput {
                output: String::new(),
                error: Some("SyntaxError".to_string()),
                ..Default::default()
            })
        });

        let results = run_test_cases(&runner, "code", "python", &cases()).await.unwrap();
        assert!(results.iter().all(|r| !r.passed));
        assert_eq!(results[0].error.as_deref(), Some("SyntaxError"));
    }

    #[tokio::test]
    async fn test_run_test_cases_propagates_transport_failure() {
        let mut runner = MockCodeRunner::new();
        runner.expect_run().times(1).returning(|_, _, _| {
            Err(RunnerError::Network {
                message: "connection reset".to_string(),
            })
        });

        let result = run_test_cases(&runner, "code", "python", &cases()).await;
        assert!(matches!(result, Err(RunnerError::Network { .. })));
    }

    #[test]
    fn test_from_config_without_credentials_is_none() {
        let config = RunnerConfig {
            base_url: "https://api.jdoodle.com".to_string(),
            client_id: None,
            client_secret: None,
        };
        let runner = JdoodleRunner::from_config(&config, &RequestConfig::default()).unwrap();
        assert!(runner.is_none());
    }
}
