//! Integration tests for the remote code runner
//!
//! Tests the JDoodle-compatible client and test-case execution using
//! wiremock for the execution API.

use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use interview_practice_engine::config::{RequestConfig, RunnerConfig};
use interview_practice_engine::error::RunnerError;
use interview_practice_engine::question::TestCase;
use interview_practice_engine::runner::{run_test_cases, CodeRunner, JdoodleRunner};

/// Create a runner pointing to mock server
fn create_test_runner(base_url: &str) -> JdoodleRunner {
    let config = RunnerConfig {
        base_url: base_url.to_string(),
        client_id: Some("client-id".to_string()),
        client_secret: Some("client-secret".to_string()),
    };
    JdoodleRunner::from_config(&config, &RequestConfig::default())
        .expect("Failed to create runner")
        .expect("credentials configured")
}

#[cfg(test)]
mod runner_tests {
    use super::*;

    #[tokio::test]
    async fn test_run_sends_credentials_and_language_alias() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .and(body_partial_json(json!({
                "language": "python3",
                "clientId": "client-id",
                "clientSecret": "client-secret",
                "stdin": "3"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": "9\n",
                "memory": "7680",
                "cpuTime": "0.01"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let runner = create_test_runner(&mock_server.uri());
        let output = assert_ok!(runner.run("print(int(input())**2)", "python", "3").await);

        assert_eq!(output.output, "9\n");
        assert_eq!(output.memory.as_deref(), Some("7680"));
        assert_eq!(output.cpu_time.as_deref(), Some("0.01"));
        assert!(output.error.is_none());
    }

    #[tokio::test]
    async fn test_rejected_request_is_api_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&mock_server)
            .await;

        let runner = create_test_runner(&mock_server.uri());
        let err = assert_err!(runner.run("print(1)", "python", "").await);
        assert!(matches!(err, RunnerError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_run_test_cases_against_service() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .and(body_partial_json(json!({"stdin": "1 2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "3\n"})))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .and(body_partial_json(json!({"stdin": "5 5"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "11\n"})))
            .mount(&mock_server)
            .await;

        let runner = create_test_runner(&mock_server.uri());
        let cases = vec![
            TestCase {
                input: "1 2".to_string(),
                expected_output: "3".to_string(),
            },
            TestCase {
                input: "5 5".to_string(),
                expected_output: "10".to_string(),
            },
        ];

        let results = run_test_cases(&runner, "code", "javascript", &cases).await.unwrap();
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert_eq!(results[1].message(), "Expected: 10, Got: 11");
    }
}
