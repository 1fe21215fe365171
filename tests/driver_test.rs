//! Integration tests for the async session driver
//!
//! Runs sessions on the driver task with a short tick period and checks the
//! reported updates, timer auto-submission and shutdown cancellation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use interview_practice_engine::config::{LlmConfig, RequestConfig, SessionConfig};
use interview_practice_engine::evaluator::{EvaluatorAdapter, RemoteEvaluator};
use interview_practice_engine::llm::LlmClient;
use interview_practice_engine::question::{FetchParams, Question, StaticQuestionBank};
use interview_practice_engine::session::{
    PracticeSession, SessionCommand, SessionDeps, SessionDriver, SessionHandle, SessionStatus,
    SessionUpdate,
};
use interview_practice_engine::storage::SqliteStorage;

const TICK: Duration = Duration::from_millis(10);

async fn create_session(questions: Vec<Question>, evaluator: EvaluatorAdapter) -> PracticeSession {
    let storage = SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage");
    let bank = StaticQuestionBank::new(questions).expect("valid bank");
    let deps = SessionDeps::new(Arc::new(bank), evaluator, Arc::new(storage));
    PracticeSession::new("ada", deps, SessionConfig::default())
}

fn quiz() -> Vec<Question> {
    vec![
        Question::multiple_choice(
            "q1",
            "Which tool builds container images?",
            vec!["Docker".to_string(), "Make".to_string()],
            "Docker",
        )
        .with_topic("DevOps"),
        Question::multiple_choice(
            "q2",
            "Which tool provisions infrastructure?",
            vec!["Terraform".to_string(), "Jenkins".to_string()],
            "Terraform",
        )
        .with_topic("DevOps"),
    ]
}

async fn next_update(handle: &mut SessionHandle) -> SessionUpdate {
    tokio::time::timeout(Duration::from_secs(5), handle.next_update())
        .await
        .expect("update within timeout")
        .expect("driver still running")
}

/// Collect updates until `stop` matches one.
async fn updates_until(
    handle: &mut SessionHandle,
    stop: impl Fn(&SessionUpdate) -> bool,
) -> Vec<SessionUpdate> {
    let mut seen = Vec::new();
    loop {
        let update = next_update(handle).await;
        let done = stop(&update);
        seen.push(update);
        if done {
            return seen;
        }
    }
}

#[cfg(test)]
mod driver_tests {
    use super::*;

    #[tokio::test]
    async fn test_driver_completes_session_from_commands() {
        let session = create_session(quiz(), EvaluatorAdapter::default()).await;
        let (mut handle, task) = SessionDriver::spawn(session, FetchParams::new(2), TICK);

        let opening = updates_until(&mut handle, |u| {
            matches!(u, SessionUpdate::QuestionPresented { .. })
        })
        .await;
        assert!(matches!(opening[0], SessionUpdate::Started { total: 2, .. }));

        for answer in ["Docker", "Terraform"] {
            assert!(handle.send(SessionCommand::SetAnswer(answer.to_string())).await);
            assert!(handle.send(SessionCommand::Submit).await);
        }

        let updates =
            updates_until(&mut handle, |u| matches!(u, SessionUpdate::Persisted { .. })).await;
        assert!(updates.iter().any(|u| matches!(
            u,
            SessionUpdate::Completed {
                aggregate_score,
                max_score: 20
            } if *aggregate_score == 20.0
        )));

        let session = task.await.unwrap();
        assert_eq!(session.status(), SessionStatus::Complete);
        assert!(session.record_id().is_some());
    }

    #[tokio::test]
    async fn test_driver_rejects_invalid_submission() {
        let session = create_session(quiz(), EvaluatorAdapter::default()).await;
        let (mut handle, task) = SessionDriver::spawn(session, FetchParams::new(2), TICK);
        updates_until(&mut handle, |u| matches!(u, SessionUpdate::QuestionPresented { .. })).await;

        handle
            .send(SessionCommand::SetAnswer("Podman".to_string()))
            .await;
        handle.send(SessionCommand::Submit).await;

        let update = next_update(&mut handle).await;
        assert!(matches!(update, SessionUpdate::Rejected { .. }));

        handle.shutdown();
        let session = task.await.unwrap();
        assert_eq!(session.current_index(), 0);
    }

    #[tokio::test]
    async fn test_driver_auto_submits_on_question_expiry() {
        let question = Question::free_text("q1", "Explain arrays", vec!["memory".to_string()])
            .with_time_limit(1);
        let session = create_session(vec![question], EvaluatorAdapter::default()).await;
        let (mut handle, task) = SessionDriver::spawn(session, FetchParams::new(1), TICK);

        let updates =
            updates_until(&mut handle, |u| matches!(u, SessionUpdate::Completed { .. })).await;
        assert!(updates.iter().any(|u| matches!(
            u,
            SessionUpdate::Evaluated {
                auto_submitted: true,
                ..
            }
        )));

        let session = task.await.unwrap();
        assert_eq!(session.status(), SessionStatus::Complete);
        assert_eq!(session.aggregate_score(), 0.0);
    }

    #[tokio::test]
    async fn test_expiry_scores_answer_typed_so_far() {
        let question = Question::free_text("q1", "Explain arrays", vec!["memory".to_string()])
            .with_time_limit(30);
        let session = create_session(vec![question], EvaluatorAdapter::default()).await;
        let (mut handle, task) = SessionDriver::spawn(session, FetchParams::new(1), TICK);
        updates_until(&mut handle, |u| matches!(u, SessionUpdate::QuestionPresented { .. })).await;

        handle
            .send(SessionCommand::SetAnswer("Elements share one block of memory".to_string()))
            .await;

        let updates =
            updates_until(&mut handle, |u| matches!(u, SessionUpdate::Completed { .. })).await;
        let evaluation = updates
            .iter()
            .find_map(|u| match u {
                SessionUpdate::Evaluated {
                    evaluation,
                    auto_submitted: true,
                } => Some(evaluation.clone()),
                _ => None,
            })
            .expect("auto-submitted evaluation");
        assert_eq!(evaluation.score, 2.0);

        let session = task.await.unwrap();
        assert_eq!(session.status(), SessionStatus::Complete);
    }

    #[tokio::test]
    async fn test_driver_reports_start_failure() {
        let session = create_session(quiz(), EvaluatorAdapter::default()).await;
        let params = FetchParams::new(2).with_topic("Kubernetes");
        let (mut handle, task) = SessionDriver::spawn(session, params, TICK);

        let update = next_update(&mut handle).await;
        assert!(matches!(update, SessionUpdate::StartFailed { .. }));
        assert!(handle.next_update().await.is_none());

        let session = task.await.unwrap();
        assert_eq!(session.status(), SessionStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_driver_abandon_persists_partial_record() {
        let session = create_session(quiz(), EvaluatorAdapter::default()).await;
        let (mut handle, task) = SessionDriver::spawn(session, FetchParams::new(2), TICK);
        updates_until(&mut handle, |u| matches!(u, SessionUpdate::QuestionPresented { .. })).await;

        handle
            .send(SessionCommand::SetAnswer("Docker".to_string()))
            .await;
        handle.send(SessionCommand::Submit).await;
        handle.send(SessionCommand::Abandon).await;

        let updates =
            updates_until(&mut handle, |u| matches!(u, SessionUpdate::Persisted { .. })).await;
        assert!(updates.iter().any(|u| matches!(u, SessionUpdate::Abandoned)));

        let session = task.await.unwrap();
        assert_eq!(session.status(), SessionStatus::Abandoned);
        assert_eq!(session.answered_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_evaluation() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(30))
                    .set_body_json(json!({"choices": []})),
            )
            .mount(&mock_server)
            .await;

        let llm = LlmClient::new(
            &LlmConfig {
                api_key: Some("test-api-key".to_string()),
                base_url: mock_server.uri(),
                model: "test-model".to_string(),
            },
            RequestConfig {
                timeout_ms: 60_000,
                max_retries: 0,
                retry_delay_ms: 10,
            },
        )
        .unwrap();
        let evaluator = EvaluatorAdapter::Remote(RemoteEvaluator::new(llm, 60_000));

        let question = Question::free_text("q1", "Explain arrays", vec!["memory".to_string()]);
        let session = create_session(vec![question], evaluator).await;
        let (mut handle, task) = SessionDriver::spawn(session, FetchParams::new(1), TICK);
        updates_until(&mut handle, |u| matches!(u, SessionUpdate::QuestionPresented { .. })).await;

        handle
            .send(SessionCommand::SetAnswer("Arrays use contiguous memory".to_string()))
            .await;
        handle.send(SessionCommand::Submit).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown();

        let session = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("driver stops promptly")
            .unwrap();
        assert_eq!(session.status(), SessionStatus::AwaitingEvaluation);
        assert_eq!(session.answered_count(), 0);
        assert!(session.record_id().is_none());
    }
}
