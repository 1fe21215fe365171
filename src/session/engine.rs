use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{SessionDeps, SessionStatus};
use crate::collector::{Response, ResponseCollector};
use crate::config::SessionConfig;
use crate::error::{PersistError, RunnerError, SessionError, SessionResult, ValidationError};
use crate::evaluator::Evaluation;
use crate::question::{validate_question_set, AnswerKey, FetchParams, PresentedQuestion, Question};
use crate::runner::{run_test_cases, TestCaseResult};
use crate::storage::{QuestionResult, RecordId, SessionOutcome, SessionSnapshot};
use crate::timer::TimerController;

/// One pass through an ordered question set.
///
/// `current_index` only ever grows and stays within `0..=questions.len()`.
/// Each question receives at most one response and one evaluation, both
/// stored at the question's position.
pub struct PracticeSession {
    session_id: String,
    user_id: String,
    config: SessionConfig,
    deps: SessionDeps,
    status: SessionStatus,
    questions: Vec<Question>,
    responses: Vec<Option<Response>>,
    evaluations: Vec<Option<Evaluation>>,
    current_index: usize,
    collector: ResponseCollector,
    question_timer: TimerController,
    session_timer: TimerController,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    record_id: Option<RecordId>,
    pending_snapshot: Option<SessionSnapshot>,
    last_persist_error: Option<PersistError>,
}

impl PracticeSession {
    /// Create a session for `user_id` with a fresh session id.
    pub fn new(user_id: impl Into<String>, deps: SessionDeps, config: SessionConfig) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            config,
            deps,
            status: SessionStatus::NotStarted,
            questions: Vec::new(),
            responses: Vec::new(),
            evaluations: Vec::new(),
            current_index: 0,
            collector: ResponseCollector::new(),
            question_timer: TimerController::new(),
            session_timer: TimerController::new(),
            started_at: None,
            finished_at: None,
            record_id: None,
            pending_snapshot: None,
            last_persist_error: None,
        }
    }

    /// Use a caller-chosen session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Fetch the question set and present the first question.
    ///
    /// A provider failure leaves the session `NotStarted`.
    pub async fn start(&mut self, params: &FetchParams) -> SessionResult<()> {
        if self.status != SessionStatus::NotStarted {
            return Err(self.invalid_state("start"));
        }

        let start = Instant::now();
        let questions = match self.deps.provider.fetch_questions(params).await {
            Ok(questions) => questions,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Failed to fetch questions");
                return Err(e.into());
            }
        };
        validate_question_set(&questions)?;

        self.responses = vec![None; questions.len()];
        self.evaluations = vec![None; questions.len()];
        self.questions = questions;
        self.current_index = 0;
        self.started_at = Some(Utc::now());
        self.status = SessionStatus::InProgress;

        if let Some(limit) = self.config.time_limit_secs {
            self.session_timer.start(limit);
        }
        self.begin_question();

        info!(
            session_id = %self.session_id,
            user_id = %self.user_id,
            questions = self.questions.len(),
            latency_ms = start.elapsed().as_millis(),
            "Session started"
        );
        Ok(())
    }

    /// Overwrite the answer buffer of the active question.
    pub fn set_answer(&mut self, value: impl Into<String>) -> SessionResult<()> {
        self.require_in_progress("edit an answer")?;
        self.collector.set_payload(value);
        Ok(())
    }

    /// Choose the programming language for code answers.
    pub fn select_language(&mut self, language: impl Into<String>) -> SessionResult<()> {
        self.require_in_progress("select a language")?;
        self.collector.select_language(language);
        Ok(())
    }

    /// Run the buffered code against the active question's test cases.
    ///
    /// The results are kept with the answer and scored on submit.
    pub async fn run_tests(&mut self) -> SessionResult<Vec<TestCaseResult>> {
        self.require_in_progress("run tests")?;

        let question = &self.questions[self.current_index];
        let AnswerKey::TestCases { cases } = &question.answer_key else {
            return Err(ValidationError::KindMismatch {
                expected: question.kind.to_string(),
                actual: "code".to_string(),
            }
            .into());
        };
        let runner = self.deps.runner.clone().ok_or(RunnerError::NotConfigured)?;

        let code = self.collector.payload().to_string();
        if code.trim().is_empty() {
            return Err(ValidationError::EmptyPayload.into());
        }
        let language = self
            .collector
            .language()
            .ok_or(ValidationError::MissingLanguage)?
            .to_string();
        let cases = cases.clone();

        let results = run_test_cases(runner.as_ref(), &code, &language, &cases).await?;
        info!(
            session_id = %self.session_id,
            question_id = %self.questions[self.current_index].id,
            passed = results.iter().filter(|r| r.passed).count(),
            total = results.len(),
            "Test cases run"
        );

        self.collector.record_test_results(results.clone());
        Ok(results)
    }

    /// Submit the active answer, evaluate it and advance.
    ///
    /// Returns `Ok(None)` when there is nothing to submit (the answer was
    /// already submitted). A rejected answer leaves the session unchanged.
    pub async fn submit_current(&mut self) -> SessionResult<Option<Evaluation>> {
        self.require_in_progress("submit")?;

        let Some(response) = self.collector.submit()? else {
            return Ok(None);
        };
        Ok(Some(self.evaluate_and_advance(response).await))
    }

    /// Handle expiry of the per-question timer.
    ///
    /// Auto-submits whatever is buffered, even if empty. An expiry for a
    /// question that is no longer active is ignored.
    pub async fn on_timer_expired(&mut self, question_id: &str) -> Option<Evaluation> {
        if self.status != SessionStatus::InProgress
            || self.collector.active_question_id() != Some(question_id)
        {
            debug!(session_id = %self.session_id, question_id, "Ignoring stale timer expiry");
            return None;
        }

        info!(session_id = %self.session_id, question_id, "Question time expired, auto-submitting");
        let response = self.collector.force_submit()?;
        Some(self.evaluate_and_advance(response).await)
    }

    /// Advance both timers by one second and act on expiry.
    ///
    /// Returns the evaluations produced by auto-submission, if any.
    pub async fn tick(&mut self) -> Vec<Evaluation> {
        if self.status != SessionStatus::InProgress {
            return Vec::new();
        }

        let session_expired = self.session_timer.tick().is_some();
        let question_expired = self.question_timer.tick().is_some();

        if session_expired {
            return self.expire_session().await;
        }
        if question_expired {
            if let Some(id) = self.current_question().map(|q| q.id.clone()) {
                return self.on_timer_expired(&id).await.into_iter().collect();
            }
        }
        Vec::new()
    }

    /// End the session early.
    ///
    /// Results so far are persisted as a partial record when configured.
    pub async fn abandon(&mut self) -> SessionResult<Option<RecordId>> {
        if self.status.is_terminal() {
            return Err(self.invalid_state("abandon"));
        }

        let was_started = self.started_at.is_some();
        self.status = SessionStatus::Abandoned;
        self.finished_at = Some(Utc::now());
        self.collector.deactivate();
        self.stop_timers();

        info!(
            session_id = %self.session_id,
            answered = self.answered_count(),
            total = self.questions.len(),
            "Session abandoned"
        );

        if was_started && self.config.persist_abandoned {
            if let Some(snapshot) = self.snapshot() {
                self.persist(snapshot).await;
            }
        }
        Ok(self.record_id.clone())
    }

    /// Save the snapshot whose last save failed, unchanged.
    pub async fn retry_persist(&mut self) -> SessionResult<RecordId> {
        if let Some(id) = &self.record_id {
            return Ok(id.clone());
        }
        let Some(snapshot) = self.pending_snapshot.clone() else {
            return Err(self.invalid_state("retry persistence"));
        };

        self.persist(snapshot).await;
        match (&self.record_id, &self.last_persist_error) {
            (Some(id), _) => Ok(id.clone()),
            (None, Some(e)) => Err(SessionError::Persist(e.clone())),
            (None, None) => Err(self.invalid_state("retry persistence")),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// The question accepting input, if any.
    pub fn current_question(&self) -> Option<&Question> {
        match self.status {
            SessionStatus::InProgress | SessionStatus::AwaitingEvaluation => {
                self.questions.get(self.current_index)
            }
            _ => None,
        }
    }

    /// Learner-facing view of the active question.
    pub fn presented_question(&self) -> Option<PresentedQuestion> {
        self.current_question().map(Question::presented)
    }

    /// Current answer buffer.
    pub fn answer(&self) -> &str {
        self.collector.payload()
    }

    pub fn language(&self) -> Option<&str> {
        self.collector.language()
    }

    /// Test results recorded for the current answer.
    pub fn test_results(&self) -> &[TestCaseResult] {
        self.collector.test_results()
    }

    /// Evaluation of a question, if it has been scored.
    pub fn evaluation(&self, question_id: &str) -> Option<&Evaluation> {
        self.evaluations
            .iter()
            .flatten()
            .find(|e| e.question_id == question_id)
    }

    /// Evaluations in question order.
    pub fn evaluations(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter().flatten()
    }

    /// Number of evaluated questions.
    pub fn answered_count(&self) -> usize {
        self.evaluations.iter().flatten().count()
    }

    /// Sum of evaluation scores so far.
    pub fn aggregate_score(&self) -> f64 {
        self.evaluations.iter().flatten().map(|e| e.score).sum()
    }

    /// Sum of the maximum scores of all questions.
    pub fn max_score(&self) -> u32 {
        self.questions.iter().map(|q| q.max_score).sum()
    }

    /// Seconds left for the active question when it has its own limit.
    pub fn question_remaining_secs(&self) -> Option<u64> {
        self.question_timer
            .is_running()
            .then(|| self.question_timer.remaining_secs())
    }

    /// Seconds left in the session when a session budget is set.
    pub fn session_remaining_secs(&self) -> Option<u64> {
        self.session_timer
            .is_running()
            .then(|| self.session_timer.remaining_secs())
    }

    /// Record id of the persisted snapshot.
    pub fn record_id(&self) -> Option<&RecordId> {
        self.record_id.as_ref()
    }

    /// Error of the last failed save, cleared by a successful one.
    pub fn last_persist_error(&self) -> Option<&PersistError> {
        self.last_persist_error.as_ref()
    }

    /// Read-only copy of the session's results.
    ///
    /// `None` before the session has started.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let started_at = self.started_at?;

        let questions = self
            .questions
            .iter()
            .zip(&self.responses)
            .zip(&self.evaluations)
            .map(|((question, response), evaluation)| QuestionResult {
                question: question.clone(),
                response: response.clone(),
                evaluation: evaluation.clone(),
            })
            .collect();

        let outcome = if self.status == SessionStatus::Complete {
            SessionOutcome::Complete
        } else {
            SessionOutcome::Partial
        };

        Some(SessionSnapshot {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            outcome,
            questions,
            aggregate_score: self.aggregate_score(),
            max_score: self.max_score(),
            started_at,
            finished_at: self.finished_at.unwrap_or_else(Utc::now),
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn invalid_state(&self, action: &str) -> SessionError {
        SessionError::InvalidState {
            action: action.to_string(),
            status: self.status.to_string(),
        }
    }

    fn require_in_progress(&self, action: &str) -> SessionResult<()> {
        if self.status == SessionStatus::InProgress {
            Ok(())
        } else {
            Err(self.invalid_state(action))
        }
    }

    fn begin_question(&mut self) {
        let Some(question) = self.questions.get(self.current_index) else {
            return;
        };

        self.collector.activate(question);
        match question.time_limit_seconds {
            Some(limit) => self.question_timer.start(limit),
            None => self.question_timer.reset(0),
        }

        debug!(
            session_id = %self.session_id,
            question_id = %question.id,
            index = self.current_index,
            "Question presented"
        );
    }

    fn stop_timers(&mut self) {
        self.question_timer.reset(0);
        self.session_timer.reset(0);
    }

    async fn evaluate_and_advance(&mut self, response: Response) -> Evaluation {
        let index = self.current_index;
        self.status = SessionStatus::AwaitingEvaluation;
        self.question_timer.reset(0);
        self.session_timer.pause();

        let evaluation = self
            .deps
            .evaluator
            .evaluate(&self.questions[index], &response)
            .await;

        info!(
            session_id = %self.session_id,
            question_id = %evaluation.question_id,
            score = evaluation.score,
            max_score = evaluation.max_score,
            degraded = evaluation.degraded,
            auto_submitted = response.auto_submitted,
            "Question evaluated"
        );

        self.responses[index] = Some(response);
        self.evaluations[index] = Some(evaluation.clone());
        self.current_index += 1;

        if self.current_index == self.questions.len() {
            self.complete().await;
        } else {
            self.status = SessionStatus::InProgress;
            self.session_timer.resume();
            self.begin_question();
        }
        evaluation
    }

    async fn expire_session(&mut self) -> Vec<Evaluation> {
        info!(
            session_id = %self.session_id,
            remaining = self.questions.len() - self.current_index,
            "Session time expired, auto-submitting remaining questions"
        );

        let mut evaluations = Vec::new();
        while self.status == SessionStatus::InProgress {
            let Some(response) = self.collector.force_submit() else {
                break;
            };
            evaluations.push(self.evaluate_and_advance(response).await);
            // Later questions get no time of their own.
            self.question_timer.reset(0);
            self.session_timer.reset(0);
        }
        evaluations
    }

    async fn complete(&mut self) {
        self.status = SessionStatus::Complete;
        self.finished_at = Some(Utc::now());
        self.collector.deactivate();
        self.stop_timers();

        info!(
            session_id = %self.session_id,
            aggregate_score = self.aggregate_score(),
            max_score = self.max_score(),
            "Session complete"
        );

        if let Some(snapshot) = self.snapshot() {
            self.persist(snapshot).await;
        }
    }

    async fn persist(&mut self, snapshot: SessionSnapshot) {
        match self.deps.gateway.save(&snapshot).await {
            Ok(id) => {
                info!(session_id = %self.session_id, record_id = %id, "Session persisted");
                self.record_id = Some(id);
                self.last_persist_error = None;
                self.pending_snapshot = None;
            }
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "Failed to persist session, keeping results for retry"
                );
                self.last_persist_error = Some(e);
                self.pending_snapshot = Some(snapshot);
            }
        }
    }
}
