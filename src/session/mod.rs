//! Practice sessions: the state machine and its async host loop.
//!
//! A [`PracticeSession`] walks an ordered question set from `NotStarted`
//! to `Complete` (or `Abandoned`), one question at a time:
//!
//! ```text
//! NotStarted --start--> InProgress --submit / expiry--> AwaitingEvaluation
//!                           ^                                  |
//!                           +------- more questions -----------+
//!                                                              |
//!                                       last question ---> Complete
//! any non-terminal state --abandon--> Abandoned
//! ```
//!
//! Collaborators are injected through [`SessionDeps`]; the session never
//! reaches for a shared client. [`SessionDriver`] owns a session on a tokio
//! task, feeds it commands and one-second ticks, and reports progress.

mod driver;
mod engine;

pub use driver::{SessionCommand, SessionDriver, SessionHandle, SessionUpdate};
pub use engine::PracticeSession;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::evaluator::EvaluatorAdapter;
use crate::question::QuestionProvider;
use crate::runner::CodeRunner;
use crate::storage::PersistenceGateway;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    AwaitingEvaluation,
    Complete,
    Abandoned,
}

impl SessionStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Abandoned)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::NotStarted => "not started",
            SessionStatus::InProgress => "in progress",
            SessionStatus::AwaitingEvaluation => "awaiting evaluation",
            SessionStatus::Complete => "complete",
            SessionStatus::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// Collaborators of a session.
#[derive(Clone)]
pub struct SessionDeps {
    pub provider: Arc<dyn QuestionProvider>,
    pub evaluator: EvaluatorAdapter,
    pub gateway: Arc<dyn PersistenceGateway>,
    /// Remote code execution; `None` disables running tests.
    pub runner: Option<Arc<dyn CodeRunner>>,
}

impl SessionDeps {
    pub fn new(
        provider: Arc<dyn QuestionProvider>,
        evaluator: EvaluatorAdapter,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Self {
        Self {
            provider,
            evaluator,
            gateway,
            runner: None,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CodeRunner>) -> Self {
        self.runner = Some(runner);
        self
    }
}
