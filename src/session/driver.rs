//! Async host loop for a [`PracticeSession`].
//!
//! The driver owns the session on one task. Learner commands arrive over an
//! mpsc channel, a single `tokio::time::interval` supplies the one-second
//! timer ticks, and progress goes back as [`SessionUpdate`]s. Every
//! transition happens on the driver task, one at a time.
//!
//! Shutdown (or dropping the handle) ends the loop. An evaluation or save
//! still in flight is dropped with its future and the session is not
//! touched again.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::{PracticeSession, SessionStatus};
use crate::evaluator::Evaluation;
use crate::question::{FetchParams, PresentedQuestion};
use crate::runner::TestCaseResult;
use crate::storage::RecordId;

const COMMAND_BUFFER: usize = 32;
const UPDATE_BUFFER: usize = 64;

/// A learner action.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SetAnswer(String),
    SelectLanguage(String),
    RunTests,
    Submit,
    Abandon,
    RetryPersist,
}

/// Progress reported by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Started {
        session_id: String,
        total: usize,
    },
    StartFailed {
        message: String,
    },
    QuestionPresented {
        index: usize,
        total: usize,
        question: PresentedQuestion,
    },
    Evaluated {
        evaluation: Evaluation,
        auto_submitted: bool,
    },
    TestsRun {
        results: Vec<TestCaseResult>,
    },
    /// A command was refused; the session is unchanged.
    Rejected {
        message: String,
    },
    Completed {
        aggregate_score: f64,
        max_score: u32,
    },
    Abandoned,
    Persisted {
        record_id: RecordId,
    },
    /// Saving failed; `RetryPersist` tries again with the same snapshot.
    PersistFailed {
        message: String,
    },
}

/// Caller side of a running driver.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    updates: mpsc::Receiver<SessionUpdate>,
    shutdown: watch::Sender<bool>,
}

impl SessionHandle {
    /// Queue a command. Returns false once the driver has stopped.
    pub async fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Next update, or `None` once the driver has stopped.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        self.updates.recv().await
    }

    /// Stop the driver, cancelling any in-flight call.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Owns a session and drives it from commands and ticks.
pub struct SessionDriver {
    session: PracticeSession,
    commands: mpsc::Receiver<SessionCommand>,
    updates: mpsc::Sender<SessionUpdate>,
    shutdown: watch::Receiver<bool>,
    tick_period: Duration,
}

enum Step {
    Shutdown,
    Command(Option<SessionCommand>),
    Tick,
}

impl SessionDriver {
    /// Start `session` with `params` on a new task.
    ///
    /// The join handle yields the session back when the driver stops.
    pub fn spawn(
        session: PracticeSession,
        params: FetchParams,
        tick_period: Duration,
    ) -> (SessionHandle, JoinHandle<PracticeSession>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (update_tx, update_rx) = mpsc::channel(UPDATE_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let driver = SessionDriver {
            session,
            commands: command_rx,
            updates: update_tx,
            shutdown: shutdown_rx,
            tick_period,
        };
        let task = tokio::spawn(driver.run(params));

        let handle = SessionHandle {
            commands: command_tx,
            updates: update_rx,
            shutdown: shutdown_tx,
        };
        (handle, task)
    }

    /// Run until the session settles, shutdown is requested or the handle
    /// is dropped.
    pub async fn run(mut self, params: FetchParams) -> PracticeSession {
        let started = until_shutdown(&mut self.shutdown, self.session.start(&params)).await;
        match started {
            None => return self.session,
            Some(Err(e)) => {
                self.emit(vec![SessionUpdate::StartFailed {
                    message: e.to_string(),
                }])
                .await;
                return self.session;
            }
            Some(Ok(())) => {
                let mut updates = vec![SessionUpdate::Started {
                    session_id: self.session.session_id().to_string(),
                    total: self.session.questions().len(),
                }];
                updates.extend(presented(&self.session));
                self.emit(updates).await;
            }
        }

        let mut interval = tokio::time::interval(self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            if self.settled() {
                debug!(session_id = %self.session.session_id(), "Session settled, driver stopping");
                break;
            }

            let ticking = self.session.status() == SessionStatus::InProgress;
            let step = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown) => Step::Shutdown,
                command = self.commands.recv() => Step::Command(command),
                _ = interval.tick(), if ticking => Step::Tick,
            };

            let updates = match step {
                Step::Shutdown | Step::Command(None) => break,
                Step::Command(Some(command)) => {
                    until_shutdown(&mut self.shutdown, apply(&mut self.session, command)).await
                }
                Step::Tick => until_shutdown(&mut self.shutdown, tick(&mut self.session)).await,
            };

            match updates {
                Some(updates) => self.emit(updates).await,
                None => break,
            }
        }

        info!(
            session_id = %self.session.session_id(),
            status = %self.session.status(),
            "Session driver stopped"
        );
        self.session
    }

    /// Terminal with nothing left to retry.
    fn settled(&self) -> bool {
        self.session.status().is_terminal() && self.session.last_persist_error().is_none()
    }

    async fn emit(&self, updates: Vec<SessionUpdate>) {
        for update in updates {
            // A dropped receiver only means nobody is listening.
            if self.updates.send(update).await.is_err() {
                break;
            }
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Sender gone without a shutdown request: wait forever.
            std::future::pending::<()>().await;
        }
    }
}

/// Run `fut` unless shutdown is requested first.
async fn until_shutdown<F: Future>(shutdown: &mut watch::Receiver<bool>, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = wait_for_shutdown(shutdown) => None,
        output = fut => Some(output),
    }
}

fn presented(session: &PracticeSession) -> Option<SessionUpdate> {
    if session.status() != SessionStatus::InProgress {
        return None;
    }
    session
        .presented_question()
        .map(|question| SessionUpdate::QuestionPresented {
            index: session.current_index(),
            total: session.questions().len(),
            question,
        })
}

fn outcome_updates(session: &PracticeSession, index_before: usize) -> Vec<SessionUpdate> {
    let mut updates = Vec::new();
    match session.status() {
        SessionStatus::InProgress if session.current_index() != index_before => {
            updates.extend(presented(session));
        }
        SessionStatus::Complete => {
            updates.push(SessionUpdate::Completed {
                aggregate_score: session.aggregate_score(),
                max_score: session.max_score(),
            });
            updates.extend(persist_update(session));
        }
        _ => {}
    }
    updates
}

fn persist_update(session: &PracticeSession) -> Option<SessionUpdate> {
    if let Some(error) = session.last_persist_error() {
        return Some(SessionUpdate::PersistFailed {
            message: error.to_string(),
        });
    }
    session.record_id().map(|id| SessionUpdate::Persisted {
        record_id: id.clone(),
    })
}

async fn apply(session: &mut PracticeSession, command: SessionCommand) -> Vec<SessionUpdate> {
    let index_before = session.current_index();
    let rejected = |message: String| vec![SessionUpdate::Rejected { message }];

    match command {
        SessionCommand::SetAnswer(value) => match session.set_answer(value) {
            Ok(()) => Vec::new(),
            Err(e) => rejected(e.to_string()),
        },
        SessionCommand::SelectLanguage(language) => match session.select_language(language) {
            Ok(()) => Vec::new(),
            Err(e) => rejected(e.to_string()),
        },
        SessionCommand::RunTests => match session.run_tests().await {
            Ok(results) => vec![SessionUpdate::TestsRun { results }],
            Err(e) => rejected(e.to_string()),
        },
        SessionCommand::Submit => match session.submit_current().await {
            Ok(Some(evaluation)) => {
                let mut updates = vec![SessionUpdate::Evaluated {
                    evaluation,
                    auto_submitted: false,
                }];
                updates.extend(outcome_updates(session, index_before));
                updates
            }
            Ok(None) => Vec::new(),
            Err(e) => rejected(e.to_string()),
        },
        SessionCommand::Abandon => match session.abandon().await {
            Ok(_) => {
                let mut updates = vec![SessionUpdate::Abandoned];
                updates.extend(persist_update(session));
                updates
            }
            Err(e) => rejected(e.to_string()),
        },
        SessionCommand::RetryPersist => match session.retry_persist().await {
            Ok(record_id) => vec![SessionUpdate::Persisted { record_id }],
            Err(e) => vec![SessionUpdate::PersistFailed {
                message: e.to_string(),
            }],
        },
    }
}

async fn tick(session: &mut PracticeSession) -> Vec<SessionUpdate> {
    let index_before = session.current_index();
    let evaluations = session.tick().await;
    if evaluations.is_empty() {
        return Vec::new();
    }

    let mut updates: Vec<SessionUpdate> = evaluations
        .into_iter()
        .map(|evaluation| SessionUpdate::Evaluated {
            evaluation,
            auto_submitted: true,
        })
        .collect();
    updates.extend(outcome_updates(session, index_before));
    updates
}
