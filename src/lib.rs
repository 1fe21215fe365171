//! # Interview Practice Engine
//!
//! A reusable engine for timed interview practice sessions: question
//! sequencing, timed submission, heuristic or LLM scoring, and persistence
//! of finished sessions.
//!
//! ## Features
//!
//! - **Question Providers**: static question bank (builtin or JSON) and
//!   LLM-generated company-specific sets
//! - **Timers**: per-question and session-wide countdowns with a single
//!   expiry notification and auto-submit
//! - **Response Collection**: last-write-wins answer buffer with validation
//!   for multiple choice, free text and code
//! - **Evaluation**: deterministic keyword heuristic, exact match and
//!   test-case scoring, or a remote LLM evaluator with timeout fallback
//! - **Code Execution**: run code answers against test cases remotely
//! - **Persistence**: idempotent SQLite session records with history
//!
//! ## Architecture
//!
//! ```text
//! QuestionProvider → PracticeSession ← SessionDriver (commands, ticks)
//!                     ↓            ↓
//!            EvaluatorAdapter   PersistenceGateway (SQLite)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use interview_practice_engine::evaluator::EvaluatorAdapter;
//! use interview_practice_engine::question::{FetchParams, StaticQuestionBank};
//! use interview_practice_engine::session::{PracticeSession, SessionDeps};
//! use interview_practice_engine::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = interview_practice_engine::Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let deps = SessionDeps::new(
//!         Arc::new(StaticQuestionBank::builtin()?),
//!         EvaluatorAdapter::default(),
//!         Arc::new(storage),
//!     );
//!     let mut session = PracticeSession::new("learner", deps, config.session);
//!     session.start(&FetchParams::new(3).with_topic("arrays")).await?;
//!     session.set_answer("Arrays keep elements in contiguous memory")?;
//!     session.submit_current().await?;
//!     Ok(())
//! }
//! ```

/// Response Collector for the active question.
pub mod collector;
/// Configuration loaded from the environment.
pub mod config;
/// Error types and result aliases.
pub mod error;
/// Evaluator Adapter with heuristic and remote strategies.
pub mod evaluator;
/// Chat-completion client.
pub mod llm;
/// System prompts for LLM calls.
pub mod prompts;
/// Question model and providers.
pub mod question;
/// Remote code execution.
pub mod runner;
/// Session state machine and driver.
pub mod session;
/// Persistence Gateway and SQLite storage.
pub mod storage;
/// Countdown timer controller.
pub mod timer;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use session::{PracticeSession, SessionDeps, SessionDriver, SessionStatus};
