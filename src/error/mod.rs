use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Question provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Code runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Question provider failures. Fatal to session start.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Question source unreachable: {message}")]
    Network { message: String },

    #[error("Question source quota exhausted: {message}")]
    Quota { message: String },

    #[error("Malformed question data: {message}")]
    Malformed { message: String },

    #[error("No questions matched the requested parameters")]
    Empty,
}

/// Rejected submission. Recovered locally; the learner retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Answer cannot be empty")]
    EmptyPayload,

    #[error("A programming language must be selected for code answers")]
    MissingLanguage,

    #[error("Answer type {actual} does not match question kind {expected}")]
    KindMismatch { expected: String, actual: String },

    #[error("Unknown option '{option}'")]
    UnknownOption { option: String },
}

/// Evaluator failures. Recovered through a degraded evaluation.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluator timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Evaluator unreachable: {message}")]
    Network { message: String },

    #[error("Malformed evaluator response: {message}")]
    MalformedResponse { message: String },
}

/// Persistence gateway failures. Surfaced as a retryable action.
#[derive(Debug, Clone, Error)]
pub enum PersistError {
    #[error("Persistence backend unreachable: {message}")]
    Network { message: String },

    #[error("Session snapshot rejected: {message}")]
    Validation { message: String },
}

/// LLM chat-completion API errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM unavailable: {message} (retries: {retries})")]
    Unavailable {
        message: String,
        retries: u32,
        last_status: Option<u16>,
    },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Remote code execution errors
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Code runner is not configured")]
    NotConfigured,

    #[error("Code runner unreachable: {message}")]
    Network { message: String },

    #[error("Code runner API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Session state machine errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot {action} while session is {status}")]
    InvalidState { action: String, status: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl From<sqlx::Error> for PersistError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_check_violation() || db.is_unique_violation() => {
                PersistError::Validation {
                    message: db.to_string(),
                }
            }
            other => PersistError::Network {
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for question provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for evaluator operations
pub type EvaluatorResult<T> = Result<T, EvaluatorError>;

/// Result type alias for persistence operations
pub type PersistResult<T> = Result<T, PersistError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Result type alias for code runner operations
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
