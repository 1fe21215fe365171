use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub evaluator: EvaluatorConfig,
    pub questions: QuestionSourceConfig,
    pub session: SessionConfig,
    pub runner: RunnerConfig,
}

/// Chat-completion API configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Which evaluation strategy a deployment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorMode {
    Local,
    Remote,
}

/// Evaluator configuration
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub mode: EvaluatorMode,
    /// Deadline for one whole remote evaluation, retries included.
    pub timeout_ms: u64,
}

/// Where questions come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    Bank,
    Generated,
}

/// Question provider configuration
#[derive(Debug, Clone)]
pub struct QuestionSourceConfig {
    pub source: QuestionSource,
    pub bank_path: Option<PathBuf>,
}

/// Session behaviour configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub time_limit_secs: Option<u64>,
    pub persist_abandoned: bool,
}

/// Remote code execution configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let llm = LlmConfig {
            api_key: env::var("LLM_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai".to_string()),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/practice.db".to_string()),
            ),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS").unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_var("REQUEST_TIMEOUT_MS").unwrap_or(30000),
            max_retries: parse_var("MAX_RETRIES").unwrap_or(3),
            retry_delay_ms: parse_var("RETRY_DELAY_MS").unwrap_or(1000),
        };

        let evaluator = EvaluatorConfig {
            mode: match env::var("EVALUATOR_MODE")
                .unwrap_or_else(|_| "local".to_string())
                .to_lowercase()
                .as_str()
            {
                "local" => EvaluatorMode::Local,
                "remote" => EvaluatorMode::Remote,
                other => {
                    return Err(AppError::Config {
                        message: format!("EVALUATOR_MODE must be 'local' or 'remote', got '{}'", other),
                    })
                }
            },
            timeout_ms: parse_var("EVALUATOR_TIMEOUT_MS").unwrap_or(30000),
        };

        if evaluator.timeout_ms == 0 {
            return Err(AppError::Config {
                message: "EVALUATOR_TIMEOUT_MS must be greater than zero".to_string(),
            });
        }

        let questions = QuestionSourceConfig {
            source: match env::var("QUESTION_SOURCE")
                .unwrap_or_else(|_| "bank".to_string())
                .to_lowercase()
                .as_str()
            {
                "bank" => QuestionSource::Bank,
                "generated" => QuestionSource::Generated,
                other => {
                    return Err(AppError::Config {
                        message: format!(
                            "QUESTION_SOURCE must be 'bank' or 'generated', got '{}'",
                            other
                        ),
                    })
                }
            },
            bank_path: env::var("QUESTION_BANK_PATH").ok().map(PathBuf::from),
        };

        let session = SessionConfig {
            time_limit_secs: parse_var("SESSION_TIME_LIMIT_SECS"),
            persist_abandoned: parse_var("PERSIST_ABANDONED").unwrap_or(true),
        };

        let runner = RunnerConfig {
            base_url: env::var("RUNNER_BASE_URL")
                .unwrap_or_else(|_| "https://api.jdoodle.com".to_string()),
            client_id: env::var("RUNNER_CLIENT_ID").ok(),
            client_secret: env::var("RUNNER_CLIENT_SECRET").ok(),
        };

        let needs_llm = evaluator.mode == EvaluatorMode::Remote
            || questions.source == QuestionSource::Generated;
        if needs_llm && llm.api_key.is_none() {
            return Err(AppError::Config {
                message: "LLM_API_KEY is required for remote evaluation or generated questions"
                    .to_string(),
            });
        }

        Ok(Config {
            llm,
            database,
            logging,
            request,
            evaluator,
            questions,
            session,
            runner,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl RunnerConfig {
    /// Credentials, when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            mode: EvaluatorMode::Local,
            timeout_ms: 30000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: None,
            persist_abandoned: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_config_default() {
        let config = RequestConfig::default();
        assert_eq!(config.timeout_ms, 30000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[test]
    fn test_session_config_default_persists_abandoned() {
        let config = SessionConfig::default();
        assert!(config.persist_abandoned);
        assert!(config.time_limit_secs.is_none());
    }

    #[test]
    fn test_runner_credentials_need_both_halves() {
        let mut config = RunnerConfig {
            base_url: "https://api.jdoodle.com".to_string(),
            client_id: Some("id".to_string()),
            client_secret: None,
        };
        assert!(config.credentials().is_none());

        config.client_secret = Some("secret".to_string());
        assert_eq!(config.credentials(), Some(("id", "secret")));
    }
}
