use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use interview_practice_engine::{
    config::{Config, EvaluatorMode, LogFormat, QuestionSource},
    evaluator::{Evaluation, EvaluatorAdapter, RemoteEvaluator},
    llm::LlmClient,
    question::{
        Difficulty, FetchParams, GeneratedQuestionProvider, PresentedQuestion, Question,
        QuestionKind, QuestionProvider, StaticQuestionBank,
    },
    runner::{CodeRunner, JdoodleRunner},
    session::{PracticeSession, SessionCommand, SessionDeps, SessionDriver, SessionUpdate},
    storage::{PersistenceGateway, SqliteStorage},
};

/// Timed interview practice in the terminal
#[derive(Debug, Parser)]
#[command(name = "practice", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an interactive practice session
    Run {
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        position: Option<String>,
        #[arg(long)]
        difficulty: Option<Difficulty>,
        #[arg(long, default_value_t = 3)]
        count: usize,
        #[arg(long, default_value = "learner")]
        user: String,
    },
    /// List persisted sessions of a user
    History {
        #[arg(long, default_value = "learner")]
        user: String,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// List the question bank
    Questions {
        #[arg(long)]
        topic: Option<String>,
    },
}

/// A line typed during a session.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Submit,
    Language(String),
    RunTests,
    Retry,
    Quit,
    Text(String),
}

fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    match trimmed {
        "." => Input::Submit,
        ":run" => Input::RunTests,
        ":retry" => Input::Retry,
        ":quit" => Input::Quit,
        _ => match trimmed.strip_prefix(":lang") {
            Some(rest) if rest.is_empty() || rest.starts_with(' ') => {
                Input::Language(rest.trim().to_string())
            }
            _ => Input::Text(line.to_string()),
        },
    }
}

/// The answer being typed for the presented question.
///
/// Every typed line is forwarded to the session as it arrives; expiry
/// auto-submits whatever the session holds.
#[derive(Debug, Default)]
struct AnswerDraft {
    question: Option<PresentedQuestion>,
    buffer: String,
}

impl AnswerDraft {
    fn present(&mut self, question: PresentedQuestion) {
        self.question = Some(question);
        self.buffer.clear();
    }

    /// Commands to send for `input`. `Quit` is left to the caller.
    fn commands(&mut self, input: Input) -> Vec<SessionCommand> {
        match input {
            Input::Text(text) => {
                self.buffer.push_str(&text);
                self.buffer.push('\n');
                match &self.question {
                    Some(question) => vec![SessionCommand::SetAnswer(resolve_answer(
                        Some(question),
                        &self.buffer,
                    ))],
                    None => Vec::new(),
                }
            }
            Input::Submit => {
                self.buffer.clear();
                vec![SessionCommand::Submit]
            }
            Input::RunTests => vec![SessionCommand::RunTests],
            Input::Language(language) => vec![SessionCommand::SelectLanguage(language)],
            Input::Retry => vec![SessionCommand::RetryPersist],
            Input::Quit => Vec::new(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "Interview practice starting...");

    let result = match cli.command {
        Command::Run {
            topic,
            company,
            position,
            difficulty,
            count,
            user,
        } => {
            let mut params = FetchParams::new(count);
            params.topic = topic;
            params.company = company;
            params.position = position;
            params.difficulty = difficulty;
            run_session(&config, params, user).await
        }
        Command::History { user, limit } => show_history(&config, &user, limit).await,
        Command::Questions { topic } => list_questions(&config, topic.as_deref()),
    };

    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn load_bank(config: &Config) -> anyhow::Result<StaticQuestionBank> {
    let bank = match &config.questions.bank_path {
        Some(path) => StaticQuestionBank::from_json_file(path)?,
        None => StaticQuestionBank::builtin()?,
    };
    Ok(bank)
}

async fn build_deps(config: &Config) -> anyhow::Result<SessionDeps> {
    let needs_llm = config.evaluator.mode == EvaluatorMode::Remote
        || config.questions.source == QuestionSource::Generated;
    let llm = if needs_llm {
        let client = LlmClient::new(&config.llm, config.request.clone())?;
        info!(base_url = %client.base_url(), model = %client.model(), "LLM client initialized");
        Some(client)
    } else {
        None
    };

    let provider: Arc<dyn QuestionProvider> = match (&config.questions.source, &llm) {
        (QuestionSource::Generated, Some(client)) => {
            Arc::new(GeneratedQuestionProvider::new(client.clone()))
        }
        _ => Arc::new(load_bank(config)?),
    };

    let evaluator = match (&config.evaluator.mode, llm) {
        (EvaluatorMode::Remote, Some(client)) => {
            EvaluatorAdapter::Remote(RemoteEvaluator::new(client, config.evaluator.timeout_ms))
        }
        _ => EvaluatorAdapter::default(),
    };

    let storage = SqliteStorage::new(&config.database).await?;
    info!(path = %config.database.path.display(), "Database initialized");
    let gateway: Arc<dyn PersistenceGateway> = Arc::new(storage);

    let mut deps = SessionDeps::new(provider, evaluator, gateway);
    if let Some(runner) = JdoodleRunner::from_config(&config.runner, &config.request)? {
        let runner: Arc<dyn CodeRunner> = Arc::new(runner);
        deps = deps.with_runner(runner);
    }
    Ok(deps)
}

async fn run_session(config: &Config, params: FetchParams, user: String) -> anyhow::Result<()> {
    let deps = build_deps(config).await?;
    let session = PracticeSession::new(user, deps, config.session.clone());
    let (mut handle, task) = SessionDriver::spawn(session, params, Duration::from_secs(1));

    println!("Type your answer, then a line with '.' to submit.");
    println!("Commands: ':lang <name>', ':run', ':retry', ':quit'.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut draft = AnswerDraft::default();
    let mut stdin_open = true;
    let mut finished = false;

    loop {
        tokio::select! {
            update = handle.next_update() => {
                let Some(update) = update else { break };
                match &update {
                    SessionUpdate::QuestionPresented { question, .. } => {
                        draft.present(question.clone());
                    }
                    SessionUpdate::Completed { .. } | SessionUpdate::Abandoned => {
                        finished = true;
                        draft = AnswerDraft::default();
                    }
                    _ => {}
                }
                render(&update);
            }
            line = lines.next_line(), if stdin_open => {
                let input = match line? {
                    Some(line) => parse_input(&line),
                    None => {
                        stdin_open = false;
                        Input::Quit
                    }
                };

                let sent = match input {
                    // A finished session only lingers to retry a failed save.
                    Input::Quit if finished => {
                        handle.shutdown();
                        true
                    }
                    Input::Quit => handle.send(SessionCommand::Abandon).await,
                    input => {
                        let mut sent = true;
                        for command in draft.commands(input) {
                            if !handle.send(command).await {
                                sent = false;
                                break;
                            }
                        }
                        sent
                    }
                };
                if !sent {
                    break;
                }
            }
        }
    }

    let session = task.await?;
    println!(
        "\nSession {} ended ({}): {:.1} / {}",
        session.session_id(),
        session.status(),
        session.aggregate_score(),
        session.max_score()
    );
    if let Some(e) = session.last_persist_error() {
        println!("Results were not saved: {}", e);
    }
    Ok(())
}

/// Multiple-choice answers may be given by option number.
fn resolve_answer(question: Option<&PresentedQuestion>, buffer: &str) -> String {
    let answer = buffer.trim_end_matches('\n');
    match question {
        Some(q) if q.kind == QuestionKind::MultipleChoice => answer
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| q.options.get(i))
            .cloned()
            .unwrap_or_else(|| answer.trim().to_string()),
        _ => answer.to_string(),
    }
}

fn render(update: &SessionUpdate) {
    match update {
        SessionUpdate::Started { session_id, total } => {
            println!("Session {} started with {} questions.", session_id, total);
        }
        SessionUpdate::StartFailed { message } => println!("Could not start session: {}", message),
        SessionUpdate::QuestionPresented {
            index,
            total,
            question,
        } => {
            println!("\n--- Question {} of {} ({}) ---", index + 1, total, question.kind);
            println!("{}", question.prompt);
            for (i, option) in question.options.iter().enumerate() {
                println!("  {}. {}", i + 1, option);
            }
            if let Some(limit) = question.time_limit_seconds {
                println!("Time limit: {}s", limit);
            }
        }
        SessionUpdate::Evaluated {
            evaluation,
            auto_submitted,
        } => render_evaluation(evaluation, *auto_submitted),
        SessionUpdate::TestsRun { results } => {
            for (i, result) in results.iter().enumerate() {
                println!("Test Case {}: {}", i + 1, result.message());
            }
        }
        SessionUpdate::Rejected { message } => println!("! {}", message),
        SessionUpdate::Completed {
            aggregate_score,
            max_score,
        } => println!("\nSession complete: {:.1} / {}", aggregate_score, max_score),
        SessionUpdate::Abandoned => println!("\nSession abandoned."),
        SessionUpdate::Persisted { record_id } => println!("Saved as {}.", record_id),
        SessionUpdate::PersistFailed { message } => {
            println!("Saving failed: {}. Type ':retry' to try again.", message);
        }
    }
}

fn render_evaluation(evaluation: &Evaluation, auto_submitted: bool) {
    if auto_submitted {
        println!("\nTime is up, answer submitted automatically.");
    }
    println!("Score: {:.1} / {}", evaluation.score, evaluation.max_score);
    for strength in &evaluation.feedback.strengths {
        println!("  + {}", strength);
    }
    for improvement in &evaluation.feedback.improvements {
        println!("  - {}", improvement);
    }
    if !evaluation.feedback.narrative.is_empty() {
        println!("{}", evaluation.feedback.narrative);
    }
}

async fn show_history(config: &Config, user: &str, limit: u32) -> anyhow::Result<()> {
    let storage = SqliteStorage::new(&config.database).await?;
    let sessions = storage.history(user, limit).await?;

    if sessions.is_empty() {
        println!("No sessions recorded for {}.", user);
        return Ok(());
    }
    for s in sessions {
        println!(
            "{}  {}  {:<8}  {:.1} / {}  ({} of {} answered)",
            s.finished_at.format("%Y-%m-%d %H:%M"),
            s.session_id,
            s.outcome.as_str(),
            s.aggregate_score,
            s.max_score,
            s.answered_count,
            s.question_count
        );
    }
    Ok(())
}

fn list_questions(config: &Config, topic: Option<&str>) -> anyhow::Result<()> {
    let bank = load_bank(config)?;
    let questions = questions_on_topic(&bank, topic);
    if questions.is_empty() {
        println!(
            "No questions for topic '{}'. Available topics: {}",
            topic.unwrap_or_default(),
            bank.topics().join(", ")
        );
        return Ok(());
    }

    for question in questions {
        let first_line = question.prompt.lines().next().unwrap_or_default();
        println!(
            "{:<12} {:<16} {:<20} {}",
            question.id,
            question.kind.as_str(),
            question.topic.as_deref().unwrap_or("-"),
            first_line
        );
    }
    Ok(())
}

fn questions_on_topic<'a>(bank: &'a StaticQuestionBank, topic: Option<&str>) -> Vec<&'a Question> {
    bank.questions()
        .iter()
        .filter(|q| {
            topic.map_or(true, |t| {
                q.topic.as_deref().is_some_and(|qt| qt.eq_ignore_ascii_case(t))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("."), Input::Submit);
        assert_eq!(parse_input(":lang python"), Input::Language("python".to_string()));
        assert_eq!(parse_input(":run"), Input::RunTests);
        assert_eq!(parse_input(":quit"), Input::Quit);
        assert_eq!(parse_input(":language"), Input::Text(":language".to_string()));
        assert_eq!(parse_input("  hash map"), Input::Text("  hash map".to_string()));
    }

    fn choice_question() -> PresentedQuestion {
        PresentedQuestion {
            id: "q1".to_string(),
            kind: QuestionKind::MultipleChoice,
            prompt: "Pick".to_string(),
            options: vec!["Docker".to_string(), "Make".to_string()],
            time_limit_seconds: None,
            max_score: 10,
        }
    }

    #[test]
    fn test_typed_lines_reach_session_before_submit() {
        let mut draft = AnswerDraft::default();
        draft.present(PresentedQuestion {
            kind: QuestionKind::FreeText,
            options: Vec::new(),
            ..choice_question()
        });

        assert_eq!(
            draft.commands(parse_input("hash map lookup")),
            vec![SessionCommand::SetAnswer("hash map lookup".to_string())]
        );
        assert_eq!(
            draft.commands(parse_input("is O(1)")),
            vec![SessionCommand::SetAnswer("hash map lookup\nis O(1)".to_string())]
        );
        assert_eq!(draft.commands(parse_input(".")), vec![SessionCommand::Submit]);
        assert!(draft.buffer.is_empty());
    }

    #[test]
    fn test_draft_resolves_option_number_as_typed() {
        let mut draft = AnswerDraft::default();
        draft.present(choice_question());

        assert_eq!(
            draft.commands(parse_input("2")),
            vec![SessionCommand::SetAnswer("Make".to_string())]
        );
        assert_eq!(draft.commands(parse_input(":run")), vec![SessionCommand::RunTests]);
        assert!(draft.commands(parse_input(":quit")).is_empty());
    }

    #[test]
    fn test_text_without_question_stays_local() {
        let mut draft = AnswerDraft::default();
        assert!(draft.commands(parse_input("early words")).is_empty());
    }

    #[test]
    fn test_new_question_clears_draft() {
        let mut draft = AnswerDraft::default();
        draft.present(choice_question());
        draft.commands(parse_input("Docker"));

        draft.present(choice_question());
        assert_eq!(
            draft.commands(parse_input("1")),
            vec![SessionCommand::SetAnswer("Docker".to_string())]
        );
    }

    #[test]
    fn test_questions_on_topic_ignores_case() {
        let bank = StaticQuestionBank::builtin().unwrap();
        let devops = questions_on_topic(&bank, Some("devops"));
        assert!(!devops.is_empty());
        assert!(devops.iter().all(|q| q.topic.as_deref() == Some("DevOps")));

        assert!(questions_on_topic(&bank, Some("Kubernetes")).is_empty());
        assert!(bank.topics().contains(&"DevOps"));
        assert_eq!(questions_on_topic(&bank, None).len(), bank.len());
    }

    #[test]
    fn test_resolve_answer_maps_option_numbers() {
        let question = PresentedQuestion {
            id: "q1".to_string(),
            kind: QuestionKind::MultipleChoice,
            prompt: "Pick".to_string(),
            options: vec!["Docker".to_string(), "Make".to_string()],
            time_limit_seconds: None,
            max_score: 10,
        };
        assert_eq!(resolve_answer(Some(&question), "2\n"), "Make");
        assert_eq!(resolve_answer(Some(&question), "Docker\n"), "Docker");
        assert_eq!(resolve_answer(Some(&question), "7\n"), "7");
        assert_eq!(resolve_answer(None, "free\ntext\n"), "free\ntext");
    }
}
