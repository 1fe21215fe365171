//! Chat-completion client used by the remote evaluator and the question
//! generator.
//!
//! Speaks the OpenAI-compatible `/v1/chat/completions` protocol, which is
//! what Groq and most hosted model gateways expose.

mod client;
mod types;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use client::LlmClient;
pub use types::*;
