//! Centralized prompt definitions for LLM calls
//!
//! This module contains the system prompts used by the remote evaluator and
//! the question generator. Keeping them in one place makes them easier to
//! maintain, test, and version.

/// System prompt for scoring a single interview answer.
pub const EVALUATION_PROMPT: &str = r#"You are an expert technical interviewer evaluating a candidate's answer.

Your response MUST be valid JSON in this exact format:
{
  "score": 7,
  "strengths": ["what the answer did well"],
  "improvements": ["what the answer should add or fix"],
  "feedback": "a short narrative assessment"
}

Guidelines:
- score is a number between 0 and the maximum score given in the request
- judge technical accuracy, completeness, clarity, practical understanding and use of examples
- an empty or off-topic answer scores 0
- strengths and improvements are short, specific sentences

Always respond with valid JSON only, no other text."#;

/// System prompt for generating a company-specific question set.
pub const QUESTION_GENERATION_PROMPT: &str = r#"You are an expert technical interviewer who specializes in creating DSA (Data Structures and Algorithms) and behavioral questions for tech companies.
Create challenging but fair questions that assess both technical skills and cultural fit.

Your response MUST be a JSON array where every element has this exact structure:
{
  "type": "code" | "dsa" | "hr" | "mcq",
  "question": "detailed question text with examples and constraints",
  "timeLimit": 900,
  "expectedAnswer": "detailed solution approach or key points",
  "evaluationCriteria": ["specific points to evaluate"],
  "options": ["only for mcq"],
  "correctAnswer": "only for mcq, one of options",
  "testCases": [{"input": "stdin", "expectedOutput": "stdout"}]
}

Guidelines:
- DSA questions state constraints and expected time/space complexity
- coding questions specify input/output format, edge cases and at least two test cases
- behavioral questions reflect the company's culture and the role
- timeLimit is in seconds

Always respond with the JSON array only, no other text."#;

/// Build the user message for an evaluation request.
pub fn evaluation_request(
    kind: &str,
    question: &str,
    expected: &str,
    max_score: u32,
    language: Option<&str>,
    answer: &str,
) -> String {
    let language_line = language
        .map(|l| format!("Programming Language: {}\n", l))
        .unwrap_or_default();

    format!(
        "Question Type: {kind}\nQuestion: {question}\nExpected Answer Points:\n{expected}\nMaximum Score: {max_score}\n{language_line}\nCandidate's Answer:\n{answer}"
    )
}

/// Build the user message for a question-generation request.
pub fn generation_request(company: &str, position: &str, count: usize) -> String {
    format!(
        "Create an interview question set of exactly {count} questions for a {position} position at {company}. \
         Mix DSA questions that evaluate algorithmic thinking, coding questions that implement those concepts, \
         and one behavioral question specific to {company}'s values."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_demand_json() {
        assert!(EVALUATION_PROMPT.contains("valid JSON"));
        assert!(QUESTION_GENERATION_PROMPT.contains("JSON array"));
    }

    #[test]
    fn test_evaluation_request_includes_language_only_when_given() {
        let with = evaluation_request("code", "Two sum", "- hash map", 10, Some("python"), "x");
        assert!(with.contains("Programming Language: python"));
        assert!(with.contains("Maximum Score: 10"));

        let without = evaluation_request("free_text", "Arrays", "- O(1)", 10, None, "x");
        assert!(!without.contains("Programming Language"));
    }

    #[test]
    fn test_generation_request_mentions_company_and_count() {
        let text = generation_request("Google", "Backend Engineer", 5);
        assert!(text.contains("exactly 5 questions"));
        assert!(text.contains("Backend Engineer position at Google"));
    }
}
