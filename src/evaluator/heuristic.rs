//! Deterministic local scoring.
//!
//! Free-text answers are scored by keyword coverage of the expected
//! discussion points, multiple choice by exact match, and code by the share
//! of recorded test cases that passed.

use async_trait::async_trait;

use super::{Evaluation, Evaluator, Feedback};
use crate::collector::{Payload, Response};
use crate::error::EvaluatorResult;
use crate::question::{AnswerKey, Question, TestCase};
use crate::runner::TestCaseResult;

/// Points awarded per covered discussion point.
pub const POINTS_PER_COVERED_POINT: f64 = 2.0;

/// Keywords of at most this many characters are ignored.
const MIN_KEYWORD_CHARS: usize = 3;

/// Answers longer than this count as detailed.
const DETAILED_ANSWER_CHARS: usize = 200;

/// Answers shorter than this need more detail.
const BRIEF_ANSWER_CHARS: usize = 100;

/// Improvement attached to every empty answer.
pub const NO_ANSWER_IMPROVEMENT: &str =
    "No answer was provided; address the question directly with your own explanation";

/// Keyword-and-length heuristic evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    /// Create a heuristic evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Score a response against its question. Never fails.
    pub fn score(&self, question: &Question, response: &Response) -> Evaluation {
        if response.payload.is_empty() {
            return empty_answer(question);
        }

        match &question.answer_key {
            AnswerKey::Choice { correct } => score_choice(question, &response.payload, correct),
            AnswerKey::Rubric { points } => score_text(question, response.payload.text(), points),
            AnswerKey::TestCases { cases } => score_code(question, cases, &response.test_results),
        }
    }
}

#[async_trait]
impl Evaluator for HeuristicEvaluator {
    async fn evaluate(&self, question: &Question, response: &Response) -> EvaluatorResult<Evaluation> {
        Ok(self.score(question, response))
    }
}

/// Evaluation for an answer with no content.
pub fn empty_answer(question: &Question) -> Evaluation {
    Evaluation::new(
        &question.id,
        0.0,
        question.max_score,
        Feedback {
            strengths: Vec::new(),
            improvements: vec![NO_ANSWER_IMPROVEMENT.to_string()],
            narrative: "No answer was submitted for this question.".to_string(),
        },
    )
}

/// Lower-cased keywords of a discussion point.
///
/// Words of three characters or fewer are noise ("for", "and", "map").
/// A point made only of short words keeps all of them so it can still be
/// matched.
fn keywords(point: &str) -> Vec<String> {
    let words: Vec<String> = point.to_lowercase().split_whitespace().map(String::from).collect();
    let long: Vec<String> = words
        .iter()
        .filter(|w| w.chars().count() > MIN_KEYWORD_CHARS)
        .cloned()
        .collect();

    if long.is_empty() {
        words
    } else {
        long
    }
}

/// Whether more than half of the point's keywords occur in the answer.
fn point_covered(answer_lower: &str, point: &str) -> bool {
    let keywords = keywords(point);
    if keywords.is_empty() {
        return false;
    }
    let matched = keywords.iter().filter(|k| answer_lower.contains(k.as_str())).count();
    matched * 2 > keywords.len()
}

fn mentions_examples(answer_lower: &str) -> bool {
    answer_lower.contains("example") || answer_lower.contains("instance")
}

fn score_text(question: &Question, answer: &str, points: &[String]) -> Evaluation {
    let lower = answer.to_lowercase();
    let length = answer.chars().count();

    let mut strengths = Vec::new();
    let mut improvements = Vec::new();

    if length > DETAILED_ANSWER_CHARS {
        strengths.push("Provided a detailed response".to_string());
    }
    if length < BRIEF_ANSWER_CHARS {
        improvements.push("Provide more detailed explanation".to_string());
    }
    if mentions_examples(&lower) {
        strengths.push("Included practical examples".to_string());
    }

    let mut raw_score = 0.0;
    for point in points {
        if point_covered(&lower, point) {
            raw_score += POINTS_PER_COVERED_POINT;
            strengths.push(format!("Demonstrated understanding of {}", point));
        } else {
            improvements.push(format!("Consider discussing {}", point));
        }
    }

    if !mentions_examples(&lower) {
        improvements.push("Include practical examples to support your explanation".to_string());
    }

    let score = raw_score.min(question.max_score as f64);
    let mut narrative = band_narrative(score, question.max_score).to_string();
    if !improvements.is_empty() {
        narrative.push_str(" Focus on the suggested improvements to strengthen your answer.");
    }

    if strengths.is_empty() {
        strengths.push("Good attempt at answering the question".to_string());
    }
    if improvements.is_empty() {
        improvements.push("Continue practicing and expanding your knowledge".to_string());
    }

    Evaluation::new(
        &question.id,
        score,
        question.max_score,
        Feedback {
            strengths,
            improvements,
            narrative,
        },
    )
}

fn band_narrative(score: f64, max_score: u32) -> &'static str {
    let ratio = score / max_score.max(1) as f64;
    if ratio >= 0.8 {
        "Excellent response! You demonstrated strong understanding of the concepts and provided good examples."
    } else if ratio >= 0.6 {
        "Good response. You covered many key points but there's room for more detail."
    } else if ratio >= 0.4 {
        "Fair response. Consider expanding your answer and including more specific examples."
    } else {
        "Your response needs improvement. Try to cover more key concepts and provide specific examples."
    }
}

fn score_choice(question: &Question, payload: &Payload, correct: &str) -> Evaluation {
    let chosen = payload.text().trim();
    let is_correct = chosen.eq_ignore_ascii_case(correct.trim());

    let (score, feedback) = if is_correct {
        (
            question.max_score as f64,
            Feedback {
                strengths: vec!["Selected the correct answer".to_string()],
                improvements: Vec::new(),
                narrative: "Correct.".to_string(),
            },
        )
    } else {
        (
            0.0,
            Feedback {
                strengths: Vec::new(),
                improvements: vec![format!("The correct answer is \"{}\"", correct)],
                narrative: format!("Incorrect: \"{}\" is not the right option.", chosen),
            },
        )
    };

    Evaluation::new(&question.id, score, question.max_score, feedback)
}

fn score_code(question: &Question, cases: &[TestCase], results: &[TestCaseResult]) -> Evaluation {
    if results.is_empty() {
        let narrative = if cases.is_empty() {
            "This question has no test cases to verify the solution against."
        } else {
            "The solution was submitted without running the test cases."
        };
        return Evaluation::new(
            &question.id,
            0.0,
            question.max_score,
            Feedback {
                strengths: Vec::new(),
                improvements: vec!["Run your code against the test cases before submitting".to_string()],
                narrative: narrative.to_string(),
            },
        );
    }

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let score = question.max_score as f64 * passed as f64 / total as f64;

    let mut strengths = Vec::new();
    if passed > 0 {
        strengths.push(format!("Passed {} of {} test cases", passed, total));
    }
    let improvements: Vec<String> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.passed)
        .map(|(i, r)| format!("Test Case {}: {}", i + 1, r.message()))
        .collect();

    let narrative = if passed == total {
        "All test cases passed.".to_string()
    } else {
        format!("{} of {} test cases failed.", total - passed, total)
    };

    Evaluation::new(
        &question.id,
        score,
        question.max_score,
        Feedback {
            strengths,
            improvements,
            narrative,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn response(question: &Question, payload: Payload) -> Response {
        Response {
            question_id: question.id.clone(),
            payload,
            started_at: Utc::now(),
            submitted_at: Utc::now(),
            auto_submitted: false,
            test_results: Vec::new(),
        }
    }

    fn text(s: &str) -> Payload {
        Payload::Text {
            text: s.to_string(),
        }
    }

    #[test]
    fn test_keywords_drop_short_words() {
        assert_eq!(keywords("Time complexity for access O(1)"), vec![
            "time", "complexity", "access", "o(1)"
        ]);
        assert_eq!(keywords("hash map"), vec!["hash"]);
        assert_eq!(keywords("DP"), vec!["dp"]);
    }

    #[test]
    fn test_point_covered_needs_more_than_half() {
        assert!(point_covered("uses a hash map", "hash map"));
        assert!(!point_covered("memory layout", "memory layout contiguous storage"));
        assert!(point_covered("memory layout and contiguous", "memory layout contiguous storage"));
    }

    #[test]
    fn test_hash_map_example_answer() {
        let question = Question::free_text(
            "q1",
            "How would you solve two-sum?",
            vec![
                "hash map".to_string(),
                "time complexity".to_string(),
                "example".to_string(),
            ],
        );
        let answer = "I used a hash map for O(1) lookup, for example in a two-sum problem";
        let evaluation = HeuristicEvaluator::new().score(&question, &response(&question, text(answer)));

        assert_eq!(evaluation.score, 4.0);
        assert!(evaluation
            .feedback
            .strengths
            .iter()
            .any(|s| s.eq_ignore_ascii_case("included practical examples")));
        assert!(evaluation
            .feedback
            .improvements
            .contains(&"Consider discussing time complexity".to_string()));
    }

    #[test]
    fn test_score_is_clamped_to_max() {
        let points: Vec<String> = (0..8).map(|i| format!("keyword{}", i)).collect();
        let answer = points.join(" ");
        let question = Question::free_text("q1", "Everything", points);

        let evaluation = HeuristicEvaluator::new().score(&question, &response(&question, text(&answer)));
        assert_eq!(evaluation.score, 10.0);
    }

    #[test]
    fn test_detailed_answer_earns_strength() {
        let question = Question::free_text("q1", "Explain", vec![]);
        let answer = "a".repeat(DETAILED_ANSWER_CHARS + 1);
        let evaluation = HeuristicEvaluator::new().score(&question, &response(&question, text(&answer)));

        assert!(evaluation
            .feedback
            .strengths
            .contains(&"Provided a detailed response".to_string()));
        assert!(!evaluation
            .feedback
            .improvements
            .contains(&"Provide more detailed explanation".to_string()));
    }

    #[test]
    fn test_empty_answer_scores_zero() {
        let question = Question::free_text("q1", "Explain", vec!["arrays".to_string()]);
        let evaluation = HeuristicEvaluator::new().score(&question, &response(&question, text("")));

        assert_eq!(evaluation.score, 0.0);
        assert_eq!(evaluation.feedback.improvements, vec![NO_ANSWER_IMPROVEMENT.to_string()]);
        assert!(evaluation.feedback.strengths.is_empty());
    }

    #[test]
    fn test_multiple_choice_exact_match() {
        let question = Question::multiple_choice(
            "q1",
            "Pick",
            vec!["Terraform".to_string(), "Jenkins".to_string()],
            "Terraform",
        );
        let heuristic = HeuristicEvaluator::new();

        let right = heuristic.score(
            &question,
            &response(&question, Payload::Choice { option: "terraform".to_string() }),
        );
        assert_eq!(right.score, 10.0);

        let wrong = heuristic.score(
            &question,
            &response(&question, Payload::Choice { option: "Jenkins".to_string() }),
        );
        assert_eq!(wrong.score, 0.0);
        assert!(wrong.feedback.improvements[0].contains("Terraform"));
    }

    #[test]
    fn test_code_scores_share_of_passed_cases() {
        let question = Question::code("c1", "Sum", vec![]).with_max_score(9);
        let mut submitted = response(
            &question,
            Payload::Code {
                code: "print(1)".to_string(),
                language: Some("python".to_string()),
            },
        );
        submitted.test_results = vec![
            TestCaseResult::passed("1", "1"),
            TestCaseResult::passed("2", "2"),
            TestCaseResult::failed("3", "3", "4"),
        ];

        let evaluation = HeuristicEvaluator::new().score(&question, &submitted);
        assert_eq!(evaluation.score, 6.0);
        assert_eq!(evaluation.feedback.strengths, vec!["Passed 2 of 3 test cases".to_string()]);
        assert_eq!(
            evaluation.feedback.improvements,
            vec!["Test Case 3: Expected: 3, Got: 4".to_string()]
        );
    }

    #[test]
    fn test_code_without_results_scores_zero() {
        let question = Question::code(
            "c1",
            "Sum",
            vec![TestCase {
                input: "1".to_string(),
                expected_output: "1".to_string(),
            }],
        );
        let submitted = response(
            &question,
            Payload::Code {
                code: "print(1)".to_string(),
                language: Some("python".to_string()),
            },
        );

        let evaluation = HeuristicEvaluator::new().score(&question, &submitted);
        assert_eq!(evaluation.score, 0.0);
        assert!(evaluation.feedback.improvements[0].contains("Run your code"));
    }
}
