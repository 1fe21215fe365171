//! Builtin question set shipped with the engine.
//!
//! Covers the four practice flows: technical theory (free text scored
//! against expected points), DevOps quiz (multiple choice), coding
//! (test cases) and HR/behavioural (free text).

use super::{Difficulty, Question, TestCase};

fn points(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn options(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn case(input: &str, expected_output: &str) -> TestCase {
    TestCase {
        input: input.to_string(),
        expected_output: expected_output.to_string(),
    }
}

/// Array theory questions for the technical round.
pub fn arrays_questions() -> Vec<Question> {
    vec![
        Question::free_text(
            "dsa-arrays-1",
            "Explain the concept of array manipulation and discuss time complexity for common operations.",
            points(&[
                "Definition of arrays and basic operations",
                "Time complexity for access O(1)",
                "Time complexity for insertion/deletion O(n)",
                "Memory layout and contiguous storage",
                "Real-world applications",
            ]),
        )
        .with_topic("Arrays")
        .with_time_limit(600),
        Question::free_text(
            "dsa-arrays-2",
            "What are the advantages and disadvantages of using arrays compared to linked lists?",
            points(&[
                "Random access capability",
                "Memory efficiency",
                "Insertion/deletion complexity",
                "Cache performance",
                "Use case scenarios",
            ]),
        )
        .with_topic("Arrays")
        .with_time_limit(600),
    ]
}

/// DevOps multiple-choice quiz.
pub fn devops_questions() -> Vec<Question> {
    vec![
        Question::multiple_choice(
            "devops-quiz-1",
            "Which practice merges developer changes into a shared mainline several times a day?",
            options(&[
                "Continuous Integration",
                "Continuous Deployment",
                "Blue-green deployment",
                "Infrastructure as Code",
            ]),
            "Continuous Integration",
        )
        .with_topic("DevOps")
        .with_difficulty(Difficulty::Easy)
        .with_time_limit(60),
        Question::multiple_choice(
            "devops-quiz-2",
            "Which tool is primarily used to define infrastructure declaratively across cloud providers?",
            options(&["Terraform", "Jenkins", "Prometheus", "Grafana"]),
            "Terraform",
        )
        .with_topic("DevOps")
        .with_difficulty(Difficulty::Easy)
        .with_time_limit(60),
        Question::multiple_choice(
            "devops-quiz-3",
            "What does a Kubernetes liveness probe decide?",
            options(&[
                "Whether the container should be restarted",
                "Whether the pod receives traffic",
                "How many replicas to run",
                "Which node the pod is scheduled on",
            ]),
            "Whether the container should be restarted",
        )
        .with_topic("DevOps")
        .with_time_limit(60),
    ]
}

/// Coding questions scored by test cases.
pub fn coding_questions() -> Vec<Question> {
    vec![
        Question::code(
            "code-two-sum",
            "Two Sum: read a line of space-separated integers followed by a target on the next line, \
             and print the indices of the two numbers that add up to the target, separated by a space.",
            vec![
                case("2 7 11 15\n9", "0 1"),
                case("3 2 4\n6", "1 2"),
                case("3 3\n6", "0 1"),
            ],
        )
        .with_topic("Arrays and Hashing")
        .with_company("Amazon")
        .with_difficulty(Difficulty::Easy)
        .with_time_limit(1200),
        Question::code(
            "code-valid-palindrome",
            "Valid Palindrome: read a string and print true if it reads the same forward and backward \
             after removing non-alphanumeric characters and lower-casing, otherwise false.",
            vec![
                case("A man, a plan, a canal: Panama", "true"),
                case("race a car", "false"),
                case(" ", "true"),
            ],
        )
        .with_topic("Two Pointers")
        .with_company("Microsoft")
        .with_difficulty(Difficulty::Easy)
        .with_time_limit(1200),
    ]
}

/// HR and behavioural questions.
pub fn hr_questions() -> Vec<Question> {
    vec![
        Question::free_text(
            "hr-1",
            "Tell me about yourself and your background.",
            points(&["relevant experience", "career goals", "key skills"]),
        )
        .with_topic("HR")
        .with_difficulty(Difficulty::Easy)
        .with_time_limit(300),
        Question::free_text(
            "hr-2",
            "How do you handle challenging situations at work?",
            points(&[
                "specific situation",
                "actions taken",
                "measurable result",
                "lessons learned",
            ]),
        )
        .with_topic("HR")
        .with_time_limit(300),
        Question::free_text(
            "hr-3",
            "Can you describe a project you're particularly proud of?",
            points(&["project scope", "personal contribution", "impact delivered"]),
        )
        .with_topic("HR")
        .with_time_limit(300),
    ]
}

/// Every builtin question, in presentation order.
pub fn builtin_questions() -> Vec<Question> {
    let mut all = arrays_questions();
    all.extend(devops_questions());
    all.extend(coding_questions());
    all.extend(hr_questions());
    all
}
