//! The human at the keyboard: prompts and status messages.

use async_trait::async_trait;

/// Interaction with the operator running the download session.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Shows `question` and returns the answer line, trimmed. An empty
    /// string means no answer (EOF or just Enter).
    async fn ask(&self, question: &str) -> String;

    /// Section heading such as the current page.
    fn heading(&self, message: &str);

    /// Plain status line.
    fn info(&self, message: &str);

    /// Progress step worth highlighting.
    fn notice(&self, message: &str);

    /// Something went wrong or ran out.
    fn alert(&self, message: &str);
}

/// Parses a non-negative count; anything else means 0 ("all" / "stop").
#[must_use]
pub fn parse_count(input: &str) -> usize {
    input.trim().parse::<i64>().map_or(0, |n| usize::try_from(n.max(0)).unwrap_or(0))
}

/// `y`, `yes` and `1` continue; everything else stops.
#[must_use]
pub fn is_affirmative(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes" | "1")
}

/// `n`, `no` and `0` decline a suggested default.
#[must_use]
pub fn is_negative(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "n" | "no" | "0")
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Answers prompts from a script and records everything shown.
    pub(crate) struct ScriptedOperator {
        answers: Mutex<VecDeque<String>>,
        questions: Mutex<Vec<String>>,
        output: Mutex<Vec<String>>,
    }

    impl ScriptedOperator {
        pub(crate) fn new(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().map(|a| (*a).to_string()).collect()),
                questions: Mutex::new(Vec::new()),
                output: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn questions(&self) -> Vec<String> {
            self.questions.lock().unwrap().clone()
        }

        pub(crate) fn output(&self) -> Vec<String> {
            self.output.lock().unwrap().clone()
        }

        pub(crate) fn said(&self, needle: &str) -> bool {
            self.output().iter().any(|line| line.contains(needle))
        }

        fn push(&self, line: &str) {
            self.output.lock().unwrap().push(line.to_string());
        }
    }

    #[async_trait]
    impl Operator for ScriptedOperator {
        async fn ask(&self, question: &str) -> String {
            self.questions.lock().unwrap().push(question.to_string());
            self.answers.lock().unwrap().pop_front().unwrap_or_default()
        }

        fn heading(&self, message: &str) {
            self.push(message);
        }

        fn info(&self, message: &str) {
            self.push(message);
        }

        fn notice(&self, message: &str) {
            self.push(message);
        }

        fn alert(&self, message: &str) {
            self.push(message);
        }
    }
}
