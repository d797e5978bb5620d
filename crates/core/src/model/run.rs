use serde::{Deserialize, Serialize};

use crate::model::question::Question;

/// Stage of a quiz run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Waiting for an answer to the current question.
    Question,
    /// Answer submitted, feedback is showing.
    Explanation,
    /// Run finished. Terminal until a retry.
    Result,
}

impl Phase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Result)
    }
}

/// Everything needed to rebuild a run exactly where it left off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    /// Active pool, in the order it is being played.
    pub questions: Vec<Question>,
    pub current_index: usize,
    pub score: usize,
    pub wrongs: Vec<Question>,
    pub phase: Phase,
    #[serde(default)]
    pub last_answer_correct: Option<bool>,
    #[serde(default)]
    pub selected_index: Option<usize>,
    /// Full question set `retry_all` returns to. Empty means "same as `questions`".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_questions: Vec<Question>,
}
