use quiz_core::{Phase, QuizState};

/// Aggregated view of run progress, useful for a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    /// 1-based position of the current question. 0 for an empty pool.
    pub position: usize,
    pub total: usize,
    /// The current question is the last one; advancing shows the result.
    pub is_last: bool,
    pub is_complete: bool,
}

impl SessionProgress {
    #[must_use]
    pub fn from_state(state: &QuizState<'_>) -> Self {
        let position = if state.total_questions == 0 {
            0
        } else {
            (state.current_index + 1).min(state.total_questions)
        };
        Self {
            position,
            total: state.total_questions,
            is_last: state.is_last_question(),
            is_complete: state.phase == Phase::Result,
        }
    }
}
