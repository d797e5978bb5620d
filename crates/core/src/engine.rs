use crate::model::{Phase, Question, RunProgress};

//
// ─── INTENTS ───────────────────────────────────────────────────────────────────
//

/// A user action fed into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Pick the option at this index for the current question.
    Answer(usize),
    /// Leave the explanation and move on.
    Next,
    /// Start over with the full question set.
    RetryAll,
    /// Start over with only the questions missed in the current run.
    RetryWrongs,
}

/// Outcome of feeding an [`Intent`] into the engine.
///
/// `Rejected` is not an error: the intent was not valid for the current
/// phase and the run is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Rejected,
}

impl Transition {
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(self, Transition::Applied)
    }
}

//
// ─── STATE VIEW ────────────────────────────────────────────────────────────────
//

/// Read-only view of a run, borrowed from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizState<'a> {
    pub phase: Phase,
    /// Active pool.
    pub questions: &'a [Question],
    pub current_index: usize,
    pub total_questions: usize,
    pub score: usize,
    /// `round(score / total * 100)`, or 0 for an empty pool.
    pub percentage: u32,
    pub wrongs: &'a [Question],
    pub last_answer_correct: Option<bool>,
    pub selected_index: Option<usize>,
    /// `None` in the `Result` phase or when the index is outside the pool.
    pub current_question: Option<&'a Question>,
}

impl QuizState<'_> {
    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 >= self.total_questions
    }
}

/// Percentage of `score` over `total`, rounded half up. Zero when `total` is zero.
#[must_use]
pub fn percentage(score: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let score = score.min(total) as u128;
    let total = total as u128;
    // (200s + t) / 2t == floor(100s/t + 1/2)
    let rounded = (score * 200 + total) / (total * 2);
    u32::try_from(rounded).unwrap_or(100)
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Multiple-choice quiz state machine.
///
/// The engine owns two question collections: the full set it was built with
/// and the active pool. `retry_wrongs` narrows the pool, `retry_all` restores
/// it from the full set. Order is never reshuffled here; shuffling happens
/// before construction.
///
/// Every operation is a guarded transition. Intents that make no sense in the
/// current phase are rejected and leave the run untouched.
///
/// | phase         | `Answer` | `Next`                  | `RetryAll` / `RetryWrongs` |
/// |---------------|----------|-------------------------|----------------------------|
/// | `Question`    | → `Explanation` | rejected         | → `Question` (reset)       |
/// | `Explanation` | rejected | → `Question` / `Result` | → `Question` (reset)       |
/// | `Result`      | rejected | rejected                | → `Question` (reset)       |
///
/// # Examples
///
/// ```
/// # use quiz_core::engine::QuizEngine;
/// # use quiz_core::model::{Explanation, Phase, Question};
/// let question = Question::new(
///     "She made me ___ the room.",
///     vec!["clean".into(), "to clean".into()],
///     0,
///     Explanation::new("她要我打掃房間。", "make + O + V"),
/// )?;
/// let mut engine = QuizEngine::new(vec![question]);
///
/// assert_eq!(engine.answer(0).phase, Phase::Explanation);
/// let state = engine.next();
/// assert_eq!(state.phase, Phase::Result);
/// assert_eq!(state.percentage, 100);
/// # Ok::<(), quiz_core::model::QuestionError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizEngine {
    all_questions: Vec<Question>,
    pool: Vec<Question>,
    phase: Phase,
    current_index: usize,
    score: usize,
    wrongs: Vec<Question>,
    last_answer_correct: Option<bool>,
    selected_index: Option<usize>,
}

impl QuizEngine {
    /// Start a fresh run over `questions`, in the given order.
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            pool: questions.clone(),
            all_questions: questions,
            phase: Phase::Question,
            current_index: 0,
            score: 0,
            wrongs: Vec::new(),
            last_answer_correct: None,
            selected_index: None,
        }
    }

    /// Rebuild a run from a saved snapshot.
    ///
    /// The snapshot is trusted as-is; an index past the end of the pool simply
    /// yields no current question.
    #[must_use]
    pub fn resume(progress: RunProgress) -> Self {
        let all_questions = if progress.all_questions.is_empty() {
            progress.questions.clone()
        } else {
            progress.all_questions
        };
        Self {
            all_questions,
            pool: progress.questions,
            phase: progress.phase,
            current_index: progress.current_index,
            score: progress.score,
            wrongs: progress.wrongs,
            last_answer_correct: progress.last_answer_correct,
            selected_index: progress.selected_index,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True while the active pool is the full question set.
    #[must_use]
    pub fn is_full_run(&self) -> bool {
        self.pool == self.all_questions
    }

    #[must_use]
    pub fn state(&self) -> QuizState<'_> {
        let current_question = if self.phase.is_terminal() {
            None
        } else {
            self.pool.get(self.current_index)
        };
        QuizState {
            phase: self.phase,
            questions: &self.pool,
            current_index: self.current_index,
            total_questions: self.pool.len(),
            score: self.score,
            percentage: percentage(self.score, self.pool.len()),
            wrongs: &self.wrongs,
            last_answer_correct: self.last_answer_correct,
            selected_index: self.selected_index,
            current_question,
        }
    }

    /// Snapshot for persistence.
    #[must_use]
    pub fn progress(&self) -> RunProgress {
        let all_questions = if self.is_full_run() {
            Vec::new()
        } else {
            self.all_questions.clone()
        };
        RunProgress {
            questions: self.pool.clone(),
            current_index: self.current_index,
            score: self.score,
            wrongs: self.wrongs.clone(),
            phase: self.phase,
            last_answer_correct: self.last_answer_correct,
            selected_index: self.selected_index,
            all_questions,
        }
    }

    /// Feed one intent through the transition table.
    pub fn apply(&mut self, intent: Intent) -> Transition {
        match (self.phase, intent) {
            (Phase::Question, Intent::Answer(option)) => self.record_answer(option),
            (Phase::Explanation, Intent::Next) => {
                self.advance();
                Transition::Applied
            }
            (_, Intent::RetryAll) => {
                self.reset(self.all_questions.clone());
                Transition::Applied
            }
            (_, Intent::RetryWrongs) => {
                let wrongs = std::mem::take(&mut self.wrongs);
                self.reset(wrongs);
                Transition::Applied
            }
            _ => Transition::Rejected,
        }
    }

    pub fn answer(&mut self, option_index: usize) -> QuizState<'_> {
        self.apply(Intent::Answer(option_index));
        self.state()
    }

    pub fn next(&mut self) -> QuizState<'_> {
        self.apply(Intent::Next);
        self.state()
    }

    pub fn retry_all(&mut self) -> QuizState<'_> {
        self.apply(Intent::RetryAll);
        self.state()
    }

    pub fn retry_wrongs(&mut self) -> QuizState<'_> {
        self.apply(Intent::RetryWrongs);
        self.state()
    }

    fn record_answer(&mut self, option_index: usize) -> Transition {
        // An empty pool (perfect run followed by retry-wrongs) has nothing to answer.
        let Some(question) = self.pool.get(self.current_index) else {
            return Transition::Rejected;
        };

        let correct = question.is_correct(option_index);
        if correct {
            self.score += 1;
        } else {
            self.wrongs.push(question.clone());
        }
        self.selected_index = Some(option_index);
        self.last_answer_correct = Some(correct);
        self.phase = Phase::Explanation;
        Transition::Applied
    }

    fn advance(&mut self) {
        if self.current_index + 1 >= self.pool.len() {
            self.phase = Phase::Result;
        } else {
            self.current_index += 1;
            self.selected_index = None;
            self.last_answer_correct = None;
            self.phase = Phase::Question;
        }
    }

    fn reset(&mut self, pool: Vec<Question>) {
        self.pool = pool;
        self.current_index = 0;
        self.score = 0;
        self.wrongs.clear();
        self.last_answer_correct = None;
        self.selected_index = None;
        self.phase = Phase::Question;
    }
}
