use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question needs at least two options, got {0}")]
    TooFewOptions(usize),

    #[error("correct index {index} is out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },

    #[error("correct answer {stored:?} does not match option {index} ({actual:?})")]
    CorrectAnswerMismatch {
        index: usize,
        stored: String,
        actual: String,
    },
}

//
// ─── EXPLANATION ───────────────────────────────────────────────────────────────
//

/// Feedback shown after a question has been answered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Explanation {
    pub translation: String,
    pub grammar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocab: Option<String>,
    /// Original sentence for items built from a scrambled or transformed source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<String>,
}

impl Explanation {
    #[must_use]
    pub fn new(translation: impl Into<String>, grammar: impl Into<String>) -> Self {
        Self {
            translation: translation.into(),
            grammar: grammar.into(),
            vocab: None,
            restore: None,
        }
    }

    #[must_use]
    pub fn with_vocab(mut self, vocab: impl Into<String>) -> Self {
        self.vocab = Some(vocab.into());
        self
    }

    #[must_use]
    pub fn with_restore(mut self, restore: impl Into<String>) -> Self {
        self.restore = Some(restore.into());
        self
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// An immutable multiple-choice question.
///
/// `correct_index` always points into `options`. On the wire the redundant
/// `correctAnswer` text is written out and, when present on input, checked
/// against `options[correctIndex]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionRecord", into = "QuestionRecord")]
pub struct Question {
    prompt: String,
    options: Vec<String>,
    correct_index: usize,
    explanation: Explanation,
}

impl Question {
    /// Build a question, checking the option count and correct index.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::TooFewOptions` for fewer than two options and
    /// `QuestionError::CorrectIndexOutOfRange` for a dangling index.
    pub fn new(
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
        explanation: Explanation,
    ) -> Result<Self, QuestionError> {
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions(options.len()));
        }
        if correct_index >= options.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: correct_index,
                len: options.len(),
            });
        }
        Ok(Self {
            prompt: prompt.into(),
            options,
            correct_index,
            explanation,
        })
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.options[self.correct_index]
    }

    #[must_use]
    pub fn explanation(&self) -> &Explanation {
        &self.explanation
    }

    #[must_use]
    pub fn is_correct(&self, option_index: usize) -> bool {
        option_index == self.correct_index
    }

    /// Reorders the options so that new position `i` holds old option `order[i]`.
    ///
    /// The correct pointer follows its option through the permutation, so
    /// duplicate option text never confuses it. `order` must be a permutation
    /// of `0..options().len()`.
    #[must_use]
    pub fn with_option_order(&self, order: &[usize]) -> Self {
        debug_assert_eq!(order.len(), self.options.len());
        let mut correct_index = self.correct_index;
        let options = order
            .iter()
            .enumerate()
            .map(|(new, &old)| {
                if old == self.correct_index {
                    correct_index = new;
                }
                self.options[old].clone()
            })
            .collect();
        Self {
            prompt: self.prompt.clone(),
            options,
            correct_index,
            explanation: self.explanation.clone(),
        }
    }
}

/// Canonical JSON shape of a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionRecord {
    q: String,
    options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correct_answer: Option<String>,
    correct_index: usize,
    explanation: Explanation,
}

impl TryFrom<QuestionRecord> for Question {
    type Error = QuestionError;

    fn try_from(record: QuestionRecord) -> Result<Self, Self::Error> {
        let question = Question::new(
            record.q,
            record.options,
            record.correct_index,
            record.explanation,
        )?;
        if let Some(stored) = record.correct_answer
            && stored != question.correct_answer()
        {
            return Err(QuestionError::CorrectAnswerMismatch {
                index: question.correct_index,
                actual: question.correct_answer().to_owned(),
                stored,
            });
        }
        Ok(question)
    }
}

impl From<Question> for QuestionRecord {
    fn from(question: Question) -> Self {
        let correct_answer = Some(question.correct_answer().to_owned());
        Self {
            q: question.prompt,
            options: question.options,
            correct_answer,
            correct_index: question.correct_index,
            explanation: question.explanation,
        }
    }
}
