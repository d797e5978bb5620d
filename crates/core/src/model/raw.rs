use serde::Deserialize;
use thiserror::Error;

use crate::model::question::{Explanation, Question, QuestionError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NormalizeError {
    #[error("question {prompt:?} has neither an answer text nor a correct index")]
    MissingAnswer { prompt: String },

    #[error("answer {answer:?} is not one of the options of {prompt:?}")]
    AnswerNotInOptions { prompt: String, answer: String },

    #[error(transparent)]
    Question(#[from] QuestionError),
}

/// A question as scraped from the source pages.
///
/// The pages use several field spellings for the same data; every known
/// spelling is accepted here and [`RawQuestion::normalize`] folds them into
/// one canonical [`Question`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawQuestion {
    pub q: String,
    pub options: Vec<String>,
    /// Answer given as text.
    #[serde(default)]
    pub a: Option<String>,
    /// Answer given as an option index.
    #[serde(default)]
    pub correct: Option<usize>,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub trans: Option<String>,
    #[serde(default)]
    pub grammar: Option<String>,
    #[serde(default)]
    pub gram: Option<String>,
    #[serde(default)]
    pub ana: Option<String>,
    #[serde(default)]
    pub vocab: Option<String>,
    #[serde(default)]
    pub restore: Option<String>,
    #[serde(default)]
    pub orig: Option<String>,
}

impl RawQuestion {
    /// Fold the raw spellings into a canonical question.
    ///
    /// Precedence: answer text over index; `translation` over `trans`;
    /// `grammar` over `gram` over `ana`; `restore` over `orig`.
    ///
    /// # Errors
    ///
    /// Returns `NormalizeError` when no answer is given, the answer text is not
    /// among the options, or the resulting question is malformed.
    pub fn normalize(self) -> Result<Question, NormalizeError> {
        let correct_index = match (self.a, self.correct) {
            (Some(answer), _) => self
                .options
                .iter()
                .position(|option| *option == answer)
                .ok_or_else(|| NormalizeError::AnswerNotInOptions {
                    prompt: self.q.clone(),
                    answer,
                })?,
            (None, Some(index)) => index,
            (None, None) => return Err(NormalizeError::MissingAnswer { prompt: self.q }),
        };

        let explanation = Explanation {
            translation: self.translation.or(self.trans).unwrap_or_default(),
            grammar: self
                .grammar
                .or(self.gram)
                .or(self.ana)
                .unwrap_or_default(),
            vocab: self.vocab,
            restore: self.restore.or(self.orig),
        };

        Ok(Question::new(self.q, self.options, correct_index, explanation)?)
    }
}

/// Normalize a whole scraped array, stopping at the first bad item.
///
/// # Errors
///
/// Returns the first `NormalizeError` encountered.
pub fn normalize_all(
    raws: impl IntoIterator<Item = RawQuestion>,
) -> Result<Vec<Question>, NormalizeError> {
    raws.into_iter().map(RawQuestion::normalize).collect()
}
