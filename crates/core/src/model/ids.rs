use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicIdError {
    #[error("topic id cannot be empty")]
    Empty,

    #[error("topic id contains a path separator: {0}")]
    PathSeparator(String),
}

/// Stable identifier of a grammar topic, e.g. `01-不定詞與v-ing`.
///
/// Topic ids double as file stems (`topics/<id>.json`) and storage key
/// suffixes, so they must be non-empty and free of path separators.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicId(String);

impl TopicId {
    /// Creates a new `TopicId`.
    ///
    /// # Errors
    ///
    /// Returns `TopicIdError` if the id is blank or contains `/` or `\`.
    pub fn new(raw: impl Into<String>) -> Result<Self, TopicIdError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TopicIdError::Empty);
        }
        if trimmed.contains(['/', '\\']) {
            return Err(TopicIdError::PathSeparator(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicId({})", self.0)
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TopicId {
    type Err = TopicIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TopicId {
    type Error = TopicIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TopicId> for String {
    fn from(id: TopicId) -> Self {
        id.0
    }
}

impl AsRef<str> for TopicId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_trims() {
        let id: TopicId = "  01-不定詞與v-ing ".parse().unwrap();
        assert_eq!(id.as_str(), "01-不定詞與v-ing");
        assert_eq!(id.to_string(), "01-不定詞與v-ing");
    }

    #[test]
    fn rejects_blank() {
        assert_eq!("   ".parse::<TopicId>(), Err(TopicIdError::Empty));
    }

    #[test]
    fn rejects_path_separators() {
        assert!(matches!(
            TopicId::new("../secrets"),
            Err(TopicIdError::PathSeparator(_))
        ));
        assert!(TopicId::new("a\\b").is_err());
    }

    #[test]
    fn deserializes_through_validation() {
        let ok: TopicId = serde_json::from_str("\"12-relative\"").unwrap();
        assert_eq!(ok.as_str(), "12-relative");
        assert!(serde_json::from_str::<TopicId>("\"\"").is_err());
    }
}
