//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use quiz_core::model::TopicId;

/// Errors from the stats collector.
///
/// These never leave `StatsClient`'s public methods; they exist so every
/// failure path is named before it is mapped to a fallback.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StatsError {
    #[error("stats endpoint is not configured")]
    Disabled,
    #[error("stats request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors while loading the manifest or a topic's question set.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("topic {0} was not found")]
    TopicNotFound(TopicId),
    #[error("catalog document {0} was not found")]
    DocumentNotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("malformed catalog document {document}: {source}")]
    Parse {
        document: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors emitted while opening a quiz session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("topic {0} has no questions")]
    Empty(TopicId),
}
