use std::path::PathBuf;

use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use quiz_core::model::{Manifest, TopicData, TopicId};

use crate::error::CatalogError;

const MANIFEST_DOCUMENT: &str = "manifest.json";

/// Where the manifest and topic documents live.
///
/// Both layouts are `<root>/manifest.json` and `<root>/topics/<topicId>.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Directory(PathBuf),
    Remote(String),
}

impl CatalogSource {
    /// `http://` and `https://` locations are remote, anything else is a path.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Remote(trimmed.trim_end_matches('/').to_owned())
        } else {
            Self::Directory(PathBuf::from(trimmed))
        }
    }
}

fn topic_document(topic: &TopicId) -> String {
    format!("topics/{topic}.json")
}

/// Loads the manifest and topic question sets.
#[derive(Clone)]
pub struct CatalogService {
    source: CatalogSource,
    client: Client,
}

impl CatalogService {
    #[must_use]
    pub fn new(source: CatalogSource) -> Self {
        Self {
            source,
            client: Client::new(),
        }
    }

    /// Load the topic index.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the manifest is missing, unreachable or malformed.
    pub async fn load_manifest(&self) -> Result<Manifest, CatalogError> {
        self.fetch_document(MANIFEST_DOCUMENT).await
    }

    /// Load one topic's question set.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::TopicNotFound` if no document exists for `topic`,
    /// or another `CatalogError` if it cannot be read or parsed.
    pub async fn load_topic(&self, topic: &TopicId) -> Result<TopicData, CatalogError> {
        self.fetch_document(&topic_document(topic))
            .await
            .map_err(|err| match err {
                CatalogError::DocumentNotFound(_) => CatalogError::TopicNotFound(topic.clone()),
                other => other,
            })
    }

    /// Load the manifest and a topic together; either failing fails both.
    ///
    /// # Errors
    ///
    /// Returns the first `CatalogError` from either document.
    pub async fn load_topic_with_manifest(
        &self,
        topic: &TopicId,
    ) -> Result<(TopicData, Manifest), CatalogError> {
        tokio::try_join!(self.load_topic(topic), self.load_manifest())
    }

    async fn fetch_document<T: DeserializeOwned>(&self, document: &str) -> Result<T, CatalogError> {
        let body = match &self.source {
            CatalogSource::Directory(root) => {
                let path = root.join(document);
                debug!("reading catalog document {}", path.display());
                match tokio::fs::read_to_string(&path).await {
                    Ok(body) => body,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                        return Err(CatalogError::DocumentNotFound(document.to_owned()));
                    }
                    Err(source) => return Err(CatalogError::Io { path, source }),
                }
            }
            CatalogSource::Remote(base) => {
                let url = format!("{base}/{document}");
                debug!("fetching catalog document {url}");
                let response = self.client.get(&url).send().await?;
                match response.status() {
                    status if status.is_success() => response.text().await?,
                    StatusCode::NOT_FOUND => {
                        return Err(CatalogError::DocumentNotFound(document.to_owned()));
                    }
                    status => return Err(CatalogError::HttpStatus(status)),
                }
            }
        };

        serde_json::from_str(&body).map_err(|source| CatalogError::Parse {
            document: document.to_owned(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sources() {
        assert_eq!(
            CatalogSource::parse("https://quiz.example.test/data/"),
            CatalogSource::Remote("https://quiz.example.test/data".into())
        );
        assert_eq!(
            CatalogSource::parse("./data"),
            CatalogSource::Directory(PathBuf::from("./data"))
        );
    }

    #[test]
    fn topic_documents_live_under_topics() {
        let topic = TopicId::new("03-關係代名詞").unwrap();
        assert_eq!(topic_document(&topic), "topics/03-關係代名詞.json");
    }
}
