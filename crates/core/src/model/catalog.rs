use serde::{Deserialize, Serialize};

use crate::model::ids::TopicId;
use crate::model::question::Question;

/// Index document listing every topic grouped by category.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Remote stats collector. Empty when stats are disabled.
    #[serde(rename = "gasUrl", default)]
    pub stats_endpoint: String,
    #[serde(default)]
    pub categories: Vec<CategoryGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGroup {
    #[serde(rename = "categoryTitle")]
    pub title: String,
    pub topics: Vec<TopicEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicEntry {
    pub name: String,
    pub slug: String,
    pub topic_id: TopicId,
}

impl Manifest {
    #[must_use]
    pub fn find_topic(&self, id: &TopicId) -> Option<&TopicEntry> {
        self.categories
            .iter()
            .flat_map(|group| group.topics.iter())
            .find(|entry| &entry.topic_id == id)
    }

    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.categories.iter().map(|group| group.topics.len()).sum()
    }
}

/// The full question set of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicData {
    pub topic_id: TopicId,
    /// Human-readable topic name, also used as the stats key.
    #[serde(default)]
    pub current_topic: String,
    pub questions: Vec<Question>,
}

impl TopicData {
    /// Key under which scores for this topic are reported.
    #[must_use]
    pub fn stats_topic(&self) -> &str {
        if self.current_topic.trim().is_empty() {
            self.topic_id.as_str()
        } else {
            &self.current_topic
        }
    }
}
