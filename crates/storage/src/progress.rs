//! Resumable quiz progress, one entry per topic.
//!
//! Every operation here is best-effort: failures are logged and degrade to
//! "no saved progress", never to an error the caller must handle.

use std::sync::Arc;

use chrono::Duration;
use log::warn;
use serde::{Deserialize, Serialize};

use quiz_core::model::{RunProgress, TopicId};
use quiz_core::{Clock, Phase};

use crate::repository::{KeyValueStore, StorageError};

pub const STORAGE_KEY_PREFIX: &str = "quiz-progress-";

/// Saved runs older than this are discarded on load.
pub const MAX_AGE_HOURS: i64 = 24;

#[must_use]
pub fn storage_key(topic: &TopicId) -> String {
    format!("{STORAGE_KEY_PREFIX}{topic}")
}

/// Persisted shape: the run snapshot plus the time it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProgress {
    #[serde(flatten)]
    pub run: RunProgress,
    /// Milliseconds since the Unix epoch. A missing stamp counts as expired.
    #[serde(default)]
    pub saved_at: Option<i64>,
}

/// Why a stored entry was thrown away on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discard {
    Expired,
    Finished,
    /// No questions to play, or a position past the end of the pool.
    Unplayable,
}

#[derive(Clone)]
pub struct ProgressStore {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl ProgressStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: Clock::system(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Persist `run` for `topic`, stamped with the current time.
    ///
    /// Finished runs are never written. Storage failures are logged.
    pub async fn save(&self, topic: &TopicId, run: &RunProgress) {
        if run.phase.is_terminal() {
            warn!("refusing to save finished run for topic {topic}");
            return;
        }
        if let Err(err) = self.try_save(topic, run).await {
            warn!("failed to save quiz progress for topic {topic}: {err}");
        }
    }

    /// Load a resumable run for `topic`.
    ///
    /// Returns `None` when nothing is stored, the entry is unreadable or
    /// incomplete, the run had already finished, it has nothing left to
    /// play, or it is older than [`MAX_AGE_HOURS`]. Every case but the
    /// first also removes the entry.
    pub async fn load(&self, topic: &TopicId) -> Option<StoredProgress> {
        let key = storage_key(topic);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("failed to load quiz progress for topic {topic}: {err}");
                self.clear(topic).await;
                return None;
            }
        };

        let stored: StoredProgress = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(err) => {
                warn!("discarding unreadable quiz progress for topic {topic}: {err}");
                self.clear(topic).await;
                return None;
            }
        };

        if let Some(reason) = self.discard_reason(&stored) {
            log::debug!("discarding quiz progress for topic {topic}: {reason:?}");
            self.clear(topic).await;
            return None;
        }

        Some(stored)
    }

    /// Remove any saved run for `topic`. Failures are logged.
    pub async fn clear(&self, topic: &TopicId) {
        if let Err(err) = self.store.remove(&storage_key(topic)).await {
            warn!("failed to clear quiz progress for topic {topic}: {err}");
        }
    }

    async fn try_save(&self, topic: &TopicId, run: &RunProgress) -> Result<(), StorageError> {
        let stored = StoredProgress {
            run: run.clone(),
            saved_at: Some(self.clock.now_millis()),
        };
        let json = serde_json::to_string(&stored)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.store.set(&storage_key(topic), &json).await
    }

    fn discard_reason(&self, stored: &StoredProgress) -> Option<Discard> {
        let expired = match stored.saved_at {
            Some(saved_at) => self
                .clock
                .is_older_than(saved_at, Duration::hours(MAX_AGE_HOURS)),
            None => true,
        };
        if expired {
            return Some(Discard::Expired);
        }
        if stored.run.phase == Phase::Result {
            return Some(Discard::Finished);
        }
        let run = &stored.run;
        let no_questions = run.questions.is_empty() && run.all_questions.is_empty();
        let past_end = !run.questions.is_empty() && run.current_index >= run.questions.len();
        if no_questions || past_end {
            return Some(Discard::Unplayable);
        }
        None
    }
}
