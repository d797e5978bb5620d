use std::fmt;

use rand::Rng;
use tokio::task::JoinHandle;

use quiz_core::model::{RunProgress, TopicData, TopicId};
use quiz_core::shuffle::shuffle_questions;
use quiz_core::{Intent, Phase, QuizEngine, QuizState, Transition};

use super::progress::SessionProgress;
use crate::error::QuizSessionError;
use crate::stats::StatsClient;

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One opened topic: the engine plus everything needed to persist and report it.
///
/// Mutation goes through `QuizLoopService`, which saves after each applied
/// intent; this type only owns state.
pub struct QuizSession {
    topic_id: TopicId,
    title: String,
    engine: QuizEngine,
    stats: StatsClient,
    resumed: bool,
    score_reported: bool,
    pending_report: Option<JoinHandle<()>>,
}

impl QuizSession {
    /// Start a fresh run, optionally shuffling questions and their options.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Empty` if the topic has no questions.
    pub(crate) fn start<R: Rng>(
        topic: TopicData,
        stats: StatsClient,
        rng: Option<&mut R>,
    ) -> Result<Self, QuizSessionError> {
        if topic.questions.is_empty() {
            return Err(QuizSessionError::Empty(topic.topic_id));
        }
        let title = topic.stats_topic().to_owned();
        let questions = match rng {
            Some(rng) => shuffle_questions(&topic.questions, rng),
            None => topic.questions,
        };
        Ok(Self {
            topic_id: topic.topic_id,
            title,
            engine: QuizEngine::new(questions),
            stats,
            resumed: false,
            score_reported: false,
            pending_report: None,
        })
    }

    /// Rebuild a session from a saved snapshot instead of reshuffling.
    pub(crate) fn resume(
        topic: &TopicData,
        run: RunProgress,
        stats: StatsClient,
    ) -> Self {
        Self {
            topic_id: topic.topic_id.clone(),
            title: topic.stats_topic().to_owned(),
            engine: QuizEngine::resume(run),
            stats,
            resumed: true,
            score_reported: false,
            pending_report: None,
        }
    }

    #[must_use]
    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    /// Display name of the topic, also the key scores are reported under.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// True when this session continued a saved run.
    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    #[must_use]
    pub fn state(&self) -> QuizState<'_> {
        self.engine.state()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::from_state(&self.engine.state())
    }

    #[must_use]
    pub fn stats(&self) -> &StatsClient {
        &self.stats
    }

    pub(crate) fn snapshot(&self) -> RunProgress {
        self.engine.progress()
    }

    pub(crate) fn apply(&mut self, intent: Intent) -> Transition {
        self.engine.apply(intent)
    }

    /// Percentage to report, once per session, for a finished full-set run.
    ///
    /// Wrong-only retries are never reported.
    pub(crate) fn take_score_report(&mut self) -> Option<u32> {
        if self.score_reported || self.phase() != Phase::Result || !self.engine.is_full_run() {
            return None;
        }
        self.score_reported = true;
        Some(self.engine.state().percentage)
    }

    pub(crate) fn track_report(&mut self, handle: JoinHandle<()>) {
        self.pending_report = Some(handle);
    }

    pub(crate) fn take_pending_report(&mut self) -> Option<JoinHandle<()>> {
        self.pending_report.take()
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.engine.state();
        f.debug_struct("QuizSession")
            .field("topic_id", &self.topic_id)
            .field("phase", &state.phase)
            .field("current_index", &state.current_index)
            .field("total", &state.total_questions)
            .field("score", &state.score)
            .field("resumed", &self.resumed)
            .field("score_reported", &self.score_reported)
            .field("report_pending", &self.pending_report.is_some())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
