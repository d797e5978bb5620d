use std::time::Duration;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use tokio::task::JoinHandle;

use quiz_core::model::TopicId;
use quiz_core::{Clock, Intent, Transition};
use storage::ProgressStore;

use super::service::QuizSession;
use crate::catalog::CatalogService;
use crate::error::QuizSessionError;
use crate::stats::{GlobalStats, StatsClient};

/// How long `flush_report` waits for a pending score report by default.
pub const REPORT_GRACE: Duration = Duration::from_secs(3);

/// Opens topics and drives sessions, persisting after every applied intent.
///
/// Snapshots are written for every non-terminal state and removed once a
/// run reaches its result. A finished full-set run reports its score in
/// the background.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    catalog: CatalogService,
    progress: ProgressStore,
    stats_endpoint: Option<String>,
    shuffle: bool,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(clock: Clock, catalog: CatalogService, progress: ProgressStore) -> Self {
        Self {
            clock,
            catalog,
            progress,
            stats_endpoint: None,
            shuffle: true,
        }
    }

    /// Use `endpoint` for stats instead of the manifest's collector URL.
    #[must_use]
    pub fn with_stats_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.stats_endpoint = Some(endpoint.into());
        self
    }

    /// Fresh runs keep the document's question and option order when off.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Open `topic`, resuming a saved run when one is still valid.
    ///
    /// A fresh run is shuffled and saved immediately so that quitting before
    /// the first answer still resumes the same order.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Catalog` if either document cannot be
    /// loaded, or `QuizSessionError::Empty` if the topic has no questions.
    pub async fn open_topic(&self, topic: &TopicId) -> Result<QuizSession, QuizSessionError> {
        let (data, manifest) = self.catalog.load_topic_with_manifest(topic).await?;
        let endpoint = self
            .stats_endpoint
            .clone()
            .unwrap_or(manifest.stats_endpoint);
        let stats = StatsClient::new(endpoint).with_clock(self.clock);

        if let Some(stored) = self.progress.load(topic).await {
            info!(
                "resuming topic {topic} at question {}",
                stored.run.current_index + 1
            );
            return Ok(QuizSession::resume(&data, stored.run, stats));
        }

        let session = if self.shuffle {
            let mut rng = rand::rng();
            QuizSession::start(data, stats, Some(&mut rng))?
        } else {
            QuizSession::start::<StdRng>(data, stats, None)?
        };
        info!(
            "starting topic {topic} with {} questions",
            session.state().total_questions
        );
        self.progress.save(topic, &session.snapshot()).await;
        Ok(session)
    }

    /// Apply `intent` and persist the outcome.
    ///
    /// Rejected intents change nothing, stored state included.
    pub async fn dispatch(&self, session: &mut QuizSession, intent: Intent) -> Transition {
        let transition = session.apply(intent);
        if !transition.is_applied() {
            debug!("ignored {intent:?} in phase {:?}", session.phase());
            return transition;
        }

        if session.phase().is_terminal() {
            self.progress.clear(session.topic_id()).await;
            if let Some(percentage) = session.take_score_report() {
                let stats = session.stats().clone();
                let title = session.title().to_owned();
                info!("finished {title} with {percentage}%");
                session.track_report(tokio::spawn(async move {
                    stats.post_score(&title, percentage).await;
                }));
            }
        } else {
            self.progress
                .save(session.topic_id(), &session.snapshot())
                .await;
        }
        transition
    }

    pub async fn answer(&self, session: &mut QuizSession, option_index: usize) -> Transition {
        self.dispatch(session, Intent::Answer(option_index)).await
    }

    pub async fn next(&self, session: &mut QuizSession) -> Transition {
        self.dispatch(session, Intent::Next).await
    }

    pub async fn retry_all(&self, session: &mut QuizSession) -> Transition {
        self.dispatch(session, Intent::RetryAll).await
    }

    pub async fn retry_wrongs(&self, session: &mut QuizSession) -> Transition {
        self.dispatch(session, Intent::RetryWrongs).await
    }

    /// Fetch global stats for the session's topic in the background.
    ///
    /// The task resolves to zeros when stats are unavailable.
    pub fn spawn_stats_fetch(&self, session: &QuizSession) -> JoinHandle<GlobalStats> {
        let stats = session.stats().clone();
        let title = session.title().to_owned();
        tokio::spawn(async move { stats.fetch_stats(&title).await })
    }

    /// Wait up to `grace` for a pending score report before the session is
    /// dropped. Returns false if the report was still in flight and got
    /// abandoned.
    pub async fn flush_report(&self, session: &mut QuizSession, grace: Duration) -> bool {
        let Some(mut handle) = session.take_pending_report() else {
            return true;
        };
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!("score report for {} failed: {err}", session.title());
                true
            }
            Err(_) => {
                debug!("abandoning score report for {}", session.title());
                handle.abort();
                false
            }
        }
    }
}
