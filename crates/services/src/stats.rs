use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::Clock;
use crate::error::StatsError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Aggregate score statistics for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GlobalStats {
    /// Number of completed runs reported.
    pub count: u64,
    /// Average percentage across those runs.
    pub avg: f64,
}

/// Best-effort client for the remote stats collector.
///
/// The public methods never fail: a disabled endpoint, a network error, a
/// non-OK status or a malformed body all fall back to neutral values.
#[derive(Clone)]
pub struct StatsClient {
    client: Client,
    endpoint: Option<String>,
    clock: Clock,
    timeout: Duration,
}

impl StatsClient {
    /// A blank `endpoint` disables the client.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let endpoint = (!endpoint.trim().is_empty()).then(|| endpoint.trim().to_owned());
        Self {
            client: Client::new(),
            endpoint,
            clock: Clock::system(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::new("")
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Fetch stats for `topic`, or `{count: 0, avg: 0}` on any failure.
    pub async fn fetch_stats(&self, topic: &str) -> GlobalStats {
        match self.try_fetch_stats(topic).await {
            Ok(stats) => stats,
            Err(err) => {
                debug!("stats fetch for {topic} fell back to zero: {err}");
                GlobalStats::default()
            }
        }
    }

    /// Report a finished run's percentage. Does nothing when disabled;
    /// failures are dropped.
    pub async fn post_score(&self, topic: &str, percentage: u32) {
        if !self.enabled() {
            return;
        }
        if let Err(err) = self.try_post_score(topic, percentage).await {
            debug!("stats post for {topic} dropped: {err}");
        }
    }

    async fn try_fetch_stats(&self, topic: &str) -> Result<GlobalStats, StatsError> {
        let endpoint = self.endpoint.as_deref().ok_or(StatsError::Disabled)?;
        let cache_bust = self.clock.now_millis().to_string();

        let response = self
            .client
            .get(endpoint)
            .query(&[("topic", topic), ("t", cache_bust.as_str())])
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StatsError::HttpStatus(response.status()));
        }

        let body: StatsResponse = response.json().await?;
        Ok(GlobalStats {
            count: body.count.unwrap_or(0),
            avg: body.avg.filter(|avg| avg.is_finite()).unwrap_or(0.0),
        })
    }

    async fn try_post_score(&self, topic: &str, percentage: u32) -> Result<(), StatsError> {
        let endpoint = self.endpoint.as_deref().ok_or(StatsError::Disabled)?;
        let payload = ScorePayload {
            topic,
            score: percentage,
        };

        let response = self
            .client
            .post(endpoint)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StatsError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    avg: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ScorePayload<'a> {
    topic: &'a str,
    score: u32,
}
