//! The fetch -> extract -> detect -> notify cycle.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use super::api_client::{FetchError, HypixelClient, JsonSource};
use super::change_detector::{ChangeDetector, DetectorEvent};
use super::config::{ConfigError, MonitorConfig};
use super::extractor::{ExtractError, Extraction, JmesPathExtractor, ValueExtractor};
use crate::notifications::service::Notifier;

/// The wait between ticks. Tests swap in one that does not touch the clock.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    FetchFailed(FetchError),
    ExtractFailed(ExtractError),
    Absent,
    Detected(DetectorEvent),
}

impl TickOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            TickOutcome::FetchFailed(_) => "fetch_failed",
            TickOutcome::ExtractFailed(_) => "extract_failed",
            TickOutcome::Absent => "absent",
            TickOutcome::Detected(event) => event.kind(),
        }
    }
}

#[derive(Debug)]
pub struct PollTick {
    pub at: DateTime<Utc>,
    pub outcome: TickOutcome,
}

pub struct PollLoop<S, E, Z> {
    source: S,
    extractor: E,
    detector: ChangeDetector,
    notifier: Notifier,
    sleeper: Z,
    interval: Duration,
}

impl PollLoop<HypixelClient, JmesPathExtractor, TokioSleeper> {
    /// Startup validation: the query is compiled before any request is made,
    /// then the client is prepared (which may resolve a username).
    pub async fn from_config(config: &MonitorConfig) -> Result<Self, ConfigError> {
        let extractor = JmesPathExtractor::compile(&config.query)?;
        let client = HypixelClient::prepare(config).await?;
        Ok(Self::new(
            client,
            extractor,
            Notifier::from_config(config),
            TokioSleeper,
            config.interval,
        ))
    }
}

impl<S, E, Z> PollLoop<S, E, Z>
where
    S: JsonSource,
    E: ValueExtractor,
    Z: Sleeper,
{
    pub fn new(source: S, extractor: E, notifier: Notifier, sleeper: Z, interval: Duration) -> Self {
        Self {
            source,
            extractor,
            detector: ChangeDetector::new(),
            notifier,
            sleeper,
            interval,
        }
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Runs a single tick. Errors are logged and returned in the outcome,
    /// never propagated.
    pub async fn tick(&mut self) -> PollTick {
        let at = Utc::now();
        let outcome = match self.source.fetch().await {
            Err(e) => {
                warn!(error = %e, status = ?e.status(), "Failed to fetch data this round; will retry after interval.");
                TickOutcome::FetchFailed(e)
            }
            Ok(document) => match self.extractor.extract(&document) {
                Err(e) => {
                    warn!(error = %e, "Failed to evaluate query; skipping this tick.");
                    TickOutcome::ExtractFailed(e)
                }
                Ok(Extraction::Absent) => {
                    warn!(
                        expression = self.extractor.expression(),
                        "Query matched nothing in the response; skipping this tick."
                    );
                    TickOutcome::Absent
                }
                Ok(Extraction::Found(value)) => {
                    let event = self.detector.observe(value);
                    self.notifier.dispatch(&event).await;
                    TickOutcome::Detected(event)
                }
            },
        };
        info!(at = %at.to_rfc3339(), outcome = outcome.kind(), "Tick complete.");
        PollTick { at, outcome }
    }

    /// Ticks until `shutdown_rx` fires or its sender goes away. Returns the
    /// number of ticks run.
    pub async fn run(&mut self, mut shutdown_rx: watch::Receiver<()>) -> u64 {
        info!(
            expression = self.extractor.expression(),
            interval_secs = self.interval.as_secs(),
            notify = self.notifier.notifications_enabled(),
            "Starting monitor."
        );

        let mut ticks = 0u64;
        loop {
            if !matches!(shutdown_rx.has_changed(), Ok(false)) {
                break;
            }

            self.tick().await;
            ticks += 1;

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => break,
                _ = self.sleeper.sleep(self.interval) => {}
            }
        }

        info!(ticks, "Shutdown signal received, monitor stopped.");
        ticks
    }
}
