use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::error::{ApplyError, RaceError};
use crate::geo::Fetcher;
use crate::race::{RaceObserver, Racer};
use crate::zoneinfo::TimezoneSink;

/// Configuration for repeating a failed race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of extra races after the first one fails.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given retry attempt using exponential backoff.
    /// delay = base_delay_ms * 2^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        self.base_delay_ms.saturating_mul(factor)
    }
}

/// Timezone reported by the service that won the race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    pub timezone: String,
    pub service: String,
}

/// What applying a detected timezone did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// The system already used that zone; nothing was touched.
    Unchanged,
}

/// Races the configured services (with retries) and hands the winner to a sink.
pub struct Updater<F, S> {
    fetcher: Arc<F>,
    services: Vec<String>,
    sink: S,
    racer: Racer,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl<F, S> Updater<F, S>
where
    F: Fetcher<Descriptor = String, Payload = String>,
    S: TimezoneSink,
{
    pub fn new(fetcher: Arc<F>, services: Vec<String>, sink: S) -> Self {
        Self {
            fetcher,
            services,
            sink,
            racer: Racer::new(),
            retry: RetryConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.racer = std::mem::take(&mut self.racer).with_deadline(deadline);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Aborts the current race and any pending backoff when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.racer = std::mem::take(&mut self.racer).with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RaceObserver>) -> Self {
        self.racer = std::mem::take(&mut self.racer).with_observer(observer);
        self
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Run races until one is won or retries are exhausted.
    ///
    /// `on_retry` is called with `(attempt, max_retries, error, delay_ms)`
    /// before each backoff.
    pub async fn detect(
        &self,
        mut on_retry: impl FnMut(u32, u32, &RaceError<F::Error>, u64),
    ) -> Result<Detected, RaceError<F::Error>> {
        let mut attempt = 0;
        loop {
            let result = self
                .racer
                .run(Arc::clone(&self.fetcher), self.services.iter().cloned())
                .await;

            match result {
                Ok(won) => {
                    let service = self.services[won.index].clone();
                    tracing::info!(timezone = %won.payload, %service, "timezone detected");
                    return Ok(Detected {
                        timezone: won.payload,
                        service,
                    });
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay_ms = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        attempt,
                        max = self.retry.max_retries,
                        error = %err,
                        delay_ms,
                        "race failed, retrying"
                    );
                    on_retry(attempt, self.retry.max_retries, &err, delay_ms);

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return Err(RaceError::Cancelled),
                        () = sleep(Duration::from_millis(delay_ms)) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Hand the detected timezone to the sink, unless it is already active.
    pub fn apply(&self, detected: &Detected) -> Result<Applied, ApplyError> {
        if self.sink.current().as_deref() == Some(detected.timezone.as_str()) {
            tracing::info!(timezone = %detected.timezone, "timezone already active");
            return Ok(Applied::Unchanged);
        }
        self.sink.apply(&detected.timezone)?;
        Ok(Applied::Updated)
    }
}
