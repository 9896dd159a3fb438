use postlens_core::ProfileApiError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::stats::FetchStatsCollector;

/// Delay configuration for the fetch client.
///
/// All delays are injected through this struct so tests can run the full
/// wait-and-retry machinery with millisecond delays.
#[derive(Debug, Clone)]
pub struct FetchPacing {
    /// Short fixed delay between successive page requests (milliseconds)
    pub page_delay_ms: u64,
    /// Long fixed delay after a rate-limit response (milliseconds)
    pub rate_limit_delay_ms: u64,
    /// Number of consecutive rate-limit signals at which a call gives up
    pub rate_limit_ceiling: u32,
    /// Additional attempts for transient network failures
    pub transient_retries: u32,
    /// Base delay between transient retries (milliseconds)
    pub transient_delay_ms: u64,
    /// Maximum jitter factor applied to waits (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for FetchPacing {
    fn default() -> Self {
        Self {
            page_delay_ms: 5_000,        // 5 seconds between page requests
            rate_limit_delay_ms: 900_000, // 15 minutes after a 429
            rate_limit_ceiling: 2,
            transient_retries: 2,
            transient_delay_ms: 2_000,
            jitter_factor: 0.1,
        }
    }
}

impl FetchPacing {
    /// Pacing with near-zero delays, for tests.
    pub fn immediate() -> Self {
        Self {
            page_delay_ms: 0,
            rate_limit_delay_ms: 1,
            rate_limit_ceiling: 2,
            transient_retries: 2,
            transient_delay_ms: 1,
            jitter_factor: 0.0,
        }
    }

    pub(crate) fn rate_limit_wait(&self) -> Duration {
        jittered(self.rate_limit_delay_ms, self.jitter_factor)
    }

    pub(crate) fn page_wait(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

fn jittered(base_ms: u64, jitter_factor: f64) -> Duration {
    let jitter_range = (base_ms as f64 * jitter_factor) as u64;
    Duration::from_millis(base_ms + fastrand::u64(0..=jitter_range))
}

/// What the backoff state machine decides after a rate-limit signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStep {
    Wait(Duration),
    GiveUp,
}

/// Bounded wait-and-retry state machine for rate-limit responses:
/// Requesting -> Waiting(delay) -> Requesting, until the ceiling is hit,
/// then Failed. One instance lives for the duration of a single fetch
/// call and is discarded afterwards.
#[derive(Debug)]
pub struct RateLimitBackoff {
    consecutive_signals: u32,
    waits_performed: u32,
    ceiling: u32,
    delay: Duration,
}

impl RateLimitBackoff {
    pub fn new(pacing: &FetchPacing) -> Self {
        Self {
            consecutive_signals: 0,
            waits_performed: 0,
            ceiling: pacing.rate_limit_ceiling,
            delay: pacing.rate_limit_wait(),
        }
    }

    /// Records one rate-limit signal and decides the next step.
    pub fn on_rate_limited(&mut self) -> BackoffStep {
        self.consecutive_signals += 1;
        if self.consecutive_signals >= self.ceiling {
            warn!(
                signals = self.consecutive_signals,
                ceiling = self.ceiling,
                "rate-limit ceiling reached, giving up"
            );
            BackoffStep::GiveUp
        } else {
            self.waits_performed += 1;
            debug!(
                wait = ?self.delay,
                signals = self.consecutive_signals,
                "rate limited, waiting before retrying the same page"
            );
            BackoffStep::Wait(self.delay)
        }
    }

    /// A successful request clears the consecutive-signal count.
    pub fn on_success(&mut self) {
        self.consecutive_signals = 0;
    }

    pub fn waits_performed(&self) -> u32 {
        self.waits_performed
    }
}

/// Runs `operation` with up to `pacing.transient_retries` additional
/// attempts on transient failures (connect errors, timeouts, 5xx).
/// Rate-limit and permanent errors are returned to the caller untouched.
pub(crate) async fn retry_transient<T, F, Fut>(
    pacing: &FetchPacing,
    stats: &FetchStatsCollector,
    mut operation: F,
) -> Result<T, ProfileApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProfileApiError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_transient(&err) || attempt >= pacing.transient_retries {
                    return Err(err);
                }
                attempt += 1;
                stats.record_transient_retry();
                let delay = jittered(pacing.transient_delay_ms, pacing.jitter_factor);
                warn!(
                    attempt,
                    max = pacing.transient_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient fetch error, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

/// Transient errors are worth another attempt; everything else either
/// needs the rate-limit machinery or is permanent.
pub(crate) fn is_transient(err: &ProfileApiError) -> bool {
    matches!(
        err,
        ProfileApiError::TransientNetwork { .. }
            | ProfileApiError::RequestTimeout
            | ProfileApiError::ServerError { .. }
    )
}
