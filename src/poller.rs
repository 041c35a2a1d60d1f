//! Status polling for a started generation.
//!
//! The caller issues the start call; [`Poller::poll`] then sleeps one interval,
//! queries status and repeats until the status is terminal, the token fires or
//! the wall-clock budget runs out. Each sleep is capped at the deadline, so a
//! timeout is reported before deadline + one interval.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::protocol::{GenerationFailure, GenerationStatus, StatusReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Budget measured from the start of polling.
    pub max_duration: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_duration: Duration::from_secs(15 * 60),
        }
    }
}

/// Terminal result of a poll that neither timed out nor was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed(StatusReport),
    Failed(GenerationFailure),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Poller {
    config: PollConfig,
}

impl Poller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    /// Poll `query` until the generation reaches a terminal status.
    ///
    /// `on_report` sees every status report, including the terminal one. A
    /// query still pending at the deadline is dropped and reported as a timeout.
    /// Cancellation is checked before each sleep and before each query, and
    /// both waits are interrupted by the token; once it fires no further
    /// query is issued. Query errors are returned as `RemoteCallFailure`
    /// without retrying.
    pub async fn poll<Q, Fut>(
        &self,
        token: &CancellationToken,
        timeout_code: &str,
        mut on_report: impl FnMut(&StatusReport),
        mut query: Q,
    ) -> Result<PollOutcome, SessionError>
    where
        Q: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<StatusReport>>,
    {
        let started = Instant::now();
        let deadline = started + self.config.max_duration;
        let mut iteration: u32 = 0;

        loop {
            if token.is_cancelled() {
                tracing::debug!(iteration, "poll cancelled");
                return Err(SessionError::PollCancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out(started, iteration, timeout_code));
            }

            let wake = (now + self.config.interval).min(deadline);
            tokio::select! {
                biased;
                () = token.cancelled() => return Err(SessionError::PollCancelled),
                () = time::sleep_until(wake) => {}
            }
            if token.is_cancelled() {
                return Err(SessionError::PollCancelled);
            }
            if wake >= deadline {
                // The budget ran out while sleeping; report it on the next pass.
                continue;
            }

            iteration += 1;
            let report = tokio::select! {
                biased;
                () = token.cancelled() => return Err(SessionError::PollCancelled),
                () = time::sleep_until(deadline) => {
                    return Err(timed_out(started, iteration, timeout_code));
                }
                result = query() => result
                    .map_err(|source| SessionError::remote("get_generation_status", source))?,
            };
            tracing::debug!(
                iteration,
                status = ?report.status,
                remaining = ?report.remaining_iteration_count,
                total = ?report.total_iteration_count,
                "polled generation status"
            );
            on_report(&report);

            match report.status {
                GenerationStatus::InProgress => {}
                GenerationStatus::Complete => return Ok(PollOutcome::Completed(report)),
                GenerationStatus::Failed => return Ok(PollOutcome::Failed(report.failure())),
                GenerationStatus::Cancelled => return Err(SessionError::PollCancelled),
            }
        }
    }
}

fn timed_out(started: Instant, iteration: u32, code: &str) -> SessionError {
    tracing::warn!(
        iteration,
        elapsed_ms = started.elapsed().as_millis(),
        code,
        "poll timed out"
    );
    SessionError::PollTimeout {
        code: code.to_string(),
    }
}
