//! The condition poller behind every `wait_for` / `wait_for_delete` block.
//!
//! A wait observes a resource through [FetchState] at a fixed interval until the
//! [WaitMode] condition holds, the budget is spent or the wait is cancelled. Only the
//! observation is repeated, never the mutation that preceded it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::error::Result;
use crate::wait::WaitMode;
use crate::wait::WaitSpec;

/// Reads the current state of the watched resource.
///
/// `Ok(None)` means the resource does not exist. Any `Err` is treated as a transport failure
/// and ends the wait.
#[async_trait]
pub trait FetchState: Send + Sync {
    async fn fetch(&self) -> Result<Option<Value>>;
}

#[async_trait]
impl<F, Fut> FetchState for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Value>>> + Send,
{
    async fn fetch(&self) -> Result<Option<Value>> {
        (self)().await
    }
}

/// Terminal result of one wait.
#[derive(Debug)]
pub enum PollOutcome {
    /// The field condition holds.
    Satisfied,
    /// The resource is gone; the success case of a deletion wait.
    ResourceGone,
    TimedOut { attempts: u32, elapsed: Duration },
    Cancelled { attempts: u32 },
    Error(Error),
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Satisfied | PollOutcome::ResourceGone)
    }

    /// Turns every non-success outcome into a single error naming the condition.
    pub fn into_result(self, spec: &WaitSpec) -> Result<()> {
        match self {
            PollOutcome::Satisfied | PollOutcome::ResourceGone => Ok(()),
            PollOutcome::TimedOut { attempts, elapsed } => Err(Error::WaitTimeout {
                condition: spec.mode.to_string(),
                attempts,
                elapsed,
            }),
            PollOutcome::Cancelled { attempts } => Err(Error::WaitCancelled {
                condition: spec.mode.to_string(),
                attempts,
            }),
            PollOutcome::Error(error) => Err(error),
        }
    }
}

/// Polls a [FetchState] until a [WaitSpec] is met.
///
/// The poller holds no state besides its cancellation token, so one instance can serve any
/// number of concurrent waits. Cancelling the token interrupts a sleeping wait immediately.
#[derive(Debug, Clone, Default)]
pub struct ConditionPoller {
    cancel: CancellationToken,
}

impl ConditionPoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        ConditionPoller { cancel }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs one wait to completion.
    ///
    /// The first check always happens. After that, a zero timeout ends the wait right away
    /// and a positive one is compared against the time elapsed since entry before every sleep.
    #[tracing::instrument(
        skip_all,
        fields(
            condition = %spec.mode,
            timeout = ?spec.effective_timeout(),
            poll_interval = ?spec.poll_interval,
        )
    )]
    pub async fn poll_until<F>(&self, spec: &WaitSpec, state: &F) -> PollOutcome
    where
        F: FetchState + ?Sized,
    {
        if let Err(error) = spec.validate() {
            return PollOutcome::Error(error);
        }

        let timeout = spec.effective_timeout();
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);

            let observed = match state.fetch().await {
                Ok(observed) => observed,
                Err(error) => {
                    tracing::warn!(attempts, error = %error, "Failed to read resource state, giving up");
                    return PollOutcome::Error(error);
                }
            };

            if condition_met(&spec.mode, observed.as_ref()) {
                tracing::info!(attempts, elapsed = ?started.elapsed(), "Wait condition met");
                return match spec.mode {
                    WaitMode::Deletion => PollOutcome::ResourceGone,
                    WaitMode::FieldValue { .. } => PollOutcome::Satisfied,
                };
            }

            let elapsed = started.elapsed();
            if timeout.is_zero() || elapsed >= timeout {
                tracing::warn!(attempts, ?elapsed, "Wait timeout exceeded");
                return PollOutcome::TimedOut { attempts, elapsed };
            }

            tracing::debug!(attempts, ?elapsed, "Wait condition not met yet");
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!(attempts, "Wait cancelled");
                    return PollOutcome::Cancelled { attempts };
                }
                _ = tokio::time::sleep(spec.poll_interval) => {}
            }
        }
    }
}

fn condition_met(mode: &WaitMode, observed: Option<&Value>) -> bool {
    match mode {
        WaitMode::Deletion => observed.is_none(),
        WaitMode::FieldValue { path, expected_value } => {
            let Some(body) = observed else {
                return false;
            };
            match (path.extract(body), expected_value) {
                (Some(actual), Some(expected)) => actual == *expected,
                (Some(actual), None) => !actual.is_empty(),
                (None, _) => false,
            }
        }
    }
}
