//! Fixed-interval bounded polling.
//!
//! Used where the producer gives no completion signal: check, sleep, check
//! again, up to a fixed number of attempts. No backoff, no jitter. Running out
//! of attempts is an ordinary outcome, not an error; the caller decides what
//! an absent value means.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

const DEFAULT_INTERVAL_MS: u64 = 1000;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How often and how many times to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollPolicy {
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on wall time spent polling.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// Result of a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The check produced a value on attempt `attempts` (1-based).
    Ready { value: T, attempts: u32 },
    /// Every attempt came back empty.
    Exhausted { attempts: u32 },
    /// The cancellation token fired after `attempts` evaluations.
    Cancelled { attempts: u32 },
}

impl<T> PollOutcome<T> {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Ready { attempts, .. }
            | Self::Exhausted { attempts }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Ready { value, .. } => Some(value),
            Self::Exhausted { .. } | Self::Cancelled { .. } => None,
        }
    }
}

/// Evaluate `check` until it yields a value, the attempts run out, or
/// `cancel` fires.
///
/// Sleeps `policy.interval` between evaluations but not after the last one,
/// so a poll that never succeeds takes `(max_attempts - 1) * interval`.
pub async fn poll_for<T, F>(
    mut check: F,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> PollOutcome<T>
where
    F: FnMut() -> Option<T>,
{
    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled {
                attempts: attempt - 1,
            };
        }

        if let Some(value) = check() {
            tracing::debug!(attempt, "Poll satisfied");
            return PollOutcome::Ready {
                value,
                attempts: attempt,
            };
        }

        if attempt == policy.max_attempts {
            break;
        }

        tracing::debug!(
            attempt,
            max_attempts = policy.max_attempts,
            interval_ms = policy.interval.as_millis(),
            "Poll not yet satisfied, waiting"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return PollOutcome::Cancelled { attempts: attempt };
            }
            () = tokio::time::sleep(policy.interval) => {}
        }
    }

    tracing::debug!(attempts = policy.max_attempts, "Poll exhausted");
    PollOutcome::Exhausted {
        attempts: policy.max_attempts,
    }
}

/// Boolean form of [`poll_for`].
pub async fn poll_until<F>(
    mut predicate: F,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> PollOutcome<()>
where
    F: FnMut() -> bool,
{
    poll_for(|| predicate().then_some(()), policy, cancel).await
}
