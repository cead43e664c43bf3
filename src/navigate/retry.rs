//! Exponential backoff for navigation attempts.
//!
//! Every adapter goes through the same [`BackoffPolicy`] instead of carrying
//! its own retry loop. A failed attempt is classified into a [`FailureType`];
//! the policy then decides whether another attempt is allowed and how long to
//! wait first.
//!
//! # Delay Calculation
//!
//! ```text
//! delay = min(base_delay * 2^(attempt - 1), max_delay) + jitter
//! ```
//!
//! Jitter is only ever added, so the wait before attempt `n + 1` is never
//! shorter than `base_delay * 2^(n - 1)`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use harvester_core::navigate::{BackoffPolicy, FailureType, RetryDecision};
//!
//! let policy = BackoffPolicy::new(3, Duration::from_millis(100));
//! match policy.should_retry(FailureType::Transient, 1) {
//!     RetryDecision::Retry { delay, attempt } => assert!(delay >= Duration::from_millis(100) && attempt == 2),
//!     RetryDecision::DoNotRetry { .. } => unreachable!(),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::NavigationError;

/// Default maximum attempts (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff (2 seconds).
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default maximum delay cap (60 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Classification of navigation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry (timeouts, 5xx, resets).
    Transient,

    /// The page loaded but looked wrong (error title, foreign host).
    ///
    /// Government portals intermittently serve maintenance pages, so this is
    /// retried like a transient failure.
    Rejected,

    /// Failure that will not change on retry (404, 410, malformed URL).
    Permanent,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with the given attempt bound and base delay, no jitter.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: DEFAULT_MAX_DELAY.max(base_delay),
            max_jitter: Duration::ZERO,
        }
    }

    /// Returns a copy with the given upper bound on random jitter.
    #[must_use]
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Returns a copy with a different attempt bound.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the base delay.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.delay_for(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Backoff before the attempt following `attempt`: `base * 2^(attempt-1)`, capped, plus jitter.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let scaled = self.base_delay.saturating_mul(1_u32 << exponent);
        scaled.min(self.max_delay) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}

/// Classifies a navigation error for retry decisions.
///
/// Only failures a retry cannot change stop early; everything else is
/// retried up to the attempt bound.
///
/// | Error | Type |
/// |-------|------|
/// | Timeout, network (including TLS) | Transient |
/// | HTTP 404, 410 | Permanent |
/// | Any other HTTP status | Transient |
/// | Rejected page | Rejected |
/// | Invalid URL, size cap, session setup | Permanent |
#[must_use]
pub fn classify_error(error: &NavigationError) -> FailureType {
    match error {
        NavigationError::Timeout { .. } | NavigationError::Network { .. } => FailureType::Transient,
        NavigationError::HttpStatus { status, .. } => classify_http_status(*status),
        NavigationError::Rejected { .. } => FailureType::Rejected,
        NavigationError::Exhausted { last_error, .. } => classify_error(last_error),
        NavigationError::InvalidUrl { .. }
        | NavigationError::BodyTooLarge { .. }
        | NavigationError::Session { .. } => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        404 | 410 => FailureType::Permanent,
        _ => FailureType::Transient,
    }
}
