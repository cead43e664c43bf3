//! Fixed inter-request pacing for a single crawl session.
//!
//! A session issues one request at a time; the [`RequestPacer`] makes sure
//! consecutive requests are at least `delay` apart so portals with
//! anti-automation defenses see a steady, human-scale request rate.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Maximum Retry-After value (1 hour) to prevent excessive delays.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Enforces a minimum gap between consecutive requests.
#[derive(Debug)]
pub struct RequestPacer {
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    /// Creates a pacer with the given minimum gap.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: Mutex::new(None),
        }
    }

    /// Creates a pacer that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns the configured gap.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits until the next request may be sent, then records it.
    ///
    /// The lock is held across the sleep so concurrent callers queue up
    /// instead of all waking at the same instant.
    pub async fn wait_turn(&self) {
        if self.delay.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                trace!(wait_ms = wait.as_millis(), "pacing request");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Parses a Retry-After header value into a duration.
///
/// Accepts delta-seconds or an HTTP-date; values beyond one hour are capped,
/// negative values and past dates are ignored.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }
        let duration = Duration::from_secs(seconds.unsigned_abs());
        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        return match datetime.duration_since(std::time::SystemTime::now()) {
            Ok(duration) => Some(duration.min(MAX_RETRY_AFTER)),
            Err(_) => {
                debug!(header_value, "Retry-After date is in the past, ignoring");
                None
            }
        };
    }

    debug!(header_value, "unparseable Retry-After value, ignoring");
    None
}
