//! Retry policy for tutor API calls

use std::time::Duration;

use super::Action;
use crate::Error;

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

/// Default delay between attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1500);

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),
    /// Delay doubles each attempt, capped at `max`
    Exponential {
        /// Delay before the first retry
        base: Duration,
        /// Maximum delay cap
        max: Duration,
    },
}

impl Backoff {
    /// Delay before retry number `attempt` (zero-based)
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(d) => d,
            Self::Exponential { base, max } => base
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(max),
        }
    }
}

/// Retry policy for tutor API calls
///
/// Controls the per-attempt timeout, how many times a failed request is
/// retried and how long to wait between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first
    pub max_retries: u32,
    /// Hard timeout for a single attempt
    pub timeout: Duration,
    /// Delay schedule between attempts
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            backoff: Backoff::Fixed(DEFAULT_BACKOFF),
        }
    }
}

impl RetryPolicy {
    /// Policy for an action, derived from this base policy
    ///
    /// Text-to-speech sits on an interactive path, so it gets a single retry.
    #[must_use]
    pub fn for_action(&self, action: Action) -> Self {
        match action {
            Action::TextToSpeech => self.clone().with_retries(self.max_retries.min(1)),
            _ => self.clone(),
        }
    }

    /// Same policy with a different retry budget
    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Whether a failed attempt is worth retrying
    #[must_use]
    pub fn should_retry(&self, error: &Error) -> bool {
        self.max_retries > 0 && error.is_retryable()
    }
}

/// Determine whether an HTTP status indicates a transient failure
///
/// Rate limits (429) and server errors (5xx) are retried.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_on_rate_limit() {
        assert!(is_retryable_status(429));
    }

    #[test]
    fn retryable_on_server_errors() {
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(599));
    }

    #[test]
    fn not_retryable_on_client_errors() {
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(600));
    }

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.timeout, Duration::from_secs(25));
        assert_eq!(policy.backoff, Backoff::Fixed(Duration::from_millis(1500)));
    }

    #[test]
    fn tts_gets_single_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.for_action(Action::TextToSpeech).max_retries, 1);
        assert_eq!(policy.for_action(Action::Translate).max_retries, 2);

        let none = RetryPolicy::default().with_retries(0);
        assert_eq!(none.for_action(Action::TextToSpeech).max_retries, 0);
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed(Duration::from_millis(1500));
        assert_eq!(backoff.delay(0), backoff.delay(5));
    }

    #[test]
    fn exponential_growth_is_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_millis(500),
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(500));
    }

    #[test]
    fn classifies_errors() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(&Error::Timeout));
        assert!(policy.should_retry(&Error::Network("reset".to_string())));
        assert!(policy.should_retry(&Error::Server {
            status: 502,
            message: String::new()
        }));
        assert!(!policy.should_retry(&Error::Server {
            status: 400,
            message: String::new()
        }));
        assert!(!policy.should_retry(&Error::Parse("bad".to_string())));
    }
}
