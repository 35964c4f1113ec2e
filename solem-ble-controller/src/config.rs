//! Session tuning: connect retries and notification draining

use std::time::Duration;

use crate::transport::AddressType;

/// Whether another connect attempt is allowed.
pub fn should_retry(attempts_left: u32) -> bool {
    attempts_left > 0
}

/// Bounded connect retries with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connect attempts, at least one is always made
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    pub fn budget(&self) -> u32 {
        self.attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            backoff: Duration::from_secs(3),
        }
    }
}

/// Fixed-budget notification poll run after every write of a command.
///
/// The device needs a pause between staging and committing a command; the
/// drain provides it while servicing whatever status frames arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainPolicy {
    pub polls: u32,
    pub timeout: Duration,
}

impl DrainPolicy {
    /// Upper bound on the time one drain can take.
    pub fn max_wait(&self) -> Duration {
        self.timeout * self.polls
    }
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self {
            polls: 3,
            timeout: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub address_type: AddressType,
    pub retry: RetryPolicy,
    pub drain: DrainPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_stops_when_budget_is_spent() {
        assert!(should_retry(2));
        assert!(should_retry(1));
        assert!(!should_retry(0));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).budget(), 1);
        assert_eq!(RetryPolicy::new(3, Duration::ZERO).budget(), 3);
    }

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.address_type, AddressType::Random);
        assert_eq!(config.retry.budget(), 10);
        assert_eq!(config.retry.backoff, Duration::from_secs(3));
        assert_eq!(config.drain.max_wait(), Duration::from_millis(1500));
    }
}
