//! Fixed-delay retry schedule for connecting to the relay

use std::time::Duration;

use sr_core::config::ClientConfig;

/// Bounded number of attempts with a constant delay between them
#[derive(Debug, Clone)]
pub struct FixedRetry {
    /// Retries left after the current attempt
    remaining: u32,
    delay: Duration,
}

impl FixedRetry {
    /// Create a schedule allowing `attempts` total attempts
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            remaining: attempts.max(1) - 1,
            delay,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.reconnect_attempts, config.reconnect_delay)
    }

    /// Delay before the next attempt, or `None` once attempts are used up
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_attempts_two_delays() {
        let mut retry = FixedRetry::new(3, Duration::from_millis(100));
        assert_eq!(retry.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(retry.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(retry.next_delay(), None);
        assert_eq!(retry.next_delay(), None);
    }

    #[test]
    fn test_single_attempt_never_waits() {
        let mut retry = FixedRetry::new(1, Duration::from_secs(5));
        assert_eq!(retry.next_delay(), None);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let mut retry = FixedRetry::new(0, Duration::from_secs(5));
        assert_eq!(retry.next_delay(), None);
    }
}
