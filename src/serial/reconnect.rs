use crate::config::SerialConfig;
use std::time::{Duration, Instant};

/// Decides when the next reconnect attempt is due
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_interval: Duration,
    max_interval: Duration,
    exponential_backoff: bool,
    consecutive_failures: u32,
}

impl ReconnectPolicy {
    pub fn new(base_interval: Duration, max_interval: Duration, exponential_backoff: bool) -> Self {
        Self {
            base_interval,
            max_interval: max_interval.max(base_interval),
            exponential_backoff,
            consecutive_failures: 0,
        }
    }

    pub fn from_config(config: &SerialConfig) -> Self {
        Self::new(
            config.reconnect_interval(),
            config.max_reconnect_interval(),
            config.reconnect_backoff,
        )
    }

    /// Interval that must be exceeded before the next attempt
    pub fn current_interval(&self) -> Duration {
        if !self.exponential_backoff || self.consecutive_failures <= 1 {
            return self.base_interval;
        }

        let exponent = (self.consecutive_failures - 1).min(16);
        self.base_interval
            .checked_mul(2_u32.pow(exponent))
            .map_or(self.max_interval, |delay| delay.min(self.max_interval))
    }

    pub fn is_due(&self, last_attempt: Option<Instant>, now: Instant) -> bool {
        match last_attempt {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.current_interval(),
        }
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_interval() {
        let mut policy =
            ReconnectPolicy::new(Duration::from_secs(5), Duration::from_secs(60), false);
        for _ in 0..10 {
            policy.record_failure();
        }
        assert_eq!(policy.current_interval(), Duration::from_secs(5));

        let start = Instant::now();
        assert!(policy.is_due(None, start));
        assert!(!policy.is_due(Some(start), start + Duration::from_secs(5)));
        assert!(policy.is_due(Some(start), start + Duration::from_millis(5001)));
    }

    #[test]
    fn test_exponential_backoff_caps_and_resets() {
        let mut policy =
            ReconnectPolicy::new(Duration::from_secs(5), Duration::from_secs(60), true);
        let mut intervals = Vec::new();
        for _ in 0..6 {
            policy.record_failure();
            intervals.push(policy.current_interval().as_secs());
        }
        assert_eq!(intervals, vec![5, 10, 20, 40, 60, 60]);

        policy.record_success();
        assert_eq!(policy.consecutive_failures(), 0);
        assert_eq!(policy.current_interval(), Duration::from_secs(5));
    }
}
