// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Default maximum number of queued items
pub const DEFAULT_QUEUE_CAPACITY: usize = 5000;

/// Default maximum number of items per transport call
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Default number of failed attempts before a batch is dropped
pub const DEFAULT_MAX_TRIES: u32 = 900;

/// Default queue-length multiple that triggers an eager drain
pub const DEFAULT_EAGER_DRAIN_EVERY: usize = 15;

/// Default delay between periodic drains (milliseconds)
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 1000;

/// Default time allowed for the final drain on shutdown (milliseconds)
pub const DEFAULT_SHUTDOWN_FLUSH_TIMEOUT_MS: u64 = 3000;

/// Configuration for the result forwarder. `None` means unbounded, or
/// disabled for the eager and periodic drain triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwarderConfig {
    pub queue_capacity: Option<usize>,
    pub max_batch_size: Option<usize>,
    pub max_tries: Option<u32>,
    pub eager_drain_every: Option<usize>,
    pub drain_interval: Option<Duration>,
    pub shutdown_flush_timeout: Duration,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: Some(DEFAULT_QUEUE_CAPACITY),
            max_batch_size: Some(DEFAULT_MAX_BATCH_SIZE),
            max_tries: Some(DEFAULT_MAX_TRIES),
            eager_drain_every: Some(DEFAULT_EAGER_DRAIN_EVERY),
            drain_interval: Some(Duration::from_millis(DEFAULT_DRAIN_INTERVAL_MS)),
            shutdown_flush_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_FLUSH_TIMEOUT_MS),
        }
    }
}

impl ForwarderConfig {
    pub fn with_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_max_batch_size(mut self, size: Option<usize>) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_max_tries(mut self, tries: Option<u32>) -> Self {
        self.max_tries = tries;
        self
    }

    pub fn with_eager_drain_every(mut self, every: Option<usize>) -> Self {
        self.eager_drain_every = every;
        self
    }

    pub fn with_drain_interval(mut self, interval: Option<Duration>) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == Some(0) {
            return Err("Queue capacity must be at least 1 or unbounded".to_string());
        }
        if self.max_batch_size == Some(0) {
            return Err("Max batch size must be at least 1 or unbounded".to_string());
        }
        if self.max_tries == Some(0) {
            return Err("Max tries must be at least 1 or unbounded".to_string());
        }
        if self.eager_drain_every == Some(0) {
            return Err("Eager drain size must be at least 1 or disabled".to_string());
        }
        if let Some(interval) = self.drain_interval {
            if interval.is_zero() {
                return Err("Drain interval must be positive or disabled".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ForwarderConfig::default();
        assert_eq!(config.queue_capacity, Some(5000));
        assert_eq!(config.max_batch_size, Some(100));
        assert_eq!(config.max_tries, Some(900));
        assert_eq!(config.eager_drain_every, Some(15));
        assert_eq!(config.drain_interval, Some(Duration::from_secs(1)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unbounded_is_valid() {
        let config = ForwarderConfig::default()
            .with_queue_capacity(None)
            .with_max_batch_size(None)
            .with_max_tries(None)
            .with_eager_drain_every(None)
            .with_drain_interval(None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = ForwarderConfig::default().with_queue_capacity(Some(0));
        assert_eq!(
            config.validate(),
            Err("Queue capacity must be at least 1 or unbounded".to_string())
        );
        assert!(
            ForwarderConfig::default()
                .with_max_tries(Some(0))
                .validate()
                .is_err()
        );
        assert!(
            ForwarderConfig::default()
                .with_drain_interval(Some(Duration::ZERO))
                .validate()
                .is_err()
        );
    }
}
