// SPDX-License-Identifier: Apache-2.0

use crate::exporters::forwarder::ForwarderConfig;
use crate::init::parse::{self, Limit};
use clap::Args;
use std::time::Duration;

/// Forwarder tunables. Limits accept `-1` to remove the bound, or to disable
/// the eager and periodic drains.
#[derive(Debug, Args, Clone, Default)]
pub struct ForwarderArgs {
    /// Maximum queued results (default: 5000)
    #[arg(long, env = "LOGMON_QUEUE_CAPACITY", allow_hyphen_values = true, value_parser = parse::parse_count)]
    pub forwarder_queue_capacity: Option<Limit<usize>>,

    /// Maximum results per transport call (default: 100)
    #[arg(long, env = "LOGMON_MAX_BATCH_SIZE", allow_hyphen_values = true, value_parser = parse::parse_count)]
    pub forwarder_max_batch_size: Option<Limit<usize>>,

    /// Failed attempts before a batch is dropped (default: 900)
    #[arg(long, env = "LOGMON_MAX_TRIES", allow_hyphen_values = true, value_parser = parse::parse_tries)]
    pub forwarder_max_tries: Option<Limit<u32>>,

    /// Queue length multiple that triggers an eager drain (default: 15)
    #[arg(long, env = "LOGMON_EAGER_DRAIN_EVERY", allow_hyphen_values = true, value_parser = parse::parse_count)]
    pub forwarder_eager_drain_every: Option<Limit<usize>>,

    /// Delay between periodic drains (default: 1s)
    #[arg(long, env = "LOGMON_DRAIN_INTERVAL", allow_hyphen_values = true, value_parser = parse::parse_interval)]
    pub forwarder_drain_interval: Option<Limit<Duration>>,

    /// Time allowed for the final drain on shutdown (default: 3s)
    #[arg(long, env = "LOGMON_SHUTDOWN_FLUSH_TIMEOUT", value_parser = parse::parse_duration)]
    pub forwarder_shutdown_flush_timeout: Option<Duration>,
}

impl ForwarderArgs {
    pub fn build_config(&self) -> ForwarderConfig {
        let mut config = ForwarderConfig::default();

        if let Some(limit) = self.forwarder_queue_capacity {
            config = config.with_queue_capacity(limit.into_option());
        }
        if let Some(limit) = self.forwarder_max_batch_size {
            config = config.with_max_batch_size(limit.into_option());
        }
        if let Some(limit) = self.forwarder_max_tries {
            config = config.with_max_tries(limit.into_option());
        }
        if let Some(limit) = self.forwarder_eager_drain_every {
            config = config.with_eager_drain_every(limit.into_option());
        }
        if let Some(limit) = self.forwarder_drain_interval {
            config = config.with_drain_interval(limit.into_option());
        }
        if let Some(timeout) = self.forwarder_shutdown_flush_timeout {
            config.shutdown_flush_timeout = timeout;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(
            ForwarderArgs::default().build_config(),
            ForwarderConfig::default()
        );
    }

    #[test]
    fn test_unbounded_sentinels() {
        let args = ForwarderArgs {
            forwarder_queue_capacity: Some(Limit::Unbounded),
            forwarder_max_tries: Some(Limit::Unbounded),
            forwarder_drain_interval: Some(Limit::Unbounded),
            forwarder_max_batch_size: Some(Limit::Bounded(10)),
            ..Default::default()
        };
        let config = args.build_config();
        assert_eq!(config.queue_capacity, None);
        assert_eq!(config.max_tries, None);
        assert_eq!(config.drain_interval, None);
        assert_eq!(config.max_batch_size, Some(10));
        assert_eq!(config.eager_drain_every, Some(15));
    }
}
