use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Retention settings for the event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Number of most recent events kept in memory.
    pub capacity: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

/// Timeouts applied to long-poll requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Timeout used when the caller does not ask for one.
    pub default_timeout_ms: u64,
    /// Hard upper bound on any single wait. Requests asking for more are
    /// clamped, which keeps the waiter registry bounded by live traffic.
    pub max_timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            max_timeout_ms: 60_000,
        }
    }
}

impl PollConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }

    /// Clamp a requested timeout to the configured maximum.
    pub fn clamp(&self, requested: Duration) -> Duration {
        requested.min(self.max_timeout())
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.max_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "poll.max_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.default_timeout_ms > self.max_timeout_ms {
            return Err(CoreError::InvalidConfig(format!(
                "poll.default_timeout_ms ({}) exceeds poll.max_timeout_ms ({})",
                self.default_timeout_ms, self.max_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Settings for the background notification producer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub enabled: bool,
    /// Shortest pause between two synthetic events.
    pub min_interval_ms: u64,
    /// Longest pause between two synthetic events.
    pub max_interval_ms: u64,
    /// Fixed RNG seed, for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_ms: 10_000,
            max_interval_ms: 30_000,
            seed: None,
        }
    }
}

impl ProducerConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.min_interval_ms > self.max_interval_ms {
            return Err(CoreError::InvalidProducerInterval {
                min_ms: self.min_interval_ms,
                max_ms: self.max_interval_ms,
            });
        }
        Ok(())
    }
}
