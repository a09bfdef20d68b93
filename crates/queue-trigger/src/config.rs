//! Queue trigger options and how they are loaded.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. an optional configuration file (format picked from its extension)
//! 3. environment variables prefixed `QT__`, e.g. `QT__MAX_DEQUEUE_COUNT=10`

use crate::error::ConfigurationError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_PREFIX: &str = "QT";

/// Longest visibility window the queue service accepts (7 days)
pub const MAX_VISIBILITY_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Polling, lease and poison settings for queue listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuesOptions {
    /// Deliveries allowed before a message is moved to the poison queue
    pub max_dequeue_count: u32,

    /// Delay before a failed message becomes visible again
    pub visibility_timeout_secs: u64,

    /// Lease taken on a message while its function runs
    pub lease_timeout_secs: u64,

    /// Polling delay right after the queue was found empty
    pub min_polling_interval_ms: u64,

    /// Upper bound for the polling backoff
    pub max_polling_interval_ms: u64,

    /// Appended to a queue name to form its poison queue name
    pub poison_queue_suffix: String,
}

impl Default for QueuesOptions {
    fn default() -> Self {
        Self {
            max_dequeue_count: 5,
            visibility_timeout_secs: 0,
            lease_timeout_secs: 600,
            min_polling_interval_ms: 100,
            max_polling_interval_ms: 60_000,
            poison_queue_suffix: "-poison".to_string(),
        }
    }
}

impl QueuesOptions {
    /// Load options from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        let options: Self = settings
            .try_deserialize()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        options.validate()?;
        Ok(options)
    }

    /// Reject settings that would stall or spin the listener
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_dequeue_count == 0 {
            return Err(ConfigurationError::Invalid {
                message: "max_dequeue_count must be at least 1".to_string(),
            });
        }

        if self.lease_timeout_secs == 0 || self.lease_timeout_secs > MAX_VISIBILITY_TIMEOUT_SECS {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "lease_timeout_secs must be between 1 and {}, got {}",
                    MAX_VISIBILITY_TIMEOUT_SECS, self.lease_timeout_secs
                ),
            });
        }

        if self.visibility_timeout_secs > MAX_VISIBILITY_TIMEOUT_SECS {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "visibility_timeout_secs must be at most {}, got {}",
                    MAX_VISIBILITY_TIMEOUT_SECS, self.visibility_timeout_secs
                ),
            });
        }

        if self.min_polling_interval_ms == 0 {
            return Err(ConfigurationError::Invalid {
                message: "min_polling_interval_ms must be greater than 0".to_string(),
            });
        }

        if self.min_polling_interval_ms > self.max_polling_interval_ms {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "min_polling_interval_ms ({}) exceeds max_polling_interval_ms ({})",
                    self.min_polling_interval_ms, self.max_polling_interval_ms
                ),
            });
        }

        if self.poison_queue_suffix.is_empty() {
            return Err(ConfigurationError::Invalid {
                message: "poison_queue_suffix must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Release delay, capped at the service's visibility limit
    pub fn visibility_timeout(&self) -> Duration {
        capped_seconds(self.visibility_timeout_secs)
    }

    /// Lease length, capped at the service's visibility limit
    pub fn lease_timeout(&self) -> Duration {
        capped_seconds(self.lease_timeout_secs)
    }

    pub fn min_polling_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.min_polling_interval_ms)
    }

    pub fn max_polling_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.max_polling_interval_ms)
    }
}

fn capped_seconds(secs: u64) -> Duration {
    let max = Duration::days(7);
    i64::try_from(secs.min(MAX_VISIBILITY_TIMEOUT_SECS))
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(max)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
