//! Recognized configuration keys and the read-through runtime config.
//!
//! There is no process-global config: callers hold a store handle and
//! read values through it. [`RuntimeConfig`] is a point-in-time snapshot
//! taken where a stable view is needed (worker startup, enqueue
//! defaults).

use std::time::Duration;

use crate::core::store::{JobStore, StoreError};

/// A configuration key the store recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    /// Base of the exponential retry backoff (integer >= 2).
    BackoffBase,
    /// Default retry budget for new jobs (integer >= 0).
    MaxRetries,
    /// Default job timeout in seconds (integer >= 1).
    DefaultTimeout,
    /// Worker idle poll interval in milliseconds (integer >= 1).
    PollIntervalMs,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 4] = [
        ConfigKey::BackoffBase,
        ConfigKey::MaxRetries,
        ConfigKey::DefaultTimeout,
        ConfigKey::PollIntervalMs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::BackoffBase => "backoff_base",
            ConfigKey::MaxRetries => "max_retries",
            ConfigKey::DefaultTimeout => "default_timeout",
            ConfigKey::PollIntervalMs => "poll_interval_ms",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }

    /// Value seeded at schema bootstrap.
    pub fn default_value(&self) -> &'static str {
        match self {
            ConfigKey::BackoffBase => "2",
            ConfigKey::MaxRetries => "3",
            ConfigKey::DefaultTimeout => "30",
            ConfigKey::PollIntervalMs => "500",
        }
    }

    /// Validate a candidate value for this key.
    pub fn validate(&self, value: &str) -> Result<(), StoreError> {
        let parsed: i64 = value
            .parse()
            .map_err(|_| StoreError::invalid_config(self.name(), "must be an integer"))?;
        let ok = match self {
            ConfigKey::BackoffBase => parsed >= 2,
            ConfigKey::MaxRetries => parsed >= 0,
            ConfigKey::DefaultTimeout | ConfigKey::PollIntervalMs => parsed >= 1,
        };
        if ok {
            Ok(())
        } else {
            let reason = match self {
                ConfigKey::BackoffBase => "must be an integer >= 2",
                ConfigKey::MaxRetries => "must be an integer >= 0",
                ConfigKey::DefaultTimeout => "must be an integer >= 1",
                ConfigKey::PollIntervalMs => "must be an integer >= 1",
            };
            Err(StoreError::invalid_config(self.name(), reason))
        }
    }
}

/// Snapshot of all recognized config values.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    pub backoff_base: u32,
    pub max_retries: u32,
    pub default_timeout: u32,
    pub poll_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            backoff_base: 2,
            max_retries: 3,
            default_timeout: 30,
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl RuntimeConfig {
    /// Read every recognized key through the store. Values that were
    /// never set fall back to their seeded defaults.
    pub async fn load<S>(store: &S) -> Result<Self, StoreError>
    where
        S: JobStore + ?Sized,
    {
        let mut config = RuntimeConfig::default();
        for key in ConfigKey::ALL {
            let Some(value) = store.config_get(key.name()).await? else {
                continue;
            };
            // Stored values were validated on the way in, so a parse
            // failure here means the file was edited out-of-band.
            let Ok(parsed) = value.parse::<u64>() else {
                continue;
            };
            match key {
                ConfigKey::BackoffBase => config.backoff_base = parsed as u32,
                ConfigKey::MaxRetries => config.max_retries = parsed as u32,
                ConfigKey::DefaultTimeout => config.default_timeout = parsed as u32,
                ConfigKey::PollIntervalMs => config.poll_interval = Duration::from_millis(parsed),
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for key in ConfigKey::ALL {
            assert_eq!(ConfigKey::from_name(key.name()), Some(key));
        }
        assert_eq!(ConfigKey::from_name("nope"), None);
        assert_eq!(ConfigKey::from_name("default_max_retries"), None);
    }

    #[test]
    fn backoff_base_lower_bound() {
        assert!(ConfigKey::BackoffBase.validate("2").is_ok());
        assert!(ConfigKey::BackoffBase.validate("10").is_ok());
        assert!(ConfigKey::BackoffBase.validate("1").is_err());
        assert!(ConfigKey::BackoffBase.validate("-3").is_err());
        assert!(ConfigKey::BackoffBase.validate("two").is_err());
    }

    #[test]
    fn max_retries_allows_zero() {
        assert!(ConfigKey::MaxRetries.validate("0").is_ok());
        assert!(ConfigKey::MaxRetries.validate("-1").is_err());
    }

    #[test]
    fn timeout_and_poll_need_positive() {
        assert!(ConfigKey::DefaultTimeout.validate("1").is_ok());
        assert!(ConfigKey::DefaultTimeout.validate("0").is_err());
        assert!(ConfigKey::PollIntervalMs.validate("250").is_ok());
        assert!(ConfigKey::PollIntervalMs.validate("0").is_err());
    }

    #[test]
    fn defaults_pass_their_own_validation() {
        for key in ConfigKey::ALL {
            assert!(key.validate(key.default_value()).is_ok(), "{}", key.name());
        }
    }
}
