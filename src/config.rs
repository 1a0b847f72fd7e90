//! Engine configuration.
//!
//! `EngineConfig` sizes the buffer pool, names the marker headers recognised
//! on subscription requests and bounds how long an unclaimed correlation may
//! hold its staged headers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::header::{INJECTED_HEADER_NAME, POLL_HEADER_NAME};

const DEFAULT_SLOT_COUNT: usize = 128;
const DEFAULT_SLOT_CAPACITY: usize = 8 * 1024;
const DEFAULT_CORRELATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors returned by [`EngineConfig::validate`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The buffer pool would have no slots.
    #[error("slab slot count must be >= 1")]
    ZeroSlotCount,
    /// Each slot would have no room for staged headers.
    #[error("slab slot capacity must be >= 1 byte")]
    ZeroSlotCapacity,
    /// A marker header name was empty.
    #[error("{0} header name must not be empty")]
    EmptyHeaderName(&'static str),
}

/// Configuration for an [`Engine`](crate::Engine).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use http_push::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_slab(16, 1024)
///     .with_correlation_timeout(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// assert_eq!(config.poll_header, "x-retry-after");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of slots in the header staging pool.
    pub slab_slot_count: usize,
    /// Size in bytes of each staging slot.
    pub slab_slot_capacity: usize,
    /// Header marking a request whose cache directives were injected upstream.
    pub injected_header: String,
    /// Header carrying the poll interval, in seconds, of a subscription.
    pub poll_header: String,
    /// How long a correlation waits for its reply before its slot is reclaimed.
    pub correlation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slab_slot_count: DEFAULT_SLOT_COUNT,
            slab_slot_capacity: DEFAULT_SLOT_CAPACITY,
            injected_header: INJECTED_HEADER_NAME.to_owned(),
            poll_header: POLL_HEADER_NAME.to_owned(),
            correlation_timeout: DEFAULT_CORRELATION_TIMEOUT,
        }
    }
}

impl EngineConfig {
    /// Set the slot count and per-slot capacity of the staging pool.
    #[must_use]
    pub fn with_slab(mut self, slot_count: usize, slot_capacity: usize) -> Self {
        self.slab_slot_count = slot_count;
        self.slab_slot_capacity = slot_capacity;
        self
    }

    /// Override the injection marker header name.
    #[must_use]
    pub fn with_injected_header(mut self, name: impl Into<String>) -> Self {
        self.injected_header = name.into();
        self
    }

    /// Override the poll interval header name.
    #[must_use]
    pub fn with_poll_header(mut self, name: impl Into<String>) -> Self {
        self.poll_header = name.into();
        self
    }

    /// Override how long an unclaimed correlation is retained.
    #[must_use]
    pub fn with_correlation_timeout(mut self, timeout: Duration) -> Self {
        self.correlation_timeout = timeout;
        self
    }

    /// Correlation timeout in whole milliseconds, saturating at `u64::MAX`.
    #[must_use]
    pub fn correlation_timeout_millis(&self) -> u64 {
        u64::try_from(self.correlation_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Check the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slab_slot_count == 0 {
            return Err(ConfigError::ZeroSlotCount);
        }
        if self.slab_slot_capacity == 0 {
            return Err(ConfigError::ZeroSlotCapacity);
        }
        if self.injected_header.is_empty() {
            return Err(ConfigError::EmptyHeaderName("injection marker"));
        }
        if self.poll_header.is_empty() {
            return Err(ConfigError::EmptyHeaderName("poll interval"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.injected_header, "x-poll-injected");
        assert_eq!(config.correlation_timeout_millis(), 60_000);
    }

    #[rstest]
    #[case::no_slots(EngineConfig::default().with_slab(0, 64), ConfigError::ZeroSlotCount)]
    #[case::no_capacity(EngineConfig::default().with_slab(4, 0), ConfigError::ZeroSlotCapacity)]
    #[case::no_marker(
        EngineConfig::default().with_injected_header(""),
        ConfigError::EmptyHeaderName("injection marker")
    )]
    #[case::no_poll(
        EngineConfig::default().with_poll_header(""),
        ConfigError::EmptyHeaderName("poll interval")
    )]
    fn validate_rejects_unusable_values(#[case] config: EngineConfig, #[case] expected: ConfigError) {
        assert_eq!(config.validate(), Err(expected));
    }
}
