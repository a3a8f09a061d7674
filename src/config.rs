//! Pool configuration options

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the idle side of a pool
///
/// # Examples
///
/// ```
/// use idle_pool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_idle_size(3)
///     .with_max_idle_time(Duration::from_secs(1));
///
/// assert_eq!(config.max_idle_size, 3);
/// assert_eq!(config.max_idle_time, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfiguration {
    /// Maximum number of idle resources kept by the pool
    pub max_idle_size: usize,

    /// How long a released resource may stay idle before it is evicted.
    /// Zero means released resources are never kept.
    pub max_idle_time: Duration,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_idle_size: 100,
            max_idle_time: Duration::from_secs(90),
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the idle capacity
    pub fn with_max_idle_size(mut self, size: usize) -> Self {
        self.max_idle_size = size;
        self
    }

    /// Set the idle time-to-live
    pub fn with_max_idle_time(mut self, ttl: Duration) -> Self {
        self.max_idle_time = ttl;
        self
    }

    /// Whether released resources can be retained at all
    pub(crate) fn retains_idle(&self) -> bool {
        self.max_idle_size > 0 && !self.max_idle_time.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::default();
        assert_eq!(config.max_idle_size, 100);
        assert_eq!(config.max_idle_time, Duration::from_secs(90));
        assert!(config.retains_idle());
    }

    #[test]
    fn test_zero_ttl_or_size_retains_nothing() {
        let config = PoolConfiguration::new().with_max_idle_time(Duration::ZERO);
        assert!(!config.retains_idle());

        let config = PoolConfiguration::new().with_max_idle_size(0);
        assert!(!config.retains_idle());
    }
}
