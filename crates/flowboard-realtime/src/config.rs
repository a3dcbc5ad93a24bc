//! Configuration for the realtime store.

use tracing::warn;

use flowboard_core::defaults;
use flowboard_core::{Error, Result};

/// Configuration for a [`RealtimeStore`](crate::store::RealtimeStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum number of activities retained. Always at least 1.
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::STORE_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `REALTIME_STORE_CAPACITY` | `200` | Max retained activities |
    ///
    /// Invalid or zero values fall back to the default with a warning.
    pub fn from_env() -> Self {
        let capacity = match std::env::var(defaults::STORE_CAPACITY_ENV) {
            Ok(raw) => parse_capacity(&raw).unwrap_or_else(|e| {
                warn!(
                    error = %e,
                    default = defaults::STORE_CAPACITY,
                    "Ignoring invalid store capacity"
                );
                defaults::STORE_CAPACITY
            }),
            Err(_) => defaults::STORE_CAPACITY,
        };

        Self { capacity }
    }

    /// Set the retained-activity capacity (clamped to at least 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

/// Parse a capacity value, rejecting zero and non-numeric input.
pub fn parse_capacity(raw: &str) -> Result<usize> {
    let value = raw
        .trim()
        .parse::<usize>()
        .map_err(|e| Error::Config(format!("invalid capacity '{}': {}", raw, e)))?;
    if value == 0 {
        return Err(Error::Config("capacity must be at least 1".to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.capacity, defaults::STORE_CAPACITY);
    }

    #[test]
    fn test_store_config_with_capacity() {
        let config = StoreConfig::default().with_capacity(3);
        assert_eq!(config.capacity, 3);
    }

    #[test]
    fn test_store_config_with_capacity_zero_clamps() {
        let config = StoreConfig::default().with_capacity(0);
        assert_eq!(config.capacity, 1);
    }

    #[test]
    fn test_parse_capacity_valid() {
        assert_eq!(parse_capacity("50"), Ok(50));
        assert_eq!(parse_capacity(" 7 "), Ok(7));
    }

    #[test]
    fn test_parse_capacity_zero() {
        assert_eq!(
            parse_capacity("0"),
            Err(Error::Config("capacity must be at least 1".to_string()))
        );
    }

    #[test]
    fn test_parse_capacity_garbage() {
        assert!(matches!(parse_capacity("lots"), Err(Error::Config(_))));
        assert!(matches!(parse_capacity("-3"), Err(Error::Config(_))));
    }

    #[test]
    fn test_store_config_clone_and_debug() {
        let config = StoreConfig::default().with_capacity(12);
        let cloned = config.clone();
        assert_eq!(config, cloned);
        assert!(format!("{:?}", cloned).contains("capacity: 12"));
    }
}
