//! Cache configuration options

use std::time::Duration;

/// Configuration for the result cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied by `put_default` and by requests that do not pick their own
    pub default_ttl: Duration,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(30),
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Create an enabled configuration with the given default TTL
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            default_ttl: Duration::from_secs(ttl_secs),
            enabled: true,
        }
    }

    /// Create a disabled cache configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the default TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enable or disable the cache
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl, Duration::from_secs(30));
        assert!(config.enabled);
    }

    #[test]
    fn test_disabled_config() {
        let config = CacheConfig::disabled();
        assert!(!config.enabled);
    }

    #[test]
    fn test_builder_pattern() {
        let config = CacheConfig::new(10)
            .with_ttl(Duration::from_secs(60))
            .with_enabled(false);

        assert_eq!(config.default_ttl, Duration::from_secs(60));
        assert!(!config.enabled);
    }
}
