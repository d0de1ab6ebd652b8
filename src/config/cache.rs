//! In-process cache configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Settings for the in-process cache backend
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Seconds between expired-entry sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sweep_is_five_minutes() {
        assert_eq!(CacheConfig::default().sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = CacheConfig {
            sweep_interval_secs: 0,
        };
        assert!(config.validate().is_err());
    }
}
