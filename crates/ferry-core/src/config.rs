//! Store configuration.

use std::time::Duration;

use chrono::TimeDelta;

use crate::domain::{ConfigError, FileFormat};

pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Largest file a chat bot is allowed to fetch, which is where uploads come from.
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long an entry stays live after it is registered.
    pub ttl: Duration,
    /// Period of the background sweep.
    pub sweep_interval: Duration,
    pub format: FileFormat,
    pub max_payload_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            format: FileFormat::default(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::Zero("ttl"));
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Zero("sweep interval"));
        }
        if self.max_payload_bytes == 0 {
            return Err(ConfigError::Zero("max payload bytes"));
        }
        Ok(())
    }

    pub(crate) fn ttl_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX)
    }
}
