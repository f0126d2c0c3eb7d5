use crate::error::IqStreamError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Samples per second delivered by the source.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    /// Samples per source transfer.
    #[serde(default = "default_mtu")]
    pub mtu: usize,

    /// Ring buffer capacity in samples.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_sample_rate() -> f64 {
    768_000.0
}

fn default_mtu() -> usize {
    2048
}

fn default_buffer_capacity() -> usize {
    8 * 2048
}

fn default_write_timeout_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sample_rate: default_sample_rate(),
            mtu: default_mtu(),
            buffer_capacity: default_buffer_capacity(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Time the source needs to deliver one transfer.
    pub fn transfer_period(&self) -> Duration {
        Duration::from_secs_f64(self.mtu as f64 / self.sample_rate)
    }

    pub fn validate(&self) -> Result<(), IqStreamError> {
        if !(self.sample_rate.is_finite() && self.sample_rate >= 1.0) {
            return Err(IqStreamError::InvalidConfig(format!(
                "sample_rate must be at least 1, got {}",
                self.sample_rate
            )));
        }
        if self.mtu == 0 || self.mtu > self.buffer_capacity {
            return Err(IqStreamError::InvalidConfig(format!(
                "mtu must be between 1 and buffer_capacity ({}), got {}",
                self.buffer_capacity, self.mtu
            )));
        }
        Ok(())
    }
}
