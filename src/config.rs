//! Configuration for the PravahaIO daemon
//!
//! Loads configuration from a TOML file with the parameters the reader
//! needs: where the sensor lives, how its stream is framed, and how the
//! daemon logs.

use crate::error::{Error, Result};
use crate::frame::BYTES_PER_CHANNEL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub logging: LoggingConfig,
}

/// Sensor stream configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorConfig {
    /// Serial port the IMU is attached to (e.g., "/dev/ttyUSB0")
    pub port: String,

    /// Baud rate the sensor firmware is configured for
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// 4-byte float channels per frame (9, or 12 with yaw/pitch/roll)
    #[serde(default = "default_channel_count")]
    pub channel_count: usize,

    /// Marker bytes preceding every frame
    #[serde(default = "default_marker")]
    pub marker: Vec<u8>,

    /// Bytes written once on open to switch the sensor into binary
    /// streaming (firmware-specific; omit for sensors that stream
    /// unconditionally)
    #[serde(default)]
    pub stream_request: Option<Vec<u8>>,

    /// Read attempts allowed for the initial marker scan; defaults to
    /// two frames' worth of bytes
    #[serde(default)]
    pub sync_byte_budget: Option<usize>,

    /// Serial read timeout in milliseconds; bounds how quickly a stop
    /// request is noticed
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

fn default_baud_rate() -> u32 {
    57_600
}

fn default_channel_count() -> usize {
    crate::frame::CHANNELS_BASE
}

fn default_marker() -> Vec<u8> {
    vec![0x7F, 0x80, 0x00, 0x00]
}

fn default_read_timeout_ms() -> u64 {
    50
}

impl SensorConfig {
    /// Default configuration for a 9-DOF Razor-class IMU on USB serial
    pub fn razor_defaults() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: default_baud_rate(),
            channel_count: default_channel_count(),
            marker: default_marker(),
            stream_request: None,
            sync_byte_budget: None,
            read_timeout_ms: default_read_timeout_ms(),
        }
    }

    /// Wire size of one marker-delimited transmission
    pub fn frame_size(&self) -> usize {
        self.marker.len() + self.channel_count * BYTES_PER_CHANNEL
    }

    /// Effective initial-scan budget in read attempts
    pub fn sync_budget(&self) -> usize {
        self.sync_byte_budget.unwrap_or(2 * self.frame_size())
    }

    /// Reject configurations the reader cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.marker.is_empty() {
            return Err(Error::Config("marker must not be empty".to_string()));
        }
        if self.channel_count == 0 {
            return Err(Error::Config("channel_count must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.sensor.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sensor: SensorConfig::razor_defaults(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
