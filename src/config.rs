use crate::logging::LogLevel;
use crate::transport::binder::DEFAULT_RECV_BUFFER_SIZE;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Listening endpoint of the stream transport.
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Prefix every record with the serial header marker.
    #[serde(default)]
    pub serial_header: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            ip: default_ip(),
            port: default_port(),
            serial_header: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MulticastConfig {
    #[serde(default = "default_multicast_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        MulticastConfig {
            ip: default_multicast_ip(),
            port: default_port(),
        }
    }
}

/// Datagram transport: local bind plus the multicast destination.
#[derive(Debug, Deserialize, Clone)]
pub struct UdpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ip")]
    pub bind_ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub multicast: MulticastConfig,
    /// Requested SO_RCVBUF in bytes
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        UdpConfig {
            enabled: false,
            bind_ip: default_ip(),
            port: default_port(),
            multicast: MulticastConfig::default(),
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DaemonConfig {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub udp: UdpConfig,
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3490
}

/// IPv4 group; an IPv6 build sends to it v4-mapped.
fn default_multicast_ip() -> String {
    "225.0.0.37".to_string()
}

fn default_recv_buffer_size() -> usize {
    DEFAULT_RECV_BUFFER_SIZE
}

impl DaemonConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        let config: DaemonConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: DaemonConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no socket could be opened with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.ip.trim().is_empty() {
            return Err(ConfigError::Invalid("stream.ip is empty".to_string()));
        }
        if self.udp.enabled {
            if self.udp.bind_ip.trim().is_empty() {
                return Err(ConfigError::Invalid("udp.bind_ip is empty".to_string()));
            }
            if self.udp.multicast.ip.trim().is_empty() {
                return Err(ConfigError::Invalid("udp.multicast.ip is empty".to_string()));
            }
            if self.udp.recv_buffer_size == 0 {
                return Err(ConfigError::Invalid("udp.recv_buffer_size must be > 0".to_string()));
            }
        }
        Ok(())
    }
}
