//! Service configuration
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. YAML file (`--config`, or `config/tempsrv.yaml` when present)
//! 3. `TEMPSRV_` environment variables, nested keys split on `__`
//!    (e.g. `TEMPSRV_UDP__PORT=9000`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::LogConfig;
use errors::{TempUdpError, TempUdpResult};
use tempudp_protocol::{
    default_sentinels, EncodingDetector, FrameClassifier, SensorSentinel, TemperatureDecoder,
    TextEncoding,
};

pub const DEFAULT_PORT: u16 = 8889;
pub const DEFAULT_CONFIG_PATH: &str = "config/tempsrv.yaml";
pub const ENV_PREFIX: &str = "TEMPSRV_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub name: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: "tempsrv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    pub bind_address: String,
    pub port: u16,
    /// Receive buffer per datagram; longer datagrams are truncated by the OS
    pub recv_buffer_size: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            recv_buffer_size: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Silence after which an online device is marked offline
    pub offline_timeout_secs: u64,
    pub sweep_interval_ms: u64,
    /// Refresh `last_seen_at` of known devices on CRC/length failures
    pub nudge_on_corrupt: bool,
    /// Bounded command queue between receiver and tracker
    pub queue_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            offline_timeout_secs: 10,
            sweep_interval_ms: 1000,
            nudge_on_corrupt: true,
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Text decoding priority, by label
    pub encodings: Vec<String>,
    /// Hex prefixes that mark a binary heartbeat
    pub heartbeat_signatures: Vec<String>,
    pub sentinels: Vec<SensorSentinel>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            encodings: TextEncoding::DEFAULT_PRIORITY
                .iter()
                .map(|e| e.label().to_string())
                .collect(),
            heartbeat_signatures: Vec::new(),
            sentinels: default_sentinels(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Rolling log file directory; console only when unset
    pub dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSection,
    pub udp: UdpConfig,
    pub tracker: TrackerConfig,
    pub protocol: ProtocolConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from defaults, YAML and environment, then validate
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> TempUdpResult<Self> {
        let config: Self = Self::figment(path, ENV_PREFIX)?.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: Option<&Path>, env_prefix: &str) -> TempUdpResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        match path {
            Some(path) if !path.exists() => {
                return Err(errors::config_error!(
                    "config file not found: {}",
                    path.display()
                ));
            },
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                figment = figment.merge(Yaml::file(path));
            },
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    debug!("Loading configuration from {}", DEFAULT_CONFIG_PATH);
                    figment = figment.merge(Yaml::file(default_path));
                }
            },
        }

        Ok(figment.merge(Env::prefixed(env_prefix).split("__")))
    }

    pub fn validate(&self) -> TempUdpResult<()> {
        if self.udp.port == 0 {
            return Err(TempUdpError::invalid_config("udp.port", "must not be 0"));
        }
        self.validate_runtime()
    }

    /// Everything except the listen endpoint; used when the socket is bound elsewhere
    pub fn validate_runtime(&self) -> TempUdpResult<()> {
        if self.service.name.trim().is_empty() {
            return Err(TempUdpError::invalid_config("service.name", "must not be empty"));
        }
        if self.udp.recv_buffer_size == 0 {
            return Err(TempUdpError::invalid_config(
                "udp.recv_buffer_size",
                "must not be 0",
            ));
        }
        if self.tracker.offline_timeout_secs == 0 {
            return Err(TempUdpError::invalid_config(
                "tracker.offline_timeout_secs",
                "must not be 0",
            ));
        }
        if self.tracker.sweep_interval_ms == 0 {
            return Err(TempUdpError::invalid_config(
                "tracker.sweep_interval_ms",
                "must not be 0",
            ));
        }
        if self.sweep_interval() >= self.offline_timeout() {
            return Err(TempUdpError::invalid_config(
                "tracker.sweep_interval_ms",
                format!(
                    "{} ms must be shorter than the {} s offline timeout",
                    self.tracker.sweep_interval_ms, self.tracker.offline_timeout_secs
                ),
            ));
        }
        if self.tracker.queue_capacity == 0 {
            return Err(TempUdpError::invalid_config(
                "tracker.queue_capacity",
                "must not be 0",
            ));
        }

        self.encodings()?;
        self.heartbeat_signatures()?;
        Ok(())
    }

    pub fn bind_endpoint(&self) -> String {
        let host = self.udp.bind_address.trim();
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.udp.port)
        } else {
            format!("{}:{}", host, self.udp.port)
        }
    }

    pub fn offline_timeout(&self) -> Duration {
        Duration::from_secs(self.tracker.offline_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.tracker.sweep_interval_ms)
    }

    pub fn encodings(&self) -> TempUdpResult<Vec<TextEncoding>> {
        if self.protocol.encodings.is_empty() {
            return Err(TempUdpError::invalid_config(
                "protocol.encodings",
                "at least one encoding is required",
            ));
        }
        self.protocol
            .encodings
            .iter()
            .map(|label| {
                TextEncoding::from_label(label).ok_or_else(|| {
                    TempUdpError::invalid_config(
                        "protocol.encodings",
                        format!("unknown encoding '{}'", label),
                    )
                })
            })
            .collect()
    }

    pub fn heartbeat_signatures(&self) -> TempUdpResult<Vec<Vec<u8>>> {
        self.protocol
            .heartbeat_signatures
            .iter()
            .map(|sig| match common::parse_hex(sig) {
                Some(bytes) if !bytes.is_empty() => Ok(bytes),
                _ => Err(TempUdpError::invalid_config(
                    "protocol.heartbeat_signatures",
                    format!("'{}' is not a hex byte string", sig),
                )),
            })
            .collect()
    }

    pub fn classifier(&self) -> TempUdpResult<FrameClassifier> {
        Ok(FrameClassifier::new(
            self.heartbeat_signatures()?,
            EncodingDetector::new(self.encodings()?),
        ))
    }

    pub fn decoder(&self) -> TemperatureDecoder {
        TemperatureDecoder::new(self.protocol.sentinels.clone())
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            service_name: self.service.name.clone(),
            level: self.logging.level.clone(),
            log_dir: self.logging.dir.clone(),
            enable_json: self.logging.json,
            ansi: true,
        }
    }
}
