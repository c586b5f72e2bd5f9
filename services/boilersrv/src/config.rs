//! Service configuration
//!
//! Layered with Figment: the config file (format picked by extension) is
//! merged with `BOILERSRV_*` environment variables, nested keys split on
//! `__` (e.g. `BOILERSRV_DEVICE__HOST=10.0.0.7`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use econet_protocol::{Credentials, DriverConfig, ExponentConvention, TcpTransportConfig};
use errors::{config_error, invalid_config, EconetResult};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coordinator::CoordinatorConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/boilersrv.yaml";
pub const ENV_PREFIX: &str = "BOILERSRV_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub params: ParamsConfig,

    #[serde(default)]
    pub coordinator: CoordinatorSettings,

    /// Parameters the poll loop is interested in
    #[serde(default)]
    pub slugs: Vec<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Directory of the loaded config file, for relative paths
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// Boiler bridge endpoint and login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    #[serde(default = "default_dest_address")]
    pub dest_address: u16,

    #[serde(default = "default_source_address")]
    pub source_address: u16,

    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            user: default_user(),
            password: default_password(),
            dest_address: default_dest_address(),
            source_address: default_source_address(),
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Parameter map location and scaling convention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsConfig {
    #[serde(default = "default_map_file")]
    pub map_file: String,

    #[serde(default)]
    pub exponent_convention: ExponentConvention,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            map_file: default_map_file(),
            exponent_convention: ExponentConvention::default(),
        }
    }
}

/// Poll loop and cache timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorSettings {
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_discovery_retries")]
    pub discovery_retries: u32,

    #[serde(default = "default_refresh_retries")]
    pub refresh_retries: u32,

    #[serde(default = "default_write_repeats")]
    pub write_repeats: u32,

    #[serde(default = "default_write_gap_ms")]
    pub write_gap_ms: u64,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval_secs(),
            ttl_secs: default_ttl_secs(),
            discovery_retries: default_discovery_retries(),
            refresh_retries: default_refresh_retries(),
            write_repeats: default_write_repeats(),
            write_gap_ms: default_write_gap_ms(),
        }
    }
}

impl CoordinatorSettings {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log root directory (overridden by ECONET_LOG_DIR)
    pub dir: Option<String>,

    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_port() -> u16 {
    econet_protocol::constants::DEFAULT_PORT
}

fn default_user() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "0000".to_string()
}

fn default_dest_address() -> u16 {
    econet_protocol::constants::DEFAULT_DEST_ADDRESS
}

fn default_source_address() -> u16 {
    econet_protocol::constants::DEFAULT_SOURCE_ADDRESS
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_map_file() -> String {
    "device_map.json".to_string()
}

fn default_update_interval_secs() -> u64 {
    30
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_discovery_retries() -> u32 {
    5
}

fn default_refresh_retries() -> u32 {
    2
}

fn default_write_repeats() -> u32 {
    5
}

fn default_write_gap_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load from `path` merged with the environment, then validate
    pub fn load(path: impl AsRef<Path>) -> EconetResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| config_error!("Invalid file extension: {}", path.display()))?;

        let figment = match extension {
            "json" => Figment::new().merge(Json::file(path)),
            "toml" => Figment::new().merge(Toml::file(path)),
            "yaml" | "yml" => Figment::new().merge(Yaml::file(path)),
            _ => return Err(config_error!("Unsupported config format: {}", extension)),
        };

        let mut config = Self::from_figment(figment)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Extract from an already assembled figment plus the environment
    pub fn from_figment(figment: Figment) -> EconetResult<Self> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EconetResult<()> {
        if self.device.host.trim().is_empty() {
            return Err(invalid_config!("device.host", "must not be empty"));
        }
        if self.device.port == 0 {
            return Err(invalid_config!("device.port", "must be non-zero"));
        }
        if self.device.read_timeout_ms == 0 || self.device.write_timeout_ms == 0 {
            return Err(invalid_config!("device", "timeouts must be non-zero"));
        }
        if self.coordinator.update_interval_secs == 0 {
            return Err(invalid_config!(
                "coordinator.update_interval_secs",
                "must be greater than zero"
            ));
        }
        if self.params.map_file.trim().is_empty() {
            return Err(invalid_config!("params.map_file", "must not be empty"));
        }
        Ok(())
    }

    /// Parameter map path, relative paths resolved against the config directory
    pub fn map_path(&self) -> PathBuf {
        let file = Path::new(&self.params.map_file);
        match &self.base_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file.to_path_buf(),
        }
    }

    pub fn transport_config(&self) -> TcpTransportConfig {
        TcpTransportConfig::new(self.device.host.clone(), self.device.port)
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            dest_address: self.device.dest_address,
            source_address: self.device.source_address,
            read_timeout: Duration::from_millis(self.device.read_timeout_ms),
            write_timeout: Duration::from_millis(self.device.write_timeout_ms),
            exponent_convention: self.params.exponent_convention,
            credentials: Credentials {
                user: self.device.user.clone(),
                password: self.device.password.clone(),
            },
            ..DriverConfig::default()
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let c = &self.coordinator;
        CoordinatorConfig {
            ttl: Duration::from_secs(c.ttl_secs),
            discovery_retries: c.discovery_retries,
            refresh_retries: c.refresh_retries,
            write_repeats: c.write_repeats,
            write_gap: Duration::from_millis(c.write_gap_ms),
        }
    }
}
