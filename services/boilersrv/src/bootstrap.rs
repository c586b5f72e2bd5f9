//! Command line, logging and device wiring

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use common::service_bootstrap::{LoggingOptions, ServiceInfo};
use econet_protocol::{EconetDevice, ParameterMap};
use errors::{EconetError, EconetResult};
use tracing::info;

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};

/// Command-line arguments for boilersrv
#[derive(Parser, Debug, Clone)]
#[command(
    name = "boilersrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "ecoNET boiler polling service",
    long_about = None
)]
pub struct Args {
    /// Configuration file (yaml, json or toml)
    #[arg(short = 'c', long, env = "BOILERSRV_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Validation mode - load configuration and parameter map, then exit
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Poll the boiler until Ctrl+C (default)
    Run,
    /// Read one parameter from the boiler
    Get {
        slug: String,
        /// Read attempts
        #[arg(short, long, default_value_t = 3)]
        retries: u32,
    },
    /// Write one parameter to the boiler
    Set { slug: String, value: String },
    /// List parameters of the loaded map
    List,
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

pub fn service_info() -> ServiceInfo {
    ServiceInfo::new(
        "boilersrv",
        env!("CARGO_PKG_VERSION"),
        "ecoNET boiler link - polling and write-through cache",
    )
}

/// Initialize logging from CLI and config
///
/// Log root directory priority:
/// 1. ECONET_LOG_DIR environment variable
/// 2. logging.dir from the config file
/// 3. Default "logs"
pub fn initialize_logging(
    args: &Args,
    config: Option<&AppConfig>,
    service: &ServiceInfo,
) -> EconetResult<()> {
    common::service_bootstrap::load_development_env();

    let level = args
        .log_level
        .as_deref()
        .or(config.map(|c| c.logging.level.as_str()))
        .unwrap_or("info");

    let options = LoggingOptions {
        dir: config.and_then(|c| c.logging.dir.as_deref()),
        level: common::logging::parse_level(level),
        json: config.is_some_and(|c| c.logging.json),
        no_color: args.no_color,
        console_only: args.command() != Command::Run,
    };

    common::service_bootstrap::init_logging(service, &options)
        .map_err(|e| EconetError::StartupFailed(format!("Failed to init logging: {}", e)))
}

/// Load the parameter map named by the config
pub fn load_parameter_map(config: &AppConfig) -> EconetResult<Arc<ParameterMap>> {
    let path = config.map_path();
    if !path.exists() {
        return Err(EconetError::FileNotFound(path.display().to_string()));
    }
    let map = ParameterMap::from_file(&path)
        .map_err(|e| EconetError::ParameterMap(format!("{}: {}", path.display(), e)))?;
    info!("Loaded {} parameters from {}", map.len(), path.display());
    Ok(Arc::new(map))
}

/// Driver for the configured boiler
pub fn build_device(config: &AppConfig, params: Arc<ParameterMap>) -> EconetResult<EconetDevice> {
    let device = EconetDevice::with_tcp(config.transport_config(), params, config.driver_config())?;
    info!(
        "Boiler at {}:{} (dest {}, src {})",
        config.device.host, config.device.port, config.device.dest_address, config.device.source_address
    );
    Ok(device)
}

/// Check the config and the map it references
pub fn validate_configuration(config: &AppConfig) -> EconetResult<()> {
    let params = load_parameter_map(config)?;
    let unknown: Vec<&str> = config
        .slugs
        .iter()
        .map(String::as_str)
        .filter(|s| !params.contains(s))
        .collect();
    if !unknown.is_empty() {
        return Err(EconetError::InvalidConfig {
            field: "slugs".to_string(),
            reason: format!("not in the parameter map: {}", unknown.join(", ")),
        });
    }
    info!(
        "Configuration valid: {} slugs, {} parameters",
        config.slugs.len(),
        params.len()
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let args = Args::parse_from(["boilersrv"]);
        assert_eq!(args.command(), Command::Run);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(args.log_level.is_none());
    }

    #[test]
    fn test_subcommands() {
        let args = Args::parse_from(["boilersrv", "-c", "/etc/b.yaml", "get", "tempcwu"]);
        assert_eq!(args.config, PathBuf::from("/etc/b.yaml"));
        assert_eq!(
            args.command(),
            Command::Get {
                slug: "tempcwu".into(),
                retries: 3
            }
        );

        let args = Args::parse_from(["boilersrv", "-l", "debug", "set", "tempcwu", "55"]);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(
            args.command(),
            Command::Set {
                slug: "tempcwu".into(),
                value: "55".into()
            }
        );
    }

    #[test]
    fn test_validate_configuration_reports_unknown_slugs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("device_map.json"),
            r#"{ "tempcwu": { "id": 1281, "type": "BYTE" } }"#,
        )
        .unwrap();

        let mut config = AppConfig {
            base_dir: Some(dir.path().to_path_buf()),
            slugs: vec!["tempcwu".into()],
            ..AppConfig::default()
        };
        config.device.host = "boiler".into();
        assert!(validate_configuration(&config).is_ok());

        config.slugs.push("nope".into());
        let err = validate_configuration(&config).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_missing_map_file() {
        let config = AppConfig {
            base_dir: Some(PathBuf::from("/nonexistent")),
            ..AppConfig::default()
        };
        assert!(matches!(
            load_parameter_map(&config),
            Err(EconetError::FileNotFound(_))
        ));
    }
}
