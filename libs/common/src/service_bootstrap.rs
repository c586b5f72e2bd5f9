//! Service bootstrap utilities
//!
//! Startup banner, logging initialization and development environment setup.

use std::path::Path;

use crate::logging::{self, LogConfig};
use tracing::{info, Level};

/// Service metadata for startup
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g., "boilersrv")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
}

impl ServiceInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Print the startup banner
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = r#"
 ███████╗ ██████╗ ██████╗ ███╗   ██╗███████╗████████╗
 ██╔════╝██╔════╝██╔═══██╗████╗  ██║██╔════╝╚══██╔══╝
 █████╗  ██║     ██║   ██║██╔██╗ ██║█████╗     ██║
 ██╔══╝  ██║     ██║   ██║██║╚██╗██║██╔══╝     ██║
 ███████╗╚██████╗╚██████╔╝██║ ╚████║███████╗   ██║
 ╚══════╝ ╚═════╝ ╚═════╝ ╚═╝  ╚═══╝╚══════╝   ╚═╝
            "#;

    info!("{}", banner);
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!("");
}

/// Logging options gathered from CLI and config
#[derive(Debug, Clone)]
pub struct LoggingOptions<'a> {
    /// `logging.dir` from the config file
    pub dir: Option<&'a str>,
    pub level: Level,
    pub json: bool,
    pub no_color: bool,
    /// One-shot CLI commands log to the console only
    pub console_only: bool,
}

/// Initialize logging for a service
///
/// Log root directory priority:
/// 1. ECONET_LOG_DIR environment variable
/// 2. `logging.dir` from config
/// 3. Default "logs"
pub fn init_logging(service: &ServiceInfo, options: &LoggingOptions<'_>) -> anyhow::Result<()> {
    logging::init_log_root(options.dir);

    let log_config = LogConfig {
        service_name: service.name.clone(),
        log_dir: logging::get_log_root().join(&service.name),
        console_level: options.level,
        enable_file: !options.console_only,
        enable_json: options.json,
        ansi: !options.no_color,
    };

    logging::init_with_config(log_config)
}

/// Load environment variables in development mode
///
/// In debug builds, reads `.env` and sets variables that are not already set.
/// No-op in release builds.
pub fn load_development_env() {
    #[cfg(debug_assertions)]
    {
        load_env_file(Path::new(".env"));
    }
}

/// Apply a dotenv file without overriding variables already set
#[cfg_attr(not(debug_assertions), allow(dead_code))]
fn load_env_file(path: &Path) -> bool {
    dotenv::from_path(path).is_ok()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_service_info_creation() {
        let service = ServiceInfo::new("boilersrv", "0.1.0", "Boiler link");
        assert_eq!(service.name, "boilersrv");
        assert_eq!(service.version, "0.1.0");
    }

    #[test]
    fn test_env_file_keeps_existing_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# comment\n\nECONET_DOTENV_TEST_HOST=10.0.0.5\nECONET_DOTENV_TEST_KEEP=file\n",
        )
        .unwrap();
        std::env::set_var("ECONET_DOTENV_TEST_KEEP", "process");

        assert!(load_env_file(&path));
        assert_eq!(std::env::var("ECONET_DOTENV_TEST_HOST").unwrap(), "10.0.0.5");
        assert_eq!(std::env::var("ECONET_DOTENV_TEST_KEEP").unwrap(), "process");

        assert!(!load_env_file(&dir.path().join("missing.env")));
    }
}
