//! CLI subcommands and the helpers they share

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use cloudprov_core::config::Config;
use cloudprov_ipc::ZbusConnector;
use cloudprov_manager::CloudProviderManager;
use tracing::debug;

pub mod config;
pub mod list;
pub mod notify;
pub mod serve_example;
pub mod watch;

/// `--config` if given, otherwise the default location
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(Config::default_path)
}

/// Loads the config file, or defaults when it does not exist
///
/// Unlike [`Config::load_or_default`], a file that exists but fails to
/// parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(config_path = %path.display(), "No configuration file, using defaults");
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("Failed to load configuration: {}", path.display()))
}

/// Connects to the configured bus and builds a manager on top of it
pub async fn build_manager(config: &Config) -> Result<(ZbusConnector, Arc<CloudProviderManager>)> {
    let connector = ZbusConnector::open(config.bus.kind)
        .await
        .with_context(|| format!("Failed to connect to the {} bus", config.bus.kind))?
        .with_call_timeout(config.bus.call_timeout());
    let manager = Arc::new(CloudProviderManager::new(Arc::new(connector.clone())));
    Ok((connector, manager))
}
