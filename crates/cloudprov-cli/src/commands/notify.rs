//! Notify command - announce a provider change
//!
//! Calls `CloudProviderChanged` on the manager, which makes it refresh
//! every provider. Useful for testing providers that do not notify on
//! their own.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use cloudprov_core::ports::MANAGER_BUS_NAME;
use cloudprov_ipc::{connect_bus, notify_manager};
use tracing::info;

use super::load_config;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct NotifyCommand {}

impl NotifyCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let config = load_config(config_path)?;

        let connection = connect_bus(config.bus.kind)
            .await
            .with_context(|| format!("Failed to connect to the {} bus", config.bus.kind))?;
        notify_manager(&connection)
            .await
            .with_context(|| format!("Failed to call CloudProviderChanged on {MANAGER_BUS_NAME}"))?;

        info!(bus = %config.bus.kind, "Sent CloudProviderChanged");
        formatter.success(&format!("Sent CloudProviderChanged to {MANAGER_BUS_NAME}"));
        Ok(())
    }
}
