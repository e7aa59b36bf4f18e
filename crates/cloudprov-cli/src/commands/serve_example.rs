//! Serve-example command - the bundled example provider
//!
//! Exports `org.gtk.CloudProvider` at the configured example endpoint,
//! starting as `Syncing`. Every interval it switches to a random status
//! and tells the manager. Runs until Ctrl+C.

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use clap::Args;
use cloudprov_core::domain::ProviderStatus;
use cloudprov_ipc::{connect_bus, notify_manager, ExampleProviderService};
use rand::{seq::SliceRandom, Rng};
use tracing::{debug, info, warn};

use super::load_config;
use crate::output::{get_formatter, OutputFormat};

/// Statuses the example provider cycles through
const CHANGING_STATUSES: [ProviderStatus; 3] = [
    ProviderStatus::Idle,
    ProviderStatus::Syncing,
    ProviderStatus::Error,
];

#[derive(Debug, Args)]
pub struct ServeExampleCommand {
    /// Name answered to GetName (overrides example_provider.name)
    #[arg(long)]
    pub name: Option<String>,

    /// Milliseconds between status changes (overrides example_provider.change_interval_ms)
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

impl ServeExampleCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let config = load_config(config_path)?;
        let example = &config.example_provider;

        let endpoint = example
            .endpoint()
            .context("Invalid example_provider endpoint in configuration")?;
        let name = self.name.clone().unwrap_or_else(|| example.name.clone());
        let interval_ms = self.interval_ms.unwrap_or(example.change_interval_ms);
        if interval_ms == 0 {
            anyhow::bail!("Status change interval must be greater than 0");
        }

        let connection = connect_bus(config.bus.kind)
            .await
            .with_context(|| format!("Failed to connect to the {} bus", config.bus.kind))?;
        let service = ExampleProviderService::new(endpoint, name.clone());
        service
            .start(&connection)
            .await
            .context("Failed to export example provider")?;

        formatter.success(&format!(
            "Serving '{}' at {} (Ctrl+C to stop)",
            name,
            service.endpoint()
        ));

        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
        // first tick is immediate; keep the initial Syncing status for one interval
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let status = random_status(&mut rand::thread_rng());
                    service.set_status(status).await;
                    debug!(status = %status, "Example provider status changed");

                    if let Err(e) = notify_manager(&connection).await {
                        warn!(error = %e, "Error notifying the cloud provider manager");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping example provider");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Picks one of the non-invalid statuses
fn random_status<R: Rng + ?Sized>(rng: &mut R) -> ProviderStatus {
    CHANGING_STATUSES
        .choose(rng)
        .copied()
        .unwrap_or(ProviderStatus::Idle)
}
