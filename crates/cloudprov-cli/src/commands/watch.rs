//! Watch command - live provider table
//!
//! Provides the `cloudprov watch` CLI command which:
//! 1. Builds a manager over the discovered endpoints
//! 2. Exports the manager service so providers' change hints reach it,
//!    falling back to polling when another manager owns the name
//! 3. Prints the provider table after every change until Ctrl+C

use std::{path::Path, time::Duration};

use anyhow::Result;
use clap::Args;
use cloudprov_ipc::ManagerService;
use cloudprov_manager::{discovery::DirectoryDiscovery, ChangeEvent};
use tracing::{info, warn};

use super::{build_manager, load_config};
use crate::output::{get_formatter, print_providers, OutputFormat};

/// Polling interval used when change hints cannot be received
const FALLBACK_REFRESH: Duration = Duration::from_secs(1);

#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Seconds between forced refreshes (overrides refresh.interval_secs)
    #[arg(long)]
    pub refresh_secs: Option<u64>,
}

impl WatchCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let config = load_config(config_path)?;
        let (connector, manager) = build_manager(&config).await?;

        let mut refresh = Duration::from_secs(
            self.refresh_secs.unwrap_or(config.refresh.interval_secs),
        );

        let exported = match ManagerService::new(manager.clone())
            .start(connector.connection())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Cannot export manager service, change hints will be missed");
                false
            }
        };
        if !exported && refresh.is_zero() {
            refresh = FALLBACK_REFRESH;
            if !format.is_json() {
                formatter.warn(&format!(
                    "Another manager is running; polling every {}s instead",
                    refresh.as_secs()
                ));
            }
        }

        let (_id, mut events) = manager.subscribe_channel();
        let endpoints = DirectoryDiscovery::from_config(&config.discovery).scan();
        manager.sync_endpoints(endpoints);
        print_providers(&*formatter, format, &manager.snapshot())?;

        let mut ticker = (!refresh.is_zero()).then(|| tokio::time::interval(refresh));
        info!(refresh_secs = refresh.as_secs(), exported, "Watching cloud providers");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ChangeEvent::ProviderUpdated { .. })
                    | Some(ChangeEvent::ProviderAdded(_))
                    | Some(ChangeEvent::ProviderRemoved(_)) => {
                        print_providers(&*formatter, format, &manager.snapshot())?;
                    }
                    None => break,
                },
                _ = next_tick(&mut ticker) => manager.refresh_all(),
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping watch");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Ticks `ticker` if present, otherwise never completes
async fn next_tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
