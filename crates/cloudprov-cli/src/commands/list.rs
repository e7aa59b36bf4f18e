//! List command - one-shot provider listing
//!
//! Provides the `cloudprov list` CLI command which:
//! 1. Discovers provider endpoints from config and descriptor directories
//! 2. Connects to each and waits for the first name/status replies
//! 3. Prints the resulting provider table

use std::{collections::HashSet, path::Path, time::Duration};

use anyhow::Result;
use clap::Args;
use cloudprov_core::domain::ProviderEndpoint;
use cloudprov_manager::{discovery::DirectoryDiscovery, ChangeEvent, ProviderProxy, QueryKind};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{build_manager, load_config};
use crate::output::{get_formatter, print_providers, OutputFormat};

#[derive(Debug, Args)]
pub struct ListCommand {
    /// How long to wait for providers to answer, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,
}

impl ListCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let config = load_config(config_path)?;

        let endpoints = DirectoryDiscovery::from_config(&config.discovery).scan();
        info!(count = endpoints.len(), "Discovered provider endpoints");

        let (_connector, manager) = build_manager(&config).await?;
        let (_id, mut events) = manager.subscribe_channel();
        manager.sync_endpoints(endpoints.clone());

        let answered = wait_for_replies(
            &mut events,
            &endpoints,
            Duration::from_millis(self.timeout_ms),
        )
        .await;
        debug!(answered, total = endpoints.len(), "Finished waiting for providers");

        let providers = manager.list_providers();
        let unpopulated = count_unpopulated(&providers);
        if unpopulated > 0 && !format.is_json() {
            formatter.warn(&format!(
                "{} of {} providers did not report a name and status within {} ms",
                unpopulated,
                providers.len(),
                self.timeout_ms
            ));
        }

        print_providers(&*formatter, format, &manager.snapshot())
    }
}

/// Providers still missing a name or a valid status
fn count_unpopulated(providers: &[ProviderProxy]) -> usize {
    providers
        .iter()
        .filter(|p| !p.state().is_populated())
        .count()
}

/// Waits until every endpoint has answered both queries, or `timeout`
///
/// Returns the number of endpoints that answered both.
pub async fn wait_for_replies(
    events: &mut mpsc::UnboundedReceiver<ChangeEvent>,
    endpoints: &[ProviderEndpoint],
    timeout: Duration,
) -> usize {
    let wanted: HashSet<&ProviderEndpoint> = endpoints.iter().collect();
    let mut seen: HashSet<(ProviderEndpoint, QueryKind)> = HashSet::new();
    let deadline = tokio::time::Instant::now() + timeout;

    while seen.len() < wanted.len() * 2 {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(ChangeEvent::ProviderUpdated { endpoint, query })) => {
                if wanted.contains(&endpoint) {
                    seen.insert((endpoint, query));
                }
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                debug!(answered = seen.len(), "Stopped waiting for provider replies");
                break;
            }
        }
    }

    wanted
        .iter()
        .filter(|ep| {
            seen.contains(&((**ep).clone(), QueryKind::Name))
                && seen.contains(&((**ep).clone(), QueryKind::Status))
        })
        .count()
}
