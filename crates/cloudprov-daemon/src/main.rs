//! cloudprov Daemon - cloud provider manager service
//!
//! This binary runs as a user service and handles:
//! - Exporting `org.gtk.CloudProviderManager` so providers can announce changes
//! - Discovering provider endpoints from descriptor directories
//! - Periodic refresh of every provider (optional)
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon connects to the configured bus, builds the single
//! [`CloudProviderManager`], exports it, and then runs the discovery loop
//! until a `CancellationToken` is triggered by SIGTERM or SIGINT. A change
//! logger and the refresh timer run alongside as separate tasks.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use cloudprov_core::{config::Config, domain::ProviderEndpoint, ports::MANAGER_BUS_NAME};
use cloudprov_ipc::{connect_bus, ManagerService, ZbusConnector};
use cloudprov_manager::{
    discovery::{DescriptorWatcher, DirectoryDiscovery},
    ChangeEvent, CloudProviderManager,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Quiet period after a descriptor change before rescanning
const RESCAN_DEBOUNCE: Duration = Duration::from_millis(200);

// ============================================================================
// DaemonService
// ============================================================================

/// Main daemon service that wires the manager to the bus and discovery
struct DaemonService {
    /// Application configuration loaded from YAML
    config: Config,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    fn new(config: Config, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    /// Runs the daemon until shutdown
    ///
    /// 1. Connects to the bus and checks for another manager
    /// 2. Builds the manager and exports its D-Bus service
    /// 3. Starts the change logger and refresh timer
    /// 4. Runs discovery in the foreground
    async fn run(&self) -> Result<()> {
        let connection = connect_bus(self.config.bus.kind)
            .await
            .with_context(|| format!("Failed to connect to the {} bus", self.config.bus.kind))?;

        info!("Checking for existing manager instance...");
        if ManagerService::is_name_owned(&connection).await? {
            error!(
                "Another cloud provider manager is already running (D-Bus name {} is taken)",
                MANAGER_BUS_NAME
            );
            anyhow::bail!("Another instance of cloudprovd is already running");
        }

        let connector = ZbusConnector::new(connection.clone())
            .with_call_timeout(self.config.bus.call_timeout());
        let manager = Arc::new(CloudProviderManager::new(Arc::new(connector)));

        ManagerService::new(Arc::clone(&manager))
            .start(&connection)
            .await
            .context("Failed to start manager D-Bus service")?;

        let logger = tokio::spawn(log_changes(Arc::clone(&manager), self.shutdown.clone()));
        let refresher = tokio::spawn(refresh_loop(
            Arc::clone(&manager),
            Duration::from_secs(self.config.refresh.interval_secs),
            self.shutdown.clone(),
        ));

        let discovery = DirectoryDiscovery::from_config(&self.config.discovery);
        let mut watcher = start_watcher(self.config.discovery.watch, || {
            DescriptorWatcher::new(discovery.directories())
        });
        let result = discovery_loop(
            &manager,
            &discovery,
            watcher.as_mut().map(|(_, changes)| changes),
            self.shutdown.clone(),
        )
        .await;

        // stop helpers too when discovery bails out early
        self.shutdown.cancel();
        for handle in [logger, refresher] {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        result
    }
}

// ============================================================================
// Background loops
// ============================================================================

/// Creates the descriptor watcher when watching is enabled
///
/// A watcher that cannot be created (e.g. inotify limits reached) is
/// logged and the daemon carries on without rescans.
fn start_watcher<F>(
    enabled: bool,
    create: F,
) -> Option<(DescriptorWatcher, mpsc::Receiver<()>)>
where
    F: FnOnce() -> Result<(DescriptorWatcher, mpsc::Receiver<()>)>,
{
    if !enabled {
        debug!("Descriptor watching disabled");
        return None;
    }

    match create() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            let err_msg = format!("{e:#}");
            warn!(error = %err_msg, "Cannot watch descriptor directories, rescans disabled");
            None
        }
    }
}

/// Keeps the manager's endpoint set in sync with discovery
///
/// Scans once at startup, then rescans whenever `changes` signals, until
/// shutdown. Without `changes` it only waits for shutdown.
async fn discovery_loop(
    manager: &CloudProviderManager,
    discovery: &DirectoryDiscovery,
    changes: Option<&mut mpsc::Receiver<()>>,
    shutdown: CancellationToken,
) -> Result<()> {
    let endpoints = rescan(discovery).await?;
    let summary = manager.sync_endpoints(endpoints);
    info!(
        providers = manager.len(),
        added = summary.added,
        "Initial provider discovery complete"
    );

    let Some(changes) = changes else {
        shutdown.cancelled().await;
        return Ok(());
    };

    loop {
        tokio::select! {
            signal = changes.recv() => {
                if signal.is_none() {
                    warn!("Descriptor watcher stopped, no further rescans");
                    shutdown.cancelled().await;
                    break;
                }

                tokio::time::sleep(RESCAN_DEBOUNCE).await;
                while changes.try_recv().is_ok() {}

                match rescan(discovery).await {
                    Ok(endpoints) => {
                        manager.sync_endpoints(endpoints);
                    }
                    Err(e) => {
                        let err_msg = format!("{e:#}");
                        warn!(error = %err_msg, "Provider rescan failed, keeping current set");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Discovery loop terminated");
    Ok(())
}

/// Runs a discovery scan off the async workers
async fn rescan(discovery: &DirectoryDiscovery) -> Result<Vec<ProviderEndpoint>> {
    let discovery = discovery.clone();
    tokio::task::spawn_blocking(move || discovery.scan())
        .await
        .context("Discovery scan panicked")
}

/// Refreshes every provider each `interval`; a zero interval disables it
async fn refresh_loop(
    manager: Arc<CloudProviderManager>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    if interval.is_zero() {
        debug!("Periodic refresh disabled");
        return;
    }

    info!(interval_secs = interval.as_secs(), "Starting periodic refresh");

    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; providers refresh on connect anyway
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => manager.refresh_all(),
            _ = shutdown.cancelled() => break,
        }
    }

    debug!("Periodic refresh stopped");
}

/// Logs the provider table on every manager change
async fn log_changes(manager: Arc<CloudProviderManager>, shutdown: CancellationToken) {
    let (subscription, mut events) = manager.subscribe_channel();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    debug!(event = ?event, "Manager changed");
                    if matches!(event, ChangeEvent::ProviderUpdated { .. }) {
                        log_providers(&manager);
                    }
                }
                None => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }

    manager.notifier().unsubscribe(subscription);
}

fn log_providers(manager: &CloudProviderManager) {
    let providers = manager.snapshot();
    info!(count = providers.len(), "Providers data");
    for provider in providers {
        info!(
            bus_name = %provider.bus_name,
            object_path = %provider.object_path,
            name = provider.name.as_deref().unwrap_or("-"),
            status = %provider.status,
            phase = %provider.phase,
            "Provider"
        );
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::default_path();
    let config_exists = config_path.exists();
    let config = Config::load_or_default(&config_path);

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!("cloudprov daemon starting (cloudprovd)");
    info!(
        config_path = %config_path.display(),
        from_file = config_exists,
        "Loaded configuration"
    );

    let errors = config.validate();
    if !errors.is_empty() {
        for err in &errors {
            error!(field = %err.field, "{}", err.message);
        }
        anyhow::bail!("Configuration has {} error(s)", errors.len());
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token);
    let result = service.run().await;

    match &result {
        Ok(()) => info!("cloudprov daemon shut down gracefully"),
        Err(e) => error!(error = %e, "cloudprov daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
