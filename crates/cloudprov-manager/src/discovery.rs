//! Provider endpoint discovery
//!
//! Providers announce themselves by dropping a small YAML descriptor into
//! one of the configured directories:
//!
//! ```yaml
//! bus_name: org.gtk.CloudProviderServerExample
//! object_path: /org/gtk/CloudProviderServerExample
//! ```
//!
//! [`DirectoryDiscovery`] turns the static config endpoints plus every
//! descriptor into one ordered endpoint list. [`DescriptorWatcher`] wraps
//! `notify` and signals whenever a descriptor may have changed, so the
//! daemon can rescan and reconcile the manager.
//!
//! ## Architecture
//!
//! ```text
//! inotify
//!    │
//!    ▼
//! DescriptorWatcher ──→ mpsc (coalesced) ──→ rescan ──→ manager.sync_endpoints
//! ```

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use cloudprov_core::{config::DiscoveryConfig, domain::ProviderEndpoint};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// File extensions recognized as provider descriptors
const DESCRIPTOR_EXTENSIONS: &[&str] = &["yaml", "yml"];

// ============================================================================
// Descriptor files
// ============================================================================

/// On-disk provider descriptor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderDescriptor {
    pub bus_name: String,
    pub object_path: String,
}

/// Whether `path` names a descriptor file
pub fn is_descriptor_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DESCRIPTOR_EXTENSIONS.contains(&ext))
}

/// Reads and validates a single descriptor
pub fn load_descriptor(path: &Path) -> Result<ProviderEndpoint> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read descriptor: {}", path.display()))?;
    let descriptor: ProviderDescriptor = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse descriptor: {}", path.display()))?;
    let endpoint = ProviderEndpoint::new(descriptor.bus_name, descriptor.object_path)
        .with_context(|| format!("Invalid endpoint in descriptor: {}", path.display()))?;
    Ok(endpoint)
}

/// Loads every descriptor in `dir`, ordered by file name
///
/// A missing directory yields nothing. Unreadable or invalid descriptors
/// are logged and skipped.
pub fn scan_directory(dir: &Path) -> Vec<ProviderEndpoint> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Descriptor directory does not exist");
            return Vec::new();
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot read descriptor directory");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_descriptor_path(path))
        .collect();
    paths.sort();

    paths
        .iter()
        .filter_map(|path| match load_descriptor(path) {
            Ok(endpoint) => {
                debug!(path = %path.display(), endpoint = %endpoint, "Loaded provider descriptor");
                Some(endpoint)
            }
            Err(e) => {
                let err_msg = format!("{e:#}");
                warn!(error = %err_msg, "Skipping provider descriptor");
                None
            }
        })
        .collect()
}

/// Expands a leading `~` to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

// ============================================================================
// DirectoryDiscovery
// ============================================================================

/// Computes the current endpoint set from config and descriptor directories
#[derive(Debug, Clone)]
pub struct DirectoryDiscovery {
    directories: Vec<PathBuf>,
    static_endpoints: Vec<ProviderEndpoint>,
}

impl DirectoryDiscovery {
    pub fn new(directories: Vec<PathBuf>, static_endpoints: Vec<ProviderEndpoint>) -> Self {
        Self {
            directories: directories.iter().map(|d| expand_home(d)).collect(),
            static_endpoints,
        }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(config.directories.clone(), config.endpoints.clone())
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Static endpoints first, then each directory in order; duplicates
    /// keep their first position
    pub fn scan(&self) -> Vec<ProviderEndpoint> {
        let mut seen = HashSet::new();
        let discovered = self
            .directories
            .iter()
            .flat_map(|dir| scan_directory(dir));

        let endpoints: Vec<ProviderEndpoint> = self
            .static_endpoints
            .iter()
            .cloned()
            .chain(discovered)
            .filter(|ep| seen.insert(ep.clone()))
            .collect();

        debug!(count = endpoints.len(), "Provider discovery scan complete");
        endpoints
    }
}

// ============================================================================
// DescriptorWatcher
// ============================================================================

/// Signals when descriptor directories change
///
/// Each signal means "rescan"; signals raised while one is pending are
/// folded into it. Dropping the watcher stops watching.
pub struct DescriptorWatcher {
    _watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl DescriptorWatcher {
    /// Watches every existing directory in `directories`
    ///
    /// Directories that do not exist are skipped; they are picked up on
    /// the next daemon start.
    ///
    /// # Errors
    /// Returns an error if the OS watcher cannot be created
    pub fn new(directories: &[PathBuf]) -> Result<(Self, mpsc::Receiver<()>)> {
        let (tx, rx) = mpsc::channel::<()>(1);

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if is_descriptor_event(&event) {
                        // a full channel already holds a pending rescan
                        let _ = tx.try_send(());
                    }
                }
                Err(err) => {
                    error!(error = %err, "Descriptor watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create descriptor watcher")?;

        let mut watched = Vec::new();
        for dir in directories {
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "Not watching missing descriptor directory");
                continue;
            }
            match watcher.watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    info!(dir = %dir.display(), "Watching descriptor directory");
                    watched.push(dir.clone());
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Failed to watch descriptor directory");
                }
            }
        }

        Ok((
            Self {
                _watcher: watcher,
                watched,
            },
            rx,
        ))
    }

    /// Directories actually being watched
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

/// Whether `event` may have changed the descriptor set
fn is_descriptor_event(event: &notify::Event) -> bool {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    relevant_kind && event.paths.iter().any(|p| is_descriptor_path(p))
}

// ============================================================================
// Tests
// ============================================================================
