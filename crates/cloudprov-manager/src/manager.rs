//! Cloud provider manager
//!
//! [`CloudProviderManager`] owns one [`ProviderProxy`] per discovered
//! endpoint and republishes every proxy event on its own notifier. Build
//! exactly one per process and share it behind an `Arc`.
//!
//! ## Flow
//!
//! ```text
//! discovery ──→ add/remove/sync_endpoints ──→ ProviderProxy (per endpoint)
//!                                                   │ ChangeEvent
//!                                                   ▼
//! consumers ◀── ChangeEvent ◀── manager notifier ◀──┘
//! ```
//!
//! Membership changes raise `ProviderAdded` / `ProviderRemoved`; each proxy
//! `ProviderUpdated` is re-raised as-is, one for one.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use cloudprov_core::{
    domain::{ProviderEndpoint, ProviderStatus},
    ports::IProviderConnector,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    notifier::{ChangeEvent, ChangeNotifier, SubscriptionId},
    proxy::{ConnectionPhase, ProviderProxy},
};

/// Endpoint membership change reported by a discovery source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Appeared(ProviderEndpoint),
    Vanished(ProviderEndpoint),
}

/// Result of reconciling against a full endpoint listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub added: usize,
    pub removed: usize,
}

/// Serializable view of one provider, for display and JSON output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSnapshot {
    pub bus_name: String,
    pub object_path: String,
    pub name: Option<String>,
    pub status: ProviderStatus,
    pub phase: ConnectionPhase,
}

impl From<&ProviderProxy> for ProviderSnapshot {
    fn from(proxy: &ProviderProxy) -> Self {
        let state = proxy.state();
        Self {
            bus_name: proxy.endpoint().bus_name().to_string(),
            object_path: proxy.endpoint().object_path().to_string(),
            name: state.name,
            status: state.status,
            phase: proxy.phase(),
        }
    }
}

struct ManagedProvider {
    proxy: ProviderProxy,
    subscription: SubscriptionId,
    /// Cleared on removal; the forwarder drops events once it is unset
    tracked: Arc<AtomicBool>,
}

/// Aggregates every known cloud provider
pub struct CloudProviderManager {
    connector: Arc<dyn IProviderConnector>,
    providers: RwLock<Vec<ManagedProvider>>,
    notifier: ChangeNotifier,
}

impl CloudProviderManager {
    /// Creates an empty manager that connects proxies through `connector`
    pub fn new(connector: Arc<dyn IProviderConnector>) -> Self {
        Self {
            connector,
            providers: RwLock::new(Vec::new()),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Snapshot of the current providers, in insertion order
    pub fn list_providers(&self) -> Vec<ProviderProxy> {
        self.read_providers()
            .iter()
            .map(|p| p.proxy.clone())
            .collect()
    }

    /// Serializable snapshot of the current providers, in insertion order
    pub fn snapshot(&self) -> Vec<ProviderSnapshot> {
        self.read_providers()
            .iter()
            .map(|p| ProviderSnapshot::from(&p.proxy))
            .collect()
    }

    pub fn provider(&self, endpoint: &ProviderEndpoint) -> Option<ProviderProxy> {
        self.read_providers()
            .iter()
            .find(|p| p.proxy.endpoint() == endpoint)
            .map(|p| p.proxy.clone())
    }

    pub fn len(&self) -> usize {
        self.read_providers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_providers().is_empty()
    }

    /// Refreshes every provider
    ///
    /// Pure fan-out: no ordering or completion guarantee across providers.
    pub fn refresh_all(&self) {
        let proxies = self.list_providers();
        debug!(count = proxies.len(), "Refreshing all cloud providers");
        for proxy in proxies {
            proxy.refresh();
        }
    }

    /// Handles a `CloudProviderChanged` hint from a provider
    ///
    /// Hints carry no sender identity, so every provider is refreshed.
    /// Bursts are absorbed by the per-proxy in-flight guard.
    pub fn provider_changed_hint(&self) {
        debug!("Received CloudProviderChanged hint");
        self.refresh_all();
    }

    /// Starts tracking `endpoint`
    ///
    /// Returns `false` if it is already tracked. Must be called inside a
    /// tokio runtime; the proxy connects in the background.
    pub fn add_endpoint(&self, endpoint: ProviderEndpoint) -> bool {
        let proxy = {
            let mut providers = self.write_providers();
            if providers.iter().any(|p| p.proxy.endpoint() == &endpoint) {
                debug!(endpoint = %endpoint, "Endpoint already tracked");
                return false;
            }

            let proxy = ProviderProxy::new(endpoint.clone());
            let notifier = self.notifier.clone();
            let tracked = Arc::new(AtomicBool::new(true));
            let forward = Arc::clone(&tracked);
            let subscription = proxy.subscribe(move |event| {
                if forward.load(Ordering::Acquire) {
                    notifier.emit(event);
                } else {
                    debug!(endpoint = %event.endpoint(), "Dropping event from removed provider");
                }
            });

            providers.push(ManagedProvider {
                proxy: proxy.clone(),
                subscription,
                tracked,
            });
            proxy
        };

        info!(endpoint = %endpoint, "Cloud provider added");
        self.notifier.emit(&ChangeEvent::ProviderAdded(endpoint));
        proxy.connect(Arc::clone(&self.connector));
        true
    }

    /// Stops tracking `endpoint`
    ///
    /// Returns `false` if it was not tracked. Replies that complete after
    /// this call are not forwarded. A reply already being delivered on
    /// another worker may still surface once, after `ProviderRemoved`;
    /// consumers should look the endpoint up again before using it.
    pub fn remove_endpoint(&self, endpoint: &ProviderEndpoint) -> bool {
        let removed = {
            let mut providers = self.write_providers();
            let Some(index) = providers
                .iter()
                .position(|p| p.proxy.endpoint() == endpoint)
            else {
                debug!(endpoint = %endpoint, "Endpoint not tracked");
                return false;
            };
            providers.remove(index)
        };

        removed.tracked.store(false, Ordering::Release);
        removed.proxy.notifier().unsubscribe(removed.subscription);
        info!(endpoint = %endpoint, "Cloud provider removed");
        self.notifier
            .emit(&ChangeEvent::ProviderRemoved(endpoint.clone()));
        true
    }

    /// Applies one discovery event. Returns `true` if membership changed.
    pub fn apply(&self, event: DiscoveryEvent) -> bool {
        match event {
            DiscoveryEvent::Appeared(endpoint) => self.add_endpoint(endpoint),
            DiscoveryEvent::Vanished(endpoint) => self.remove_endpoint(&endpoint),
        }
    }

    /// Reconciles membership against a complete endpoint listing
    ///
    /// Tracked endpoints missing from `endpoints` are removed, new ones are
    /// added in the order given. Existing proxies are kept untouched.
    pub fn sync_endpoints<I>(&self, endpoints: I) -> SyncSummary
    where
        I: IntoIterator<Item = ProviderEndpoint>,
    {
        let wanted: Vec<ProviderEndpoint> = endpoints.into_iter().collect();
        let wanted_set: HashSet<&ProviderEndpoint> = wanted.iter().collect();

        let stale: Vec<ProviderEndpoint> = self
            .read_providers()
            .iter()
            .map(|p| p.proxy.endpoint().clone())
            .filter(|ep| !wanted_set.contains(ep))
            .collect();

        let mut summary = SyncSummary::default();
        for endpoint in &stale {
            if self.remove_endpoint(endpoint) {
                summary.removed += 1;
            }
        }
        for endpoint in wanted {
            if self.add_endpoint(endpoint) {
                summary.added += 1;
            }
        }

        if summary != SyncSummary::default() {
            info!(
                added = summary.added,
                removed = summary.removed,
                total = self.len(),
                "Cloud provider set updated"
            );
        }
        summary
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Shorthand for `self.notifier().subscribe(callback)`
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    /// Shorthand for `self.notifier().subscribe_channel()`
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<ChangeEvent>) {
        self.notifier.subscribe_channel()
    }

    fn read_providers(&self) -> RwLockReadGuard<'_, Vec<ManagedProvider>> {
        self.providers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_providers(&self) -> RwLockWriteGuard<'_, Vec<ManagedProvider>> {
        self.providers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CloudProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudProviderManager")
            .field("providers", &self.list_providers())
            .finish()
    }
}
