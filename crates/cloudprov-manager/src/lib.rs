//! cloudprov Manager - provider proxies and aggregation
//!
//! - [`ProviderProxy`] - caches name/status of one provider endpoint
//! - [`CloudProviderManager`] - owns all proxies and republishes their events
//! - [`ChangeNotifier`] - observer list used by both
//! - [`discovery`] - endpoint discovery from YAML descriptor directories
//!
//! The transport is injected through
//! [`IProviderConnector`](cloudprov_core::ports::IProviderConnector); see
//! `cloudprov-ipc` for the D-Bus implementation.

pub mod discovery;
pub mod manager;
pub mod notifier;
pub mod proxy;

pub use manager::{CloudProviderManager, DiscoveryEvent, ProviderSnapshot, SyncSummary};
pub use notifier::{ChangeEvent, ChangeNotifier, QueryKind, SubscriptionId};
pub use proxy::{ConnectionPhase, ProviderProxy};
