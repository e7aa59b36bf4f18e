//! cloudprov IPC - D-Bus transport and services
//!
//! - [`client`] - `org.gtk.CloudProvider` client proxy and the
//!   [`ZbusConnector`] used by the manager
//! - [`service`] - exported objects: the manager's
//!   `org.gtk.CloudProviderManager` interface and the example provider
//!
//! # Interfaces
//! - `org.gtk.CloudProvider` - `GetName() -> s`, `GetStatus() -> i`
//! - `org.gtk.CloudProviderManager` - `CloudProviderChanged()`

pub mod client;
pub mod service;

pub use client::{connect_bus, notify_manager, ZbusConnector};
pub use service::{ExampleProviderService, ExampleState, ManagerService};
