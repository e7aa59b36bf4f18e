//! D-Bus service implementations
//!
//! - `org.gtk.CloudProviderManager` - exported by the manager process;
//!   `CloudProviderChanged` makes the manager refresh every provider
//! - `org.gtk.CloudProvider` - exported by the bundled example provider
//!
//! Both follow the same pattern: an interface struct holding shared state,
//! and a small service type that owns the bus name and object path.

use std::sync::Arc;

use cloudprov_core::{
    domain::{ProviderEndpoint, ProviderStatus},
    ports::{MANAGER_BUS_NAME, MANAGER_INTERFACE, MANAGER_OBJECT_PATH},
};
use cloudprov_manager::CloudProviderManager;
use tokio::sync::Mutex;
use tracing::{debug, info};

// ============================================================================
// Manager interface
// ============================================================================

/// D-Bus interface through which providers announce changes
pub struct ManagerInterface {
    manager: Arc<CloudProviderManager>,
}

impl ManagerInterface {
    pub fn new(manager: Arc<CloudProviderManager>) -> Self {
        Self { manager }
    }
}

#[zbus::interface(name = "org.gtk.CloudProviderManager")]
impl ManagerInterface {
    /// Some provider changed; refresh them all
    ///
    /// The hint carries no sender identity, so every known provider is
    /// re-queried.
    async fn cloud_provider_changed(&self) {
        debug!(providers = self.manager.len(), "CloudProviderChanged called");
        self.manager.provider_changed_hint();
    }
}

/// Exports the manager at its well-known name and path
pub struct ManagerService {
    manager: Arc<CloudProviderManager>,
}

impl ManagerService {
    pub fn new(manager: Arc<CloudProviderManager>) -> Self {
        Self { manager }
    }

    /// Registers the interface on `connection` and requests the well-known
    /// name
    ///
    /// The connection must be kept alive for the service to remain active.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Interface registration fails
    /// - The well-known name is already owned (another manager running)
    pub async fn start(&self, connection: &zbus::Connection) -> anyhow::Result<()> {
        info!("Starting cloud provider manager D-Bus service");

        let iface = ManagerInterface::new(Arc::clone(&self.manager));
        connection
            .object_server()
            .at(MANAGER_OBJECT_PATH, iface)
            .await?;
        connection.request_name(MANAGER_BUS_NAME).await?;

        info!(
            name = MANAGER_BUS_NAME,
            path = MANAGER_OBJECT_PATH,
            interface = MANAGER_INTERFACE,
            "Manager D-Bus service started successfully"
        );
        Ok(())
    }

    /// Whether another process already owns the manager name
    pub async fn is_name_owned(connection: &zbus::Connection) -> anyhow::Result<bool> {
        let dbus_proxy = zbus::fdo::DBusProxy::new(connection).await?;
        let owned = dbus_proxy
            .name_has_owner(MANAGER_BUS_NAME.try_into()?)
            .await?;
        Ok(owned)
    }
}

// ============================================================================
// Example provider
// ============================================================================

/// State answered by the example provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleState {
    pub name: String,
    pub status: ProviderStatus,
}

impl ExampleState {
    /// Starts out syncing
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ProviderStatus::Syncing,
        }
    }
}

/// `org.gtk.CloudProvider` backed by shared [`ExampleState`]
pub struct ProviderInterface {
    state: Arc<Mutex<ExampleState>>,
}

impl ProviderInterface {
    pub fn new(state: Arc<Mutex<ExampleState>>) -> Self {
        Self { state }
    }
}

#[zbus::interface(name = "org.gtk.CloudProvider")]
impl ProviderInterface {
    async fn get_name(&self) -> String {
        let state = self.state.lock().await;
        debug!(name = %state.name, "GetName called");
        state.name.clone()
    }

    async fn get_status(&self) -> i32 {
        let state = self.state.lock().await;
        debug!(status = %state.status, "GetStatus called");
        state.status.to_wire()
    }
}

/// The bundled example provider
///
/// Owns `endpoint`'s bus name and serves [`ProviderInterface`] at its
/// object path. Status changes go through [`set_status`](Self::set_status);
/// telling the manager about them is up to the caller.
pub struct ExampleProviderService {
    endpoint: ProviderEndpoint,
    state: Arc<Mutex<ExampleState>>,
}

impl ExampleProviderService {
    pub fn new(endpoint: ProviderEndpoint, name: impl Into<String>) -> Self {
        Self {
            endpoint,
            state: Arc::new(Mutex::new(ExampleState::new(name))),
        }
    }

    pub fn endpoint(&self) -> &ProviderEndpoint {
        &self.endpoint
    }

    pub fn state(&self) -> &Arc<Mutex<ExampleState>> {
        &self.state
    }

    pub async fn set_status(&self, status: ProviderStatus) {
        self.state.lock().await.status = status;
    }

    /// Exports the provider on `connection`
    ///
    /// # Errors
    /// Returns an error if the object path is taken or the bus name is
    /// already owned.
    pub async fn start(&self, connection: &zbus::Connection) -> anyhow::Result<()> {
        let iface = ProviderInterface::new(Arc::clone(&self.state));
        connection
            .object_server()
            .at(self.endpoint.object_path().to_string(), iface)
            .await?;
        connection
            .request_name(self.endpoint.bus_name().to_string())
            .await?;

        info!(
            name = self.endpoint.bus_name(),
            path = self.endpoint.object_path(),
            "Example cloud provider exported"
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
