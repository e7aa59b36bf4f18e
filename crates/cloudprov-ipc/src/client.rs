//! D-Bus client side
//!
//! [`ZbusConnector`] implements the manager's connector port over a single
//! shared bus connection: every provider endpoint gets its own
//! [`CloudProviderProxy`] on that connection. [`notify_manager`] is what a
//! provider calls to tell the manager its state changed.

use std::{future::Future, sync::Arc, time::Duration};

use cloudprov_core::{
    config::BusKind,
    domain::ProviderEndpoint,
    ports::{IProviderChannel, IProviderConnector, TransportError},
};
use tracing::{debug, info};

// ============================================================================
// Generated proxies
// ============================================================================

/// `org.gtk.CloudProvider`, implemented by every cloud provider
#[zbus::proxy(interface = "org.gtk.CloudProvider", gen_blocking = false)]
trait CloudProvider {
    /// Human-readable provider name
    fn get_name(&self) -> zbus::Result<String>;

    /// Raw status code: 0 invalid, 1 idle, 2 syncing, 3 error
    fn get_status(&self) -> zbus::Result<i32>;
}

/// `org.gtk.CloudProviderManager`, exported by the manager process
#[zbus::proxy(
    interface = "org.gtk.CloudProviderManager",
    default_service = "org.gtk.CloudProviderManager",
    default_path = "/org/gtk/CloudProviderManager",
    gen_blocking = false
)]
trait ManagerNotify {
    /// Hint that some provider changed its name or status
    fn cloud_provider_changed(&self) -> zbus::Result<()>;
}

/// Opens a connection to the requested message bus
pub async fn connect_bus(kind: BusKind) -> anyhow::Result<zbus::Connection> {
    let connection = match kind {
        BusKind::Session => zbus::Connection::session().await?,
        BusKind::System => zbus::Connection::system().await?,
    };
    debug!(bus = %kind, unique_name = ?connection.unique_name(), "Connected to message bus");
    Ok(connection)
}

/// Calls `CloudProviderChanged` on the manager service
pub async fn notify_manager(connection: &zbus::Connection) -> anyhow::Result<()> {
    let proxy = ManagerNotifyProxy::new(connection).await?;
    proxy.cloud_provider_changed().await?;
    Ok(())
}

// ============================================================================
// Connector
// ============================================================================

/// Creates provider channels on a shared bus connection
#[derive(Clone)]
pub struct ZbusConnector {
    connection: zbus::Connection,
    call_timeout: Option<Duration>,
}

impl ZbusConnector {
    /// Wraps an existing connection
    pub fn new(connection: zbus::Connection) -> Self {
        Self {
            connection,
            call_timeout: None,
        }
    }

    /// Opens its own connection to the `kind` bus
    pub async fn open(kind: BusKind) -> anyhow::Result<Self> {
        Ok(Self::new(connect_bus(kind).await?))
    }

    /// Bounds every `GetName` / `GetStatus` call. `None` waits forever.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn connection(&self) -> &zbus::Connection {
        &self.connection
    }
}

#[async_trait::async_trait]
impl IProviderConnector for ZbusConnector {
    async fn connect(
        &self,
        endpoint: &ProviderEndpoint,
    ) -> Result<Arc<dyn IProviderChannel>, TransportError> {
        let proxy = CloudProviderProxy::builder(&self.connection)
            .destination(endpoint.bus_name().to_string())
            .and_then(|b| b.path(endpoint.object_path().to_string()))
            .map_err(|e| TransportError::connect(endpoint, e.to_string()))?
            .cache_properties(zbus::proxy::CacheProperties::No)
            .build()
            .await
            .map_err(|e| TransportError::connect(endpoint, e.to_string()))?;

        info!(endpoint = %endpoint, "Created D-Bus proxy for cloud provider");

        Ok(Arc::new(ZbusChannel {
            proxy,
            call_timeout: self.call_timeout,
        }))
    }
}

impl std::fmt::Debug for ZbusConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZbusConnector")
            .field("unique_name", &self.connection.unique_name())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

struct ZbusChannel {
    proxy: CloudProviderProxy<'static>,
    call_timeout: Option<Duration>,
}

/// Awaits `call`, bounded by `limit` when set
async fn bounded<T, F>(
    method: &'static str,
    limit: Option<Duration>,
    call: F,
) -> Result<T, TransportError>
where
    F: Future<Output = zbus::Result<T>> + Send,
{
    let result = match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| TransportError::Timeout { method })?,
        None => call.await,
    };
    result.map_err(|e| TransportError::call(method, e.to_string()))
}

#[async_trait::async_trait]
impl IProviderChannel for ZbusChannel {
    async fn get_name(&self) -> Result<String, TransportError> {
        bounded("GetName", self.call_timeout, self.proxy.get_name()).await
    }

    async fn get_status(&self) -> Result<i32, TransportError> {
        bounded("GetStatus", self.call_timeout, self.proxy.get_status()).await
    }
}

// ============================================================================
// Tests
// ============================================================================
