//! Provider transport port (driven/secondary port)
//!
//! This module defines what the proxy layer needs from an inter-process
//! transport: a way to establish a channel to a [`ProviderEndpoint`] and the
//! two zero-argument calls of the `org.gtk.CloudProvider` interface.
//!
//! ## Design Notes
//!
//! - Uses `#[async_trait]` for async trait methods.
//! - `GetStatus` is surfaced as the raw `i32`; decoding into
//!   [`ProviderStatus`](crate::domain::ProviderStatus) belongs to the proxy.
//! - Channels are shared as `Arc<dyn IProviderChannel>` so concurrent
//!   requests on one endpoint can each hold a handle.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::ProviderEndpoint;

/// D-Bus interface name implemented by providers
pub const PROVIDER_INTERFACE: &str = "org.gtk.CloudProvider";

/// Well-known bus name owned by the manager
pub const MANAGER_BUS_NAME: &str = "org.gtk.CloudProviderManager";

/// Object path of the manager service
pub const MANAGER_OBJECT_PATH: &str = "/org/gtk/CloudProviderManager";

/// D-Bus interface name of the manager service
pub const MANAGER_INTERFACE: &str = "org.gtk.CloudProviderManager";

/// Transport-level failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The channel to the endpoint could not be established
    #[error("Failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    /// A method call failed or returned an unexpected reply
    #[error("Call {method} failed: {message}")]
    Call {
        method: &'static str,
        message: String,
    },

    /// The call did not complete within the configured timeout
    #[error("Call {method} timed out")]
    Timeout { method: &'static str },
}

impl TransportError {
    pub fn connect(endpoint: &ProviderEndpoint, message: impl Into<String>) -> Self {
        TransportError::Connect {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    pub fn call(method: &'static str, message: impl Into<String>) -> Self {
        TransportError::Call {
            method,
            message: message.into(),
        }
    }
}

/// Established channel to one provider endpoint
#[async_trait::async_trait]
pub trait IProviderChannel: Send + Sync {
    /// Calls `GetName() -> (s)`
    async fn get_name(&self) -> Result<String, TransportError>;

    /// Calls `GetStatus() -> (i)`
    async fn get_status(&self) -> Result<i32, TransportError>;
}

/// Factory for provider channels
///
/// Implementations may perform I/O (bus handshakes, introspection) while
/// connecting; the proxy always runs `connect` off the caller's path.
#[async_trait::async_trait]
pub trait IProviderConnector: Send + Sync {
    /// Establishes a channel to `endpoint`
    async fn connect(
        &self,
        endpoint: &ProviderEndpoint,
    ) -> Result<Arc<dyn IProviderChannel>, TransportError>;
}
