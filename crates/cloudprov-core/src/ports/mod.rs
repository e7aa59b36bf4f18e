//! Port definitions (hexagonal architecture interfaces)
//!
//! - [`IProviderConnector`] - Establishes channels to provider endpoints
//! - [`IProviderChannel`] - The `GetName` / `GetStatus` calls on one channel

pub mod provider_channel;

pub use provider_channel::{
    IProviderChannel, IProviderConnector, TransportError, MANAGER_BUS_NAME, MANAGER_INTERFACE,
    MANAGER_OBJECT_PATH, PROVIDER_INTERFACE,
};
