//! Domain values for the cloud provider protocol
//!
//! Pure data, no I/O:
//! - [`ProviderEndpoint`] - where a provider lives
//! - [`ProviderStatus`] - decoded `GetStatus` reply
//! - [`ProviderState`] - cached name/status/icon/menu of one provider

pub mod endpoint;
pub mod errors;
pub mod state;
pub mod status;

pub use endpoint::ProviderEndpoint;
pub use errors::DomainError;
pub use state::{IconHandle, MenuHandle, ProviderState};
pub use status::ProviderStatus;
