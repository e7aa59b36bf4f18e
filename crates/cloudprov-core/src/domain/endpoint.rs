//! Provider endpoint identity
//!
//! A [`ProviderEndpoint`] names where a provider lives on the bus. It is
//! handed to the manager by discovery and never built from anything else.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Immutable `(bus_name, object_path)` pair identifying a provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawEndpoint", into = "RawEndpoint")]
pub struct ProviderEndpoint {
    bus_name: String,
    object_path: String,
}

impl ProviderEndpoint {
    /// Creates a validated endpoint
    ///
    /// The bus name must be non-empty and contain no whitespace. The object
    /// path must be absolute (`/` prefixed).
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidBusName`] or
    /// [`DomainError::InvalidObjectPath`] when validation fails.
    pub fn new(
        bus_name: impl Into<String>,
        object_path: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let bus_name = bus_name.into();
        let object_path = object_path.into();

        if bus_name.is_empty() || bus_name.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidBusName(bus_name));
        }
        if !object_path.starts_with('/') || object_path.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidObjectPath(object_path));
        }

        Ok(Self {
            bus_name,
            object_path,
        })
    }

    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }
}

impl std::fmt::Display for ProviderEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.bus_name, self.object_path)
    }
}

/// Serialized shape of an endpoint, as found in config and descriptor files
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEndpoint {
    bus_name: String,
    object_path: String,
}

impl TryFrom<RawEndpoint> for ProviderEndpoint {
    type Error = DomainError;

    fn try_from(raw: RawEndpoint) -> Result<Self, Self::Error> {
        ProviderEndpoint::new(raw.bus_name, raw.object_path)
    }
}

impl From<ProviderEndpoint> for RawEndpoint {
    fn from(endpoint: ProviderEndpoint) -> Self {
        Self {
            bus_name: endpoint.bus_name,
            object_path: endpoint.object_path,
        }
    }
}
