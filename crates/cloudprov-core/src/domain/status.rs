//! Provider sync status
//!
//! The wire format carries a bare `i32`; this module owns the mapping
//! between that integer and [`ProviderStatus`].

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Sync status reported by a cloud provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// No successful status reply yet
    #[default]
    Invalid,
    /// Provider is up to date
    Idle,
    /// Provider is transferring files
    Syncing,
    /// Provider reported an error of its own
    Error,
}

impl ProviderStatus {
    /// All variants in wire order
    pub const ALL: [ProviderStatus; 4] = [
        ProviderStatus::Invalid,
        ProviderStatus::Idle,
        ProviderStatus::Syncing,
        ProviderStatus::Error,
    ];

    /// Integer value used on the wire
    pub fn to_wire(self) -> i32 {
        match self {
            ProviderStatus::Invalid => 0,
            ProviderStatus::Idle => 1,
            ProviderStatus::Syncing => 2,
            ProviderStatus::Error => 3,
        }
    }

    /// Decodes a wire integer
    ///
    /// # Errors
    /// Returns [`DomainError::UnknownStatus`] for values outside `0..=3`.
    pub fn from_wire(value: i32) -> Result<Self, DomainError> {
        match value {
            0 => Ok(ProviderStatus::Invalid),
            1 => Ok(ProviderStatus::Idle),
            2 => Ok(ProviderStatus::Syncing),
            3 => Ok(ProviderStatus::Error),
            other => Err(DomainError::UnknownStatus(other)),
        }
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderStatus::Invalid => "invalid",
            ProviderStatus::Idle => "idle",
            ProviderStatus::Syncing => "syncing",
            ProviderStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ProviderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "invalid" => Ok(ProviderStatus::Invalid),
            "idle" => Ok(ProviderStatus::Idle),
            "syncing" => Ok(ProviderStatus::Syncing),
            "error" => Ok(ProviderStatus::Error),
            _ => Err(DomainError::InvalidStatusName(s.to_string())),
        }
    }
}
