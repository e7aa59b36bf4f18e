//! Cached provider state

use serde::{Deserialize, Serialize};

use super::status::ProviderStatus;

/// Opaque icon reference a richer provider could expose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconHandle(pub String);

/// Opaque menu reference a richer provider could expose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuHandle(pub String);

/// Last known values reported by one provider
///
/// `name` stays `None` and `status` stays [`ProviderStatus::Invalid`] until
/// the corresponding query has succeeded once. `icon` and `menu` are never
/// populated by the two-method protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderState {
    pub name: Option<String>,
    pub status: ProviderStatus,
    pub icon: Option<IconHandle>,
    pub menu: Option<MenuHandle>,
}

impl ProviderState {
    /// Whether both queries have produced a usable value
    pub fn is_populated(&self) -> bool {
        self.name.is_some() && self.status != ProviderStatus::Invalid
    }
}
