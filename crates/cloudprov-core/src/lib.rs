//! cloudprov Core - Domain types and port definitions
//!
//! This crate contains the transport-independent core of the cloud provider
//! status protocol:
//! - **Domain** - `ProviderEndpoint`, `ProviderStatus`, `ProviderState`
//! - **Port definitions** - `IProviderConnector` and `IProviderChannel`, the
//!   traits the D-Bus adapter (and test doubles) implement
//! - **Configuration** - the YAML configuration shared by the binaries
//!
//! # Architecture
//!
//! Same ports & adapters split as the rest of the workspace: the domain
//! module has no I/O, ports describe what the proxy layer needs from an IPC
//! transport, and adapter crates provide the implementations.

pub mod config;
pub mod domain;
pub mod ports;
