//! Integration tests for cloudprov-manager
//!
//! Drives proxies and the manager through a scripted connector whose
//! replies are released by the test, so reply ordering and in-flight
//! behavior can be checked deterministically.

mod common;

mod test_manager;
mod test_proxy;
