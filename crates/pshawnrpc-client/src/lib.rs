//! PshawnRPC Client Discovery
//!
//! Client-side service discovery: the [`Discovery`] capability an RPC client
//! uses to pick a server for a call, with two implementations.
//!
//! - [`MultiServerDiscovery`] selects from an explicitly supplied list
//! - [`RegistryDiscovery`] keeps that list in sync with a registry, polling it
//!   at most once per refresh timeout

pub mod discovery;
pub mod multi_server;
pub mod registry_discovery;

pub use discovery::{Discovery, SelectMode};
pub use multi_server::MultiServerDiscovery;
pub use registry_discovery::{RegistryDiscovery, RegistryDiscoveryConfig};
