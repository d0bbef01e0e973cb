//! PshawnRPC Registry
//!
//! This crate provides the server side of service registration: a TTL-based
//! registry of server addresses, the HTTP control plane that exposes it, and
//! the heartbeat sender RPC servers run to stay registered.

pub mod heartbeat;
pub mod http_server;
pub mod registry;

pub use heartbeat::{Heartbeat, HeartbeatConfig, HeartbeatHandle, RetryConfig};
pub use http_server::{registry_router, RegistryServer};
pub use registry::{Registry, RegistryConfig, ServerItem};
