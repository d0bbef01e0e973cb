//! PshawnRPC Common Types and Transport
//!
//! This crate provides the shared pieces of the PshawnRPC service registry:
//! the error type, the control-plane wire protocol, and the HTTP transport
//! used by both the heartbeat sender and registry-backed discovery.
//!
//! # Overview
//!
//! The registry speaks a tiny protocol carried entirely in HTTP headers:
//!
//! - **Query**: `GET <path>` answers with `X-Pshawnrpc-Servers: a,b,c`
//! - **Announce**: `POST <path>` with `X-Pshawnrpc-Server: addr` refreshes `addr`
//!
//! # Components
//!
//! - [`protocol`] - Error type, header names, defaults and the header codec
//! - [`transport`] - HTTP client for issuing query and announce requests
//!
//! # Example
//!
//! ```no_run
//! use pshawnrpc_common::transport::RegistryTransport;
//! use std::time::Duration;
//!
//! # async fn run() -> pshawnrpc_common::Result<()> {
//! let transport = RegistryTransport::new(Duration::from_secs(10));
//! let registry = "http://127.0.0.1:9999/_pshawnrpc_/registry";
//!
//! transport.announce(registry, "tcp@127.0.0.1:7001").await?;
//! let servers = transport.query(registry).await?;
//! # Ok(())
//! # }
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
