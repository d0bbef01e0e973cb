//! PshawnRPC Transport Layer
//!
//! HTTP client side of the registry control plane.
//!
//! # Components
//!
//! - **[`RegistryTransport`]**: issues query (`GET`) and announce (`POST`)
//!   requests against a registry URL, each bounded by a request timeout
//! - **[`validate_registry_url`]**: rejects endpoints the transport cannot reach
//!
//! Failures are reported as [`PshawnError`](crate::PshawnError) values:
//! connection problems as `RegistryUnreachable`, non-2xx answers as
//! `RegistryStatus`, and slow registries as `Timeout`.

pub mod http;

pub use http::{validate_registry_url, RegistryTransport};
