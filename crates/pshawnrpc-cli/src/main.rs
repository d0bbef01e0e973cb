//! # PshawnRPC CLI Entry Point
//!
//! Runs the registry and heartbeat sides of PshawnRPC service discovery, and
//! queries discovery from the command line.
//!
//! ## Usage
//!
//! ```bash
//! # Start a registry
//! pshawnrpc registry -b 0.0.0.0:9999 --ttl-secs 300
//!
//! # Keep a server alive in the registry
//! pshawnrpc heartbeat --registry http://127.0.0.1:9999/_pshawnrpc_/registry --addr 10.0.0.1:8080
//!
//! # Pick a server (outputs raw JSON)
//! pshawnrpc discover --registry http://127.0.0.1:9999/_pshawnrpc_/registry --mode round-robin
//!
//! # Pick from a static list
//! pshawnrpc discover -s 10.0.0.1:8080 -s 10.0.0.2:8080 --count 4
//! ```
//!
//! ## URL Format
//!
//! Registry URLs are full `http://` URLs including the registry path:
//! - ✅ `http://127.0.0.1:9999/_pshawnrpc_/registry`
//! - ❌ `127.0.0.1:9999`

use anyhow::Result;
use argh::FromArgs;
use pshawnrpc_client::{
    Discovery, MultiServerDiscovery, RegistryDiscovery, RegistryDiscoveryConfig, SelectMode,
};
use pshawnrpc_common::transport::validate_registry_url;
use pshawnrpc_common::DEFAULT_PATH;
use pshawnrpc_registry::{
    Heartbeat, HeartbeatConfig, Registry, RegistryConfig, RegistryServer, RetryConfig,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;


/// Validates a registry URL, naming what it is for in the error.
fn validate_http_url(url: &str, description: &str) -> Result<()> {
    validate_registry_url(url).map_err(|e| anyhow::anyhow!("Invalid {}: {}", description, e))
}

#[derive(FromArgs)]
/// PshawnRPC - service registry and discovery
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

/// Available CLI subcommands.
///
/// - **Registry**: serve a TTL-based server registry
/// - **Heartbeat**: announce one address to a registry periodically
/// - **Discover**: select servers (unix-friendly JSON output)
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Registry(RegistryArgs),
    Heartbeat(HeartbeatArgs),
    Discover(DiscoverArgs),
}

/// Arguments for serving a registry.
///
/// # Example
///
/// ```bash
/// pshawnrpc registry -b 0.0.0.0:9999 --ttl-secs 60
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "registry")]
/// start a server registry
struct RegistryArgs {
    /// address to bind the registry's HTTP server to
    #[argh(option, short = 'b', default = "\"0.0.0.0:9999\".into()")]
    bind: String,

    /// seconds a server stays alive after its last heartbeat
    ///
    /// Zero keeps servers forever. Defaults to 300 (5 minutes).
    #[argh(option, long = "ttl-secs", default = "300")]
    ttl_secs: u64,

    /// path the registry is served on
    #[argh(option, long = "path", default = "DEFAULT_PATH.into()")]
    path: String,
}

/// Arguments for sending heartbeats.
///
/// Runs until Ctrl-C. Exits with an error when a heartbeat fails after all
/// retries, since no further heartbeats are sent from then on.
#[derive(FromArgs)]
#[argh(subcommand, name = "heartbeat")]
/// keep a server address alive in a registry
struct HeartbeatArgs {
    /// registry URL, including the registry path
    #[argh(option, long = "registry")]
    registry: String,

    /// address to announce
    #[argh(option, long = "addr")]
    addr: String,

    /// seconds between heartbeats
    ///
    /// Zero uses the default of 240 (one minute less than the default TTL).
    #[argh(option, long = "interval-secs", default = "0")]
    interval_secs: u64,

    /// retries for a failing heartbeat before giving up
    #[argh(option, long = "max-retries", default = "3")]
    max_retries: usize,
}

/// Arguments for querying discovery.
///
/// Servers come either from a registry or from repeated `-s` options. The
/// selections are written to stdout as a JSON array.
#[derive(FromArgs)]
#[argh(subcommand, name = "discover")]
/// select servers from a registry or a static list
struct DiscoverArgs {
    /// registry URL, including the registry path
    #[argh(option, long = "registry")]
    registry: Option<String>,

    /// static server address; may be repeated
    #[argh(option, short = 's', long = "server")]
    servers: Vec<String>,

    /// selection mode: random or round-robin
    #[argh(option, long = "mode", default = "SelectMode::Random")]
    mode: SelectMode,

    /// number of selections to make
    #[argh(option, long = "count", default = "1")]
    count: usize,

    /// print every known server instead of selecting
    #[argh(switch, long = "all")]
    all: bool,

    /// minimum seconds between registry polls
    #[argh(option, long = "refresh-timeout-secs", default = "10")]
    refresh_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // discover keeps stdout clean for piping
    if !matches!(cli.command, Commands::Discover(_)) {
        // Set default log level to INFO, but allow RUST_LOG env var to override
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Registry(args) => run_registry(args).await,
        Commands::Heartbeat(args) => run_heartbeat(args).await,
        Commands::Discover(args) => {
            let selected = discover(&args).await?;
            println!("{}", serde_json::to_string(&selected)?);
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn run_registry(args: RegistryArgs) -> Result<()> {
    let addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", args.bind, e))?;

    let config = RegistryConfig {
        ttl: Duration::from_secs(args.ttl_secs),
        path: args.path,
    };
    tracing::info!("Starting registry on {} with TTL {:?}", addr, config.ttl);

    let server = RegistryServer::new(Arc::new(Registry::new(config)));
    server.run_until(addr, shutdown_signal()).await?;
    Ok(())
}

fn heartbeat_config(args: &HeartbeatArgs) -> HeartbeatConfig {
    HeartbeatConfig {
        interval: Duration::from_secs(args.interval_secs),
        retry: RetryConfig {
            max_retries: args.max_retries,
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn run_heartbeat(args: HeartbeatArgs) -> Result<()> {
    validate_http_url(&args.registry, "registry URL")?;

    let heartbeat = Heartbeat::new(&args.registry, &args.addr, heartbeat_config(&args))?;
    tracing::info!(
        "Announcing {} to {} every {:?}",
        heartbeat.addr(),
        heartbeat.registry(),
        heartbeat.interval()
    );

    heartbeat.run_until(shutdown_signal()).await?;
    Ok(())
}

/// Builds the discovery selected by `args`.
fn build_discovery(args: &DiscoverArgs) -> Result<Box<dyn Discovery>> {
    match (&args.registry, args.servers.is_empty()) {
        (Some(_), false) => Err(anyhow::anyhow!(
            "--registry and --server are mutually exclusive"
        )),
        (Some(registry), true) => {
            validate_http_url(registry, "registry URL")?;
            let config = RegistryDiscoveryConfig {
                refresh_timeout: Duration::from_secs(args.refresh_timeout_secs),
                ..Default::default()
            };
            Ok(Box::new(RegistryDiscovery::new(registry.as_str(), config)?))
        }
        (None, false) => Ok(Box::new(MultiServerDiscovery::new(args.servers.clone()))),
        (None, true) => Err(anyhow::anyhow!(
            "No servers to discover from: pass --registry or at least one --server"
        )),
    }
}

/// Executes the `discover` subcommand, returning what it prints.
async fn discover(args: &DiscoverArgs) -> Result<Vec<String>> {
    let discovery = build_discovery(args)?;

    if args.all {
        return Ok(discovery.get_all().await?);
    }

    let mut selected = Vec::with_capacity(args.count);
    for _ in 0..args.count {
        selected.push(discovery.get(args.mode).await?);
    }
    Ok(selected)
}
