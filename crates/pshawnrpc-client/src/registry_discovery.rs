use async_trait::async_trait;
use pshawnrpc_common::protocol::error::Result;
use pshawnrpc_common::transport::{validate_registry_url, RegistryTransport};
use pshawnrpc_common::DEFAULT_REFRESH_TIMEOUT;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::discovery::{Discovery, SelectMode};
use crate::multi_server::MultiServerDiscovery;

/// Configuration for [`RegistryDiscovery`].
#[derive(Debug, Clone)]
pub struct RegistryDiscoveryConfig {
    /// Minimum interval between registry polls
    ///
    /// Zero falls back to the default.
    /// Default: 10 seconds
    pub refresh_timeout: Duration,
    /// Timeout for a single registry request
    ///
    /// Default: 10 seconds
    pub request_timeout: Duration,
}

impl Default for RegistryDiscoveryConfig {
    fn default() -> Self {
        Self {
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Discovery backed by a registry.
///
/// Keeps a cached copy of the registry's alive list and re-polls it lazily:
/// every `get`/`get_all` first calls `refresh`, which only contacts the
/// registry once the cache is older than the refresh timeout. Selection is
/// delegated to an inner [`MultiServerDiscovery`].
///
/// A failed poll is returned to the caller and the cached list is kept as is.
pub struct RegistryDiscovery {
    inner: MultiServerDiscovery,
    registry: String,
    refresh_timeout: Duration,
    /// Time of the last successful refresh or update. Held across the
    /// registry round trip so concurrent callers poll at most once.
    last_update: Mutex<Option<Instant>>,
    transport: RegistryTransport,
}

impl RegistryDiscovery {
    /// Creates a discovery polling `registry`, a full `http://` URL
    /// including the registry path.
    ///
    /// The cache starts empty and stale, so the first selection polls.
    pub fn new(registry: impl Into<String>, config: RegistryDiscoveryConfig) -> Result<Self> {
        Self::with_inner(registry, config, MultiServerDiscovery::new(Vec::new()))
    }

    /// Like [`RegistryDiscovery::new`], selecting through the given `inner`.
    pub fn with_inner(
        registry: impl Into<String>,
        config: RegistryDiscoveryConfig,
        inner: MultiServerDiscovery,
    ) -> Result<Self> {
        let registry = registry.into();
        validate_registry_url(&registry)?;

        let refresh_timeout = if config.refresh_timeout.is_zero() {
            DEFAULT_REFRESH_TIMEOUT
        } else {
            config.refresh_timeout
        };

        Ok(Self {
            inner,
            registry,
            refresh_timeout,
            last_update: Mutex::new(None),
            transport: RegistryTransport::new(config.request_timeout),
        })
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn refresh_timeout(&self) -> Duration {
        self.refresh_timeout
    }

    fn is_fresh(&self, last_update: Option<Instant>, now: Instant) -> bool {
        match last_update {
            Some(at) => now.saturating_duration_since(at) < self.refresh_timeout,
            None => false,
        }
    }
}

#[async_trait]
impl Discovery for RegistryDiscovery {
    async fn refresh(&self) -> Result<()> {
        let mut last_update = self.last_update.lock().await;
        if self.is_fresh(*last_update, Instant::now()) {
            return Ok(());
        }

        debug!("polling registry {}", self.registry);
        let servers = match self.transport.query(&self.registry).await {
            Ok(servers) => servers,
            Err(e) => {
                warn!("failed to refresh servers from registry {}: {}", self.registry, e);
                return Err(e);
            }
        };
        debug!("registry {} returned {} server(s)", self.registry, servers.len());

        self.inner.update(servers).await?;
        *last_update = Some(Instant::now());
        Ok(())
    }

    async fn update(&self, servers: Vec<String>) -> Result<()> {
        let mut last_update = self.last_update.lock().await;
        self.inner.update(servers).await?;
        *last_update = Some(Instant::now());
        Ok(())
    }

    async fn get(&self, mode: SelectMode) -> Result<String> {
        self.refresh().await?;
        self.inner.get(mode).await
    }

    async fn get_all(&self) -> Result<Vec<String>> {
        self.refresh().await?;
        self.inner.get_all().await
    }
}
