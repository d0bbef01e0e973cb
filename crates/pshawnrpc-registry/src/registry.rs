use pshawnrpc_common::{DEFAULT_PATH, DEFAULT_TTL};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long an entry stays alive without a heartbeat. Zero never expires.
    pub ttl: Duration,
    /// Path the control-plane handler is mounted at.
    pub path: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            path: DEFAULT_PATH.to_string(),
        }
    }
}

/// A registered server instance.
#[derive(Debug, Clone)]
pub struct ServerItem {
    pub addr: String,
    /// Time of the initial registration or the most recent heartbeat
    pub last_seen: Instant,
}

impl ServerItem {
    pub fn new(addr: String, now: Instant) -> Self {
        Self {
            addr,
            last_seen: now,
        }
    }

    /// Whether the entry is still alive at `now` under `ttl`.
    pub fn is_alive(&self, ttl: Duration, now: Instant) -> bool {
        if ttl.is_zero() {
            return true;
        }
        match self.last_seen.checked_add(ttl) {
            Some(deadline) => now < deadline,
            None => true,
        }
    }
}

/// TTL-based directory of server addresses.
///
/// Entries are created by the first heartbeat for an address and refreshed by
/// every later one. Expired entries are evicted lazily while computing the
/// alive set; there is no background sweeper. All access to the entry map goes
/// through one mutex, so eviction and the alive scan share a single critical
/// section.
pub struct Registry {
    config: RegistryConfig,
    /// Keyed by address; the ordered map makes the alive list sorted for free
    servers: Mutex<BTreeMap<String, ServerItem>>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            servers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Creates a registry with the default path and the given TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(RegistryConfig {
            ttl,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Registers `addr`, or refreshes its last-seen time if already known.
    pub async fn register_or_refresh(&self, addr: &str) {
        let now = Instant::now();
        let mut servers = self.servers.lock().await;
        match servers.get_mut(addr) {
            Some(item) => item.last_seen = now,
            None => {
                debug!("Registered new server {}", addr);
                servers.insert(addr.to_string(), ServerItem::new(addr.to_string(), now));
            }
        }
    }

    /// Returns the sorted addresses of all alive servers.
    ///
    /// Expired entries found during the scan are removed in the same pass and
    /// stay gone until announced again.
    pub async fn alive_servers(&self) -> Vec<String> {
        let now = Instant::now();
        let ttl = self.ttl();
        let mut servers = self.servers.lock().await;

        servers.retain(|addr, item| {
            let alive = item.is_alive(ttl, now);
            if !alive {
                debug!("Evicting expired server {}", addr);
            }
            alive
        });

        servers.keys().cloned().collect()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.servers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.servers.lock().await.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
