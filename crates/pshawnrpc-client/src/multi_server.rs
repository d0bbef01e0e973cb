use async_trait::async_trait;
use pshawnrpc_common::protocol::error::{PshawnError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

use crate::discovery::{Discovery, SelectMode};

/// Mutable selection state, guarded by one lock.
struct SelectionState {
    servers: Vec<String>,
    /// Next round-robin position; always reduced modulo the list length before use
    index: usize,
    rng: StdRng,
}

impl SelectionState {
    fn new(servers: Vec<String>, mut rng: StdRng) -> Self {
        // Random start so clients launched together do not all pick the same server
        let index = rng.gen_range(0..i32::MAX as usize);
        Self {
            servers,
            index,
            rng,
        }
    }

    fn select(&mut self, mode: SelectMode) -> Result<String> {
        let n = self.servers.len();
        if n == 0 {
            return Err(PshawnError::NoAvailableServers);
        }

        match mode {
            SelectMode::Random => {
                let i = self.rng.gen_range(0..n);
                Ok(self.servers[i].clone())
            }
            SelectMode::RoundRobin => {
                let server = self.servers[self.index % n].clone();
                self.index = (self.index + 1) % n;
                Ok(server)
            }
        }
    }
}

/// Discovery over an explicitly supplied address list, without a registry.
///
/// The list only changes through [`Discovery::update`]; `refresh` is a no-op.
pub struct MultiServerDiscovery {
    state: Mutex<SelectionState>,
}

impl MultiServerDiscovery {
    pub fn new(servers: Vec<String>) -> Self {
        Self::with_rng(servers, StdRng::from_entropy())
    }

    /// Creates a discovery driven by `rng`, for reproducible selection.
    pub fn with_rng(servers: Vec<String>, rng: StdRng) -> Self {
        Self {
            state: Mutex::new(SelectionState::new(servers, rng)),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.servers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.servers.is_empty()
    }
}

#[async_trait]
impl Discovery for MultiServerDiscovery {
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    async fn update(&self, servers: Vec<String>) -> Result<()> {
        self.state.lock().await.servers = servers;
        Ok(())
    }

    async fn get(&self, mode: SelectMode) -> Result<String> {
        self.state.lock().await.select(mode)
    }

    async fn get_all(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().await.servers.clone())
    }
}
