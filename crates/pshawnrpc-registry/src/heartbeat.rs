use pshawnrpc_common::protocol::error::{PshawnError, Result};
use pshawnrpc_common::transport::{validate_registry_url, RegistryTransport};
use pshawnrpc_common::DEFAULT_TTL;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Margin between the registry TTL and the derived heartbeat interval.
const SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Retry policy for a single heartbeat.
///
/// A heartbeat that fails with a transient error is retried with exponential
/// backoff up to `max_retries` times. When the retries run out the periodic
/// loop stops for good.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (excluding the initial attempt)
    ///
    /// Zero stops the loop on the first failure.
    /// Default: 3
    pub max_retries: usize,
    /// Initial backoff in milliseconds
    ///
    /// Default: 500ms
    pub initial_backoff_ms: u64,
    /// Maximum backoff in milliseconds
    ///
    /// Default: 30000ms (30 seconds)
    pub max_backoff_ms: u64,
    /// Exponential backoff multiplier
    ///
    /// Default: 2.0 (doubles each time)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries: the first failed heartbeat ends the loop.
    pub fn fail_stop() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Backoff to wait after one that lasted `current_ms`.
    pub fn next_backoff_ms(&self, current_ms: u64) -> u64 {
        std::cmp::min(
            (current_ms as f64 * self.backoff_multiplier) as u64,
            self.max_backoff_ms,
        )
    }
}

/// Heartbeat configuration.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Period between heartbeats. Zero selects [`HeartbeatConfig::default_interval`].
    pub interval: Duration,
    /// Timeout for a single announce request.
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Self::default_interval(),
            request_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }
}

impl HeartbeatConfig {
    /// One minute less than the default registry TTL.
    pub fn default_interval() -> Duration {
        DEFAULT_TTL - SAFETY_MARGIN
    }

    /// Configuration whose interval leaves room for a heartbeat before an
    /// entry registered with `ttl` can expire.
    ///
    /// Uses `ttl - 1min`, or half the TTL when it is a minute or shorter. A
    /// zero TTL never expires, so the default interval is kept.
    pub fn for_registry_ttl(ttl: Duration) -> Self {
        let interval = if ttl.is_zero() {
            Self::default_interval()
        } else if ttl > SAFETY_MARGIN {
            ttl - SAFETY_MARGIN
        } else {
            ttl / 2
        };

        Self {
            interval,
            ..Default::default()
        }
    }

    /// The interval actually used, with zero replaced by the default.
    pub fn effective_interval(&self) -> Duration {
        if self.interval.is_zero() {
            Self::default_interval()
        } else {
            self.interval
        }
    }
}

/// Keeps one server address alive in one registry.
pub struct Heartbeat {
    registry: String,
    addr: String,
    config: HeartbeatConfig,
    transport: RegistryTransport,
}

impl Heartbeat {
    /// Creates a heartbeat for `addr` against the registry URL `registry`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` when `registry` is not an `http://` URL.
    pub fn new(
        registry: impl Into<String>,
        addr: impl Into<String>,
        config: HeartbeatConfig,
    ) -> Result<Self> {
        let registry = registry.into();
        validate_registry_url(&registry)?;

        let transport = RegistryTransport::new(config.request_timeout);
        Ok(Self {
            registry,
            addr: addr.into(),
            config,
            transport,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn interval(&self) -> Duration {
        self.config.effective_interval()
    }

    /// Sends one heartbeat, retrying transient failures with backoff.
    pub async fn beat(&self) -> Result<()> {
        let retry = &self.config.retry;
        let mut backoff_ms = retry.initial_backoff_ms;
        let mut attempt = 0;

        loop {
            debug!("{} send heartbeat to registry {}", self.addr, self.registry);

            match self.transport.announce(&self.registry, &self.addr).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < retry.max_retries && e.is_retryable() => {
                    warn!(
                        "Heartbeat for {} failed (attempt {}): {}, retrying in {}ms",
                        self.addr,
                        attempt + 1,
                        e,
                        backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = retry.next_backoff_ms(backoff_ms);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends the first heartbeat, then keeps beating in a background task.
    ///
    /// A failing first heartbeat is returned to the caller and nothing is
    /// spawned. The background loop runs until the handle is stopped or
    /// dropped, or until a heartbeat exhausts its retries. Stopping also
    /// abandons a heartbeat that is in flight or waiting to retry.
    pub async fn spawn(self) -> Result<HeartbeatHandle> {
        self.beat().await?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let shutdown = async move {
                // A dropped sender also ends the wait
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            };
            self.beat_loop(shutdown).await
        });

        Ok(HeartbeatHandle { shutdown_tx, task })
    }

    /// Sends the first heartbeat, then keeps beating in the current task
    /// until `shutdown` resolves.
    ///
    /// Shutdown also interrupts a heartbeat that is in flight or backing off.
    /// Returns the error that ended the loop, or `Ok(())` on shutdown.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        match self.beat_or_shutdown(shutdown.as_mut()).await {
            Some(result) => result?,
            None => {
                info!("Heartbeat for {} stopped", self.addr);
                return Ok(());
            }
        }
        self.beat_loop(shutdown).await
    }

    /// Runs one heartbeat unless `shutdown` resolves first, in which case
    /// the heartbeat is abandoned and `None` is returned.
    async fn beat_or_shutdown<F>(&self, shutdown: Pin<&mut F>) -> Option<Result<()>>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = shutdown => None,
            result = self.beat() => Some(result),
        }
    }

    async fn beat_loop<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let period = self.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Heartbeat for {} to {} every {:?}",
            self.addr, self.registry, period
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            match self.beat_or_shutdown(shutdown.as_mut()).await {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    error!(
                        "rpc registry: heartbeat for {} to {} failed, no further heartbeats will be sent: {}",
                        self.addr, self.registry, e
                    );
                    return Err(e);
                }
                None => break,
            }
        }

        info!("Heartbeat for {} stopped", self.addr);
        Ok(())
    }
}

/// Handle to a background heartbeat loop.
///
/// Dropping the handle cancels the loop.
pub struct HeartbeatHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl HeartbeatHandle {
    /// Whether the loop has ended, either stopped or after a failure.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the loop and waits for it to end.
    ///
    /// Returns the failure that ended the loop if it stopped on its own first.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.task
            .await
            .map_err(|e| PshawnError::Transport(format!("Heartbeat task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 500);
        assert_eq!(config.max_backoff_ms, 30_000);
        assert_eq!(config.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_fail_stop_has_no_retries() {
        assert_eq!(RetryConfig::fail_stop().max_retries, 0);
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = RetryConfig::default();
        let mut backoff_ms = config.initial_backoff_ms;

        let expected = [500, 1000, 2000, 4000, 8000, 16000, 30000, 30000];

        for expected_ms in expected {
            assert_eq!(backoff_ms, expected_ms);
            backoff_ms = config.next_backoff_ms(backoff_ms);
        }
    }

    #[test]
    fn test_heartbeat_config_default() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.interval, Duration::from_secs(4 * 60));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_interval_derived_from_ttl() {
        assert_eq!(
            HeartbeatConfig::for_registry_ttl(Duration::from_secs(300)).interval,
            Duration::from_secs(240)
        );
        assert_eq!(
            HeartbeatConfig::for_registry_ttl(Duration::from_secs(30)).interval,
            Duration::from_secs(15)
        );
        assert_eq!(
            HeartbeatConfig::for_registry_ttl(Duration::from_millis(200)).interval,
            Duration::from_millis(100)
        );
        assert_eq!(
            HeartbeatConfig::for_registry_ttl(Duration::ZERO).interval,
            HeartbeatConfig::default_interval()
        );
    }

    #[test]
    fn test_derived_interval_is_shorter_than_ttl() {
        for secs in [1, 59, 60, 61, 300, 3600] {
            let ttl = Duration::from_secs(secs);
            assert!(HeartbeatConfig::for_registry_ttl(ttl).interval < ttl);
        }
    }

    #[test]
    fn test_zero_interval_uses_default() {
        let config = HeartbeatConfig {
            interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.effective_interval(), Duration::from_secs(240));
    }

    #[test]
    fn test_heartbeat_rejects_bare_address() {
        let result = Heartbeat::new("127.0.0.1:9999", "S1", HeartbeatConfig::default());
        assert!(matches!(result, Err(PshawnError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_heartbeat_accessors() {
        let heartbeat = Heartbeat::new(
            "http://127.0.0.1:9999/_pshawnrpc_/registry",
            "tcp@127.0.0.1:7001",
            HeartbeatConfig {
                interval: Duration::ZERO,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(heartbeat.addr(), "tcp@127.0.0.1:7001");
        assert_eq!(heartbeat.registry(), "http://127.0.0.1:9999/_pshawnrpc_/registry");
        assert_eq!(heartbeat.interval(), HeartbeatConfig::default_interval());
    }
}
