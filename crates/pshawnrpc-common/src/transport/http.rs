use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use crate::protocol::error::{PshawnError, Result};
use crate::protocol::registry::{parse_servers, SERVERS_HEADER, SERVER_HEADER};

/// Validates that a registry endpoint is a plain `http://` URL.
///
/// # Errors
///
/// Returns `PshawnError::InvalidUrl` for any other scheme or a bare address.
pub fn validate_registry_url(url: &str) -> Result<()> {
    if url.starts_with("http://") {
        Ok(())
    } else {
        Err(PshawnError::InvalidUrl(format!(
            "'{}' must start with http://",
            url
        )))
    }
}

/// HTTP client for the registry control plane.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct RegistryTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl RegistryTransport {
    /// Creates a transport whose requests fail with `Timeout` after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client, timeout }
    }

    /// Asks the registry for its alive servers.
    ///
    /// A response without the servers header is treated as an empty list.
    pub async fn query(&self, registry: &str) -> Result<Vec<String>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(registry)
            .body(Full::new(Bytes::new()))
            .map_err(|e| PshawnError::InvalidUrl(format!("{}: {}", registry, e)))?;

        let response = self.send(request).await?;

        match response.headers().get(SERVERS_HEADER) {
            Some(value) => {
                let value = value.to_str().map_err(|e| {
                    PshawnError::InvalidResponse(format!("{} header: {}", SERVERS_HEADER, e))
                })?;
                Ok(parse_servers(value))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Announces `addr` to the registry, creating or refreshing its entry.
    pub async fn announce(&self, registry: &str, addr: &str) -> Result<()> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(registry)
            .header(SERVER_HEADER, addr)
            .body(Full::new(Bytes::new()))
            .map_err(|e| PshawnError::InvalidUrl(format!("{}: {}", registry, e)))?;

        self.send(request).await?;
        Ok(())
    }

    async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<hyper::Response<hyper::body::Incoming>> {
        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| PshawnError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(|e| PshawnError::RegistryUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PshawnError::RegistryStatus(status.as_u16()));
        }

        Ok(response)
    }
}
