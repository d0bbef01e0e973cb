use thiserror::Error;

#[derive(Error, Debug)]
pub enum PshawnError {
    #[error("rpc discovery: no available servers")]
    NoAvailableServers,

    #[error("rpc discovery: not supported select mode: {0}")]
    UnsupportedSelectMode(String),

    #[error("Registry unreachable: {0}")]
    RegistryUnreachable(String),

    #[error("Registry responded with status {0}")]
    RegistryStatus(u16),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Malformed announce request: {0}")]
    MalformedAnnounce(String),

    #[error("Invalid registry URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl PshawnError {
    /// Whether a failed registry round trip may succeed if attempted again.
    ///
    /// Connection failures, timeouts and 5xx responses are transient; a 4xx
    /// means the request itself is wrong and repeating it changes nothing.
    pub fn is_retryable(&self) -> bool {
        match self {
            PshawnError::RegistryUnreachable(_) | PshawnError::Timeout(_) => true,
            PshawnError::RegistryStatus(code) => (500..600).contains(code),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PshawnError>;
