pub mod error;
pub mod registry;

pub use error::{PshawnError, Result};
pub use registry::{
    join_servers, parse_servers, DEFAULT_PATH, DEFAULT_REFRESH_TIMEOUT, DEFAULT_TTL,
    SERVERS_HEADER, SERVER_HEADER,
};
