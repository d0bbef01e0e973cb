//! Registry control-plane protocol
//!
//! Header names, well-known defaults, and the codec for the comma-joined
//! server list carried in [`SERVERS_HEADER`].

use std::time::Duration;

/// Response header carrying the alive server list of a query.
pub const SERVERS_HEADER: &str = "X-Pshawnrpc-Servers";

/// Request header carrying the announcing server address of a heartbeat.
pub const SERVER_HEADER: &str = "X-Pshawnrpc-Server";

/// Path the registry handler is mounted at unless configured otherwise.
pub const DEFAULT_PATH: &str = "/_pshawnrpc_/registry";

/// Time after which a registry entry expires without a heartbeat.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Minimum interval between two registry polls of one discovery instance.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Joins server addresses into a single header value.
///
/// An empty list becomes the empty string.
pub fn join_servers(servers: &[String]) -> String {
    servers.join(",")
}

/// Parses a comma-joined header value into server addresses.
///
/// Tokens are trimmed and empty tokens dropped, so a trailing comma or stray
/// whitespace never yields a phantom empty address.
///
/// # Example
///
/// ```
/// use pshawnrpc_common::parse_servers;
///
/// assert_eq!(parse_servers("a, b ,,c"), vec!["a", "b", "c"]);
/// assert!(parse_servers("").is_empty());
/// ```
pub fn parse_servers(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|server| !server.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_drops_empty_tokens() {
        assert_eq!(parse_servers("a, b ,,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_empty_value() {
        assert!(parse_servers("").is_empty());
        assert!(parse_servers(" , ,").is_empty());
    }

    #[test]
    fn test_parse_trailing_comma() {
        assert_eq!(
            parse_servers("tcp@127.0.0.1:7001,"),
            vec!["tcp@127.0.0.1:7001"]
        );
    }

    #[test]
    fn test_join_servers() {
        let servers = vec!["S1".to_string(), "S2".to_string()];
        assert_eq!(join_servers(&servers), "S1,S2");
        assert_eq!(join_servers(&[]), "");
    }

    #[test]
    fn test_join_then_parse_keeps_order() {
        let servers = vec!["b:2".to_string(), "a:1".to_string(), "c:3".to_string()];
        assert_eq!(parse_servers(&join_servers(&servers)), servers);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(DEFAULT_TTL, Duration::from_secs(300));
        assert_eq!(DEFAULT_REFRESH_TIMEOUT, Duration::from_secs(10));
        assert_eq!(DEFAULT_PATH, "/_pshawnrpc_/registry");
    }
}
