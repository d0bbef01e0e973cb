use async_trait::async_trait;
use pshawnrpc_common::protocol::error::{PshawnError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Policy for picking one server out of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectMode {
    /// Uniformly random server on every call
    Random,
    /// Servers in turn, starting from a random position
    RoundRobin,
}

impl fmt::Display for SelectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectMode::Random => write!(f, "random"),
            SelectMode::RoundRobin => write!(f, "round-robin"),
        }
    }
}

impl FromStr for SelectMode {
    type Err = PshawnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(SelectMode::Random),
            "round-robin" | "round_robin" | "roundrobin" => Ok(SelectMode::RoundRobin),
            other => Err(PshawnError::UnsupportedSelectMode(other.to_string())),
        }
    }
}

impl TryFrom<u8> for SelectMode {
    type Error = PshawnError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SelectMode::Random),
            1 => Ok(SelectMode::RoundRobin),
            other => Err(PshawnError::UnsupportedSelectMode(other.to_string())),
        }
    }
}

/// Source of server addresses for RPC calls.
///
/// Implementations must be safe to share between concurrent callers; each
/// operation observes the address list either entirely before or entirely
/// after any concurrent update.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Re-synchronizes the address list from the backing source, if any.
    async fn refresh(&self) -> Result<()>;

    /// Replaces the address list wholesale.
    async fn update(&self, servers: Vec<String>) -> Result<()>;

    /// Selects one server under `mode`.
    ///
    /// Fails with `NoAvailableServers` when the list is empty.
    async fn get(&self, mode: SelectMode) -> Result<String>;

    /// Returns a copy of the whole address list, in order.
    async fn get_all(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_mode_from_str() {
        assert_eq!("random".parse::<SelectMode>().unwrap(), SelectMode::Random);
        assert_eq!(
            "round-robin".parse::<SelectMode>().unwrap(),
            SelectMode::RoundRobin
        );
        assert_eq!(
            "RoundRobin".parse::<SelectMode>().unwrap(),
            SelectMode::RoundRobin
        );
    }

    #[test]
    fn test_unsupported_select_mode() {
        match "weighted".parse::<SelectMode>() {
            Err(PshawnError::UnsupportedSelectMode(mode)) => assert_eq!(mode, "weighted"),
            other => panic!("expected UnsupportedSelectMode, got {:?}", other),
        }
        assert!(matches!(
            SelectMode::try_from(7),
            Err(PshawnError::UnsupportedSelectMode(_))
        ));
    }

    #[test]
    fn test_select_mode_from_u8() {
        assert_eq!(SelectMode::try_from(0).unwrap(), SelectMode::Random);
        assert_eq!(SelectMode::try_from(1).unwrap(), SelectMode::RoundRobin);
    }

    #[test]
    fn test_select_mode_display_parses_back() {
        for mode in [SelectMode::Random, SelectMode::RoundRobin] {
            assert_eq!(mode.to_string().parse::<SelectMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_select_mode_serde() {
        assert_eq!(
            serde_json::to_string(&SelectMode::RoundRobin).unwrap(),
            "\"round-robin\""
        );
        let mode: SelectMode = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(mode, SelectMode::Random);
    }
}
