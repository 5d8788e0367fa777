//! Server settings from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_ADDR: &str = "0.0.0.0:3030";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid INKBOARD_ADDR {0:?}: {1}")]
    InvalidAddr(String, std::net::AddrParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `INKBOARD_ADDR`, defaults to `0.0.0.0:3030`.
    pub addr: SocketAddr,
    /// `INKBOARD_DATA_DIR`. Boards are kept in memory only when unset.
    pub data_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup. Empty values count as unset.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let addr_text = get("INKBOARD_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_text
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidAddr(addr_text.clone(), e))?;

        Ok(Self {
            addr,
            data_dir: get("INKBOARD_DATA_DIR").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_of(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_of(&[]).unwrap();
        assert_eq!(config.addr, DEFAULT_ADDR.parse::<SocketAddr>().unwrap());
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn test_overrides() {
        let config = config_of(&[
            ("INKBOARD_ADDR", "127.0.0.1:8080"),
            ("INKBOARD_DATA_DIR", "/var/lib/inkboard"),
        ])
        .unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/inkboard")));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = config_of(&[("INKBOARD_ADDR", ""), ("INKBOARD_DATA_DIR", "  ")]).unwrap();
        assert_eq!(config.addr.port(), 3030);
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn test_invalid_addr() {
        let err = config_of(&[("INKBOARD_ADDR", "not-an-addr")]).unwrap_err();
        assert!(err.to_string().contains("not-an-addr"));
    }
}
