//! Process settings from the environment (after `.env` is loaded).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SPEC_PATH: &str = "autocrud.json";
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    pub spec_path: PathBuf,
    pub bind: SocketAddr,
    /// Pool size per backing service.
    pub max_connections: u32,
    /// Deadline applied to every backing-store statement.
    pub statement_timeout: Duration,
    pub body_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            spec_path: PathBuf::from(DEFAULT_SPEC_PATH),
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            statement_timeout: Duration::from_secs(DEFAULT_STATEMENT_TIMEOUT_SECS),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Settings {
    /// `AUTOCRUD_SPEC`, `AUTOCRUD_BIND`, `AUTOCRUD_MAX_CONNECTIONS`,
    /// `AUTOCRUD_STATEMENT_TIMEOUT_SECS`, `AUTOCRUD_BODY_LIMIT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let spec_path = lookup("AUTOCRUD_SPEC")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SPEC_PATH));
        let bind = parse_or(&lookup, "AUTOCRUD_BIND", || {
            SocketAddr::from_str(DEFAULT_BIND).map_err(|e| ConfigError::Load(e.to_string()))
        })?;
        let max_connections = parse_or(&lookup, "AUTOCRUD_MAX_CONNECTIONS", || {
            Ok(DEFAULT_MAX_CONNECTIONS)
        })?;
        let timeout_secs: u64 = parse_or(&lookup, "AUTOCRUD_STATEMENT_TIMEOUT_SECS", || {
            Ok(DEFAULT_STATEMENT_TIMEOUT_SECS)
        })?;
        let body_limit = parse_or(&lookup, "AUTOCRUD_BODY_LIMIT", || Ok(DEFAULT_BODY_LIMIT))?;
        if max_connections == 0 || timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "pool size and statement timeout must be positive".into(),
            ));
        }
        Ok(Settings {
            spec_path,
            bind,
            max_connections,
            statement_timeout: Duration::from_secs(timeout_secs),
            body_limit,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: impl FnOnce() -> Result<T, ConfigError>,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Load(format!("{} has an invalid value: {}", key, raw))),
        None => default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s.bind.port(), 3000);
        assert_eq!(s.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(s.spec_path, PathBuf::from(DEFAULT_SPEC_PATH));
    }

    #[test]
    fn overrides_are_parsed() {
        let s = Settings::from_lookup(lookup(&[
            ("AUTOCRUD_BIND", "127.0.0.1:8080"),
            ("AUTOCRUD_STATEMENT_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(s.bind.port(), 8080);
        assert_eq!(s.statement_timeout, Duration::from_secs(5));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(Settings::from_lookup(lookup(&[("AUTOCRUD_MAX_CONNECTIONS", "lots")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("AUTOCRUD_MAX_CONNECTIONS", "0")])).is_err());
    }
}
