use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reads `key`, falling back to `default` when unset or empty.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Reads and parses `key`. Unset means `default`; an unparsable value is a
/// configuration error rather than a silent fallback.
pub fn env_parse<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|e| {
            AppError::Configuration(format!("{} has invalid value '{}': {}", key, raw, e))
        }),
        _ => Ok(default),
    }
}

/// Comma separated list, trimmed, empty entries dropped.
pub fn env_list(key: &str, default: &str) -> Vec<String> {
    env_or(key, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_defaults_when_unset() {
        let port: u16 = env_parse("COMMON_TEST_UNSET_PORT", 8010).unwrap();
        assert_eq!(port, 8010);
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("COMMON_TEST_BAD_PORT", "eighty");
        let result: Result<u16, _> = env_parse("COMMON_TEST_BAD_PORT", 8010);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_env_list_splits_and_trims() {
        std::env::set_var("COMMON_TEST_ORIGINS", " http://a.test , ,http://b.test");
        assert_eq!(
            env_list("COMMON_TEST_ORIGINS", ""),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn test_bind_address() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9000,
            cors_origins: vec![],
        };
        assert_eq!(server.bind_address(), "127.0.0.1:9000");
    }
}
