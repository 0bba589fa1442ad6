use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Server settings, read from the environment (and `.env`, loaded by main).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub jwt_secret: String,
    /// Token lifetime; `None` issues non-expiring tokens
    pub jwt_ttl: Option<Duration>,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using an insecure development secret");
            DEV_JWT_SECRET.to_string()
        });

        let jwt_ttl = get("JWT_TTL_SECS")
            .map(|v| v.parse::<u64>().with_context(|| format!("Invalid JWT_TTL_SECS '{}'", v)))
            .transpose()?
            .map(Duration::from_secs);

        let port = match get("PORT") {
            Some(v) => v.parse().with_context(|| format!("Invalid PORT '{}'", v))?,
            None => 5000,
        };

        Ok(Self {
            database_path: PathBuf::from(get("DATABASE_PATH").unwrap_or_else(|| "parlor.db".into())),
            jwt_secret,
            jwt_ttl,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.database_path, PathBuf::from("parlor.db"));
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert!(config.jwt_ttl.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("DATABASE_PATH", "/tmp/chat.db"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_TTL_SECS", "3600"),
        ])
        .unwrap();
        assert_eq!(config.addr().unwrap(), "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.database_path, PathBuf::from("/tmp/chat.db"));
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.jwt_ttl, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn empty_values_fall_back() {
        let config = config(&[("PORT", ""), ("JWT_SECRET", "")]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(config(&[("PORT", "http")]).is_err());
        assert!(config(&[("JWT_TTL_SECS", "-5")]).is_err());
    }
}
