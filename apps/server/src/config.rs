//! Process configuration, read once from `PLANSYNC_*` environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8088";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 3_600;
const MIN_PRUNE_INTERVAL_SECS: u64 = 60;
const MAX_PRUNE_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub data_dir: String,
    pub environment: Environment,
    /// Base URL handed out in share links instead of probing.
    pub public_url: Option<String>,
    pub prune_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Values are trimmed and
    /// empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let listen_addr = get("PLANSYNC_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("PLANSYNC_LISTEN_ADDR", e.to_string()))?;

        let data_dir = get("PLANSYNC_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());

        let environment = match get("PLANSYNC_ENV") {
            Some(value) => Environment::parse(&value).ok_or_else(|| {
                ConfigError::invalid(
                    "PLANSYNC_ENV",
                    format!("expected development or production, got '{}'", value),
                )
            })?,
            None => Environment::Development,
        };

        let public_url = get("PLANSYNC_PUBLIC_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let prune_secs = match get("PLANSYNC_PRUNE_INTERVAL_SECS") {
            Some(value) => value.parse::<u64>().map_err(|e| {
                ConfigError::invalid("PLANSYNC_PRUNE_INTERVAL_SECS", e.to_string())
            })?,
            None => DEFAULT_PRUNE_INTERVAL_SECS,
        }
        .clamp(MIN_PRUNE_INTERVAL_SECS, MAX_PRUNE_INTERVAL_SECS);

        Ok(Self {
            listen_addr,
            data_dir,
            environment,
            public_url,
            prune_interval: Duration::from_secs(prune_secs),
        })
    }

    /// Cookies are marked `Secure` everywhere except local development.
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = from_pairs(&[]).expect("config");
        assert_eq!(config.listen_addr, "0.0.0.0:8088".parse::<SocketAddr>().expect("addr"));
        assert_eq!(config.data_dir, "./data");
        assert_eq!(config.environment, Environment::Development);
        assert!(config.public_url.is_none());
        assert_eq!(config.prune_interval, Duration::from_secs(3_600));
        assert!(!config.secure_cookies());
    }

    #[test]
    fn values_are_trimmed_and_empty_means_unset() {
        let config = from_pairs(&[
            ("PLANSYNC_PUBLIC_URL", "  https://plans.example.com//  "),
            ("PLANSYNC_DATA_DIR", "   "),
            ("PLANSYNC_ENV", " Production "),
        ])
        .expect("config");
        assert_eq!(
            config.public_url.as_deref(),
            Some("https://plans.example.com")
        );
        assert_eq!(config.data_dir, "./data");
        assert!(config.secure_cookies());
    }

    #[test]
    fn prune_interval_is_clamped() {
        let low = from_pairs(&[("PLANSYNC_PRUNE_INTERVAL_SECS", "5")]).expect("config");
        assert_eq!(low.prune_interval, Duration::from_secs(60));
        let high = from_pairs(&[("PLANSYNC_PRUNE_INTERVAL_SECS", "999999")]).expect("config");
        assert_eq!(high.prune_interval, Duration::from_secs(86_400));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = from_pairs(&[("PLANSYNC_ENV", "staging")]).expect_err("bad env");
        assert!(err.to_string().contains("PLANSYNC_ENV"));
        let err = from_pairs(&[("PLANSYNC_LISTEN_ADDR", "nowhere")]).expect_err("bad addr");
        assert!(err.to_string().contains("PLANSYNC_LISTEN_ADDR"));
    }
}
