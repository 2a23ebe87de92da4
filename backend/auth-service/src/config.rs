/// Configuration management
///
/// Every setting is read from an `AUTH_`-prefixed environment variable and has
/// a default, so an empty environment yields a working single-node service.
use chrono::Duration;
use crypto_core::{HashParams, KeyRing, SigningKey};
use serde::Deserialize;
use std::fmt;

use crate::security::PasswordPolicy;
use crate::services::{EngineSettings, LockoutPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// Postgres URL; the in-memory store is used when unset
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    /// HMAC secret; an ephemeral random key is generated when unset
    #[serde(default)]
    pub signing_key: Option<String>,
    #[serde(default = "default_signing_key_version")]
    pub signing_key_version: u32,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,

    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    #[serde(default = "default_hash_parallelism")]
    pub hash_parallelism: u32,

    #[serde(default = "default_lockout_threshold")]
    pub lockout_threshold: u32,
    #[serde(default = "default_lockout_window_secs")]
    pub lockout_window_secs: i64,

    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    #[serde(default = "default_password_min_char_classes")]
    pub password_min_char_classes: u8,
    #[serde(default)]
    pub password_min_score: Option<u8>,

    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_revocation_sweep_secs")]
    pub revocation_sweep_secs: u64,

    /// Shared secret for the admin routes; they are disabled when unset
    #[serde(default)]
    pub admin_key: Option<String>,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    5
}

fn default_signing_key_version() -> u32 {
    1
}

fn default_token_ttl_secs() -> i64 {
    3600
}

fn default_hash_memory_kib() -> u32 {
    19456
}

fn default_hash_iterations() -> u32 {
    2
}

fn default_hash_parallelism() -> u32 {
    1
}

fn default_lockout_threshold() -> u32 {
    5
}

fn default_lockout_window_secs() -> i64 {
    900
}

fn default_password_min_length() -> usize {
    8
}

fn default_password_min_char_classes() -> u8 {
    3
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_revocation_sweep_secs() -> u64 {
    60
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("database_max_connections", &self.database_max_connections)
            .field("signing_key", &redact(&self.signing_key))
            .field("signing_key_version", &self.signing_key_version)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("hash_memory_kib", &self.hash_memory_kib)
            .field("hash_iterations", &self.hash_iterations)
            .field("hash_parallelism", &self.hash_parallelism)
            .field("lockout_threshold", &self.lockout_threshold)
            .field("lockout_window_secs", &self.lockout_window_secs)
            .field("password_min_length", &self.password_min_length)
            .field("password_min_char_classes", &self.password_min_char_classes)
            .field("password_min_score", &self.password_min_score)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("revocation_sweep_secs", &self.revocation_sweep_secs)
            .field("admin_key", &redact(&self.admin_key))
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load from an explicit set of variables
    ///
    /// A bare `PORT` is honored when `AUTH_SERVER_PORT` is absent.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let mut config: Config = envy::prefixed("AUTH_").from_iter(vars.iter().cloned())?;

        let has_prefixed_port = vars.iter().any(|(k, _)| k == "AUTH_SERVER_PORT");
        if !has_prefixed_port {
            if let Some((_, port)) = vars.iter().find(|(k, _)| k == "PORT") {
                config.server_port = port
                    .parse()
                    .map_err(|_| ConfigError::Invalid(format!("PORT `{}` is not a port", port)))?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_ttl_secs <= 0 {
            return Err(ConfigError::Invalid(
                "AUTH_TOKEN_TTL_SECS must be positive".to_string(),
            ));
        }
        if self.lockout_threshold == 0 {
            return Err(ConfigError::Invalid(
                "AUTH_LOCKOUT_THRESHOLD must be at least 1".to_string(),
            ));
        }
        if self.lockout_window_secs <= 0 {
            return Err(ConfigError::Invalid(
                "AUTH_LOCKOUT_WINDOW_SECS must be positive".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 || self.revocation_sweep_secs == 0 {
            return Err(ConfigError::Invalid(
                "store timeout and sweep interval must be positive".to_string(),
            ));
        }
        if matches!(self.password_min_score, Some(score) if score > 4) {
            return Err(ConfigError::Invalid(
                "AUTH_PASSWORD_MIN_SCORE must be between 0 and 4".to_string(),
            ));
        }
        self.hash_params()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if let Some(secret) = &self.signing_key {
            SigningKey::new(self.signing_key_version, secret.as_bytes().to_vec())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn hash_params(&self) -> HashParams {
        HashParams {
            memory_kib: self.hash_memory_kib,
            iterations: self.hash_iterations,
            parallelism: self.hash_parallelism,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            token_ttl: Duration::seconds(self.token_ttl_secs),
            hash_params: self.hash_params(),
            lockout: LockoutPolicy {
                threshold: self.lockout_threshold,
                window: Duration::seconds(self.lockout_window_secs),
            },
            password_policy: PasswordPolicy {
                min_length: self.password_min_length,
                min_char_classes: self.password_min_char_classes,
                min_score: self.password_min_score,
            },
            store_timeout: std::time::Duration::from_millis(self.store_timeout_ms),
        }
    }

    /// Build the signing key ring, generating a key when none is configured
    pub fn key_ring(&self) -> Result<KeyRing, ConfigError> {
        let key = match &self.signing_key {
            Some(secret) => SigningKey::new(self.signing_key_version, secret.as_bytes().to_vec())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?,
            None => {
                tracing::warn!(
                    "AUTH_SIGNING_KEY not set; using an ephemeral key, tokens will not survive a restart"
                );
                SigningKey::generate(self.signing_key_version)
            }
        };
        Ok(KeyRing::new(key))
    }

    pub fn revocation_sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.revocation_sweep_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(vars(&[])).unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.token_ttl_secs, 3600);
        assert_eq!(config.lockout_threshold, 5);
        assert!(config.database_url.is_none());
        assert!(config.admin_key.is_none());
        assert_eq!(config.engine_settings().password_policy, PasswordPolicy::default());
    }

    #[test]
    fn test_prefixed_overrides() {
        let config = Config::from_vars(vars(&[
            ("AUTH_SERVER_PORT", "9000"),
            ("AUTH_LOCKOUT_THRESHOLD", "3"),
            ("AUTH_PASSWORD_MIN_SCORE", "2"),
            ("PORT", "7000"),
        ]))
        .unwrap();
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.engine_settings().lockout.threshold, 3);
        assert_eq!(config.password_min_score, Some(2));
    }

    #[test]
    fn test_port_fallback() {
        let config = Config::from_vars(vars(&[("PORT", "7000")])).unwrap();
        assert_eq!(config.server_port, 7000);
    }

    #[test]
    fn test_rejects_zero_ttl_and_threshold() {
        assert!(Config::from_vars(vars(&[("AUTH_TOKEN_TTL_SECS", "0")])).is_err());
        assert!(Config::from_vars(vars(&[("AUTH_LOCKOUT_THRESHOLD", "0")])).is_err());
        assert!(Config::from_vars(vars(&[("AUTH_LOCKOUT_WINDOW_SECS", "0")])).is_err());
    }

    #[test]
    fn test_rejects_short_signing_key() {
        assert!(Config::from_vars(vars(&[("AUTH_SIGNING_KEY", "short")])).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_vars(vars(&[
            ("AUTH_SIGNING_KEY", "0123456789abcdef0123456789abcdef-secret"),
            ("AUTH_ADMIN_KEY", "admin-secret"),
        ]))
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_configured_key_ring_uses_version() {
        let config = Config::from_vars(vars(&[
            ("AUTH_SIGNING_KEY", "0123456789abcdef0123456789abcdef"),
            ("AUTH_SIGNING_KEY_VERSION", "4"),
        ]))
        .unwrap();
        assert_eq!(config.key_ring().unwrap().current_version(), 4);
    }
}
