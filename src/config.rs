//! Reconciler configuration.
//!
//! TOML files and `VOTESURE_*` environment variables, with defaults for every
//! optional value and validation of the bounded ones.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::constants::DEFAULT_BACKEND_TIMEOUT_MS;
use crate::constants::DEFAULT_ENRICHMENT_TIMEOUT_MS;
use crate::constants::DEFAULT_ROSTER_FETCH_CONCURRENCY;
use crate::constants::MAX_BACKEND_TIMEOUT_MS;
use crate::constants::MAX_ROSTER_FETCH_CONCURRENCY;
use crate::constants::MAX_ROSTER_SIZE;

/// Default values for configuration
mod defaults {
    use super::*;

    // Backend defaults
    pub fn backend_base_url() -> String { "http://localhost:5000/api/".to_string() }
    pub fn backend_timeout_ms() -> u64 { DEFAULT_BACKEND_TIMEOUT_MS }

    // Ledger defaults (local development chain)
    pub fn rpc_url() -> String { "http://127.0.0.1:7545".to_string() }
    pub fn contract_address() -> String { "0x161e2757Cfa3e8956141030365797eeC8270a873".to_string() }
    pub fn expected_chain_id() -> Option<u64> { Some(1337) }

    // Reconciliation defaults
    pub fn roster_fetch_concurrency() -> usize { DEFAULT_ROSTER_FETCH_CONCURRENCY }
    pub fn enrichment_timeout_ms() -> u64 { DEFAULT_ENRICHMENT_TIMEOUT_MS }
    pub fn max_roster_size() -> u64 { MAX_ROSTER_SIZE }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// `expected_chain_id` in files: an integer, or `"any"` to accept every chain.
mod chain_id {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use serde::de::Error;

    pub const ANY: &str = "any";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Id(u64),
        Word(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => serializer.serialize_u64(*id),
            None => serializer.serialize_str(ANY),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Id(id) => Ok(Some(id)),
            Raw::Word(word) if word.trim().eq_ignore_ascii_case(ANY) => Ok(None),
            Raw::Word(word) => word
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected a chain id or \"{ANY}\", got {word:?}"))),
        }
    }
}

/// Off-chain backend connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend HTTP API
    #[serde(default = "defaults::backend_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "defaults::backend_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Bearer token attached to every request
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
}

impl BackendConfig {
    /// Load backend configuration from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env_opt("VOTESURE_BACKEND_URL").unwrap_or_else(defaults::backend_base_url),
            request_timeout_ms: env_or("VOTESURE_BACKEND_TIMEOUT_MS", defaults::backend_timeout_ms())?,
            auth_token: env_opt("VOTESURE_AUTH_TOKEN"),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "backend.base_url".to_string(),
                hint: "set VOTESURE_BACKEND_URL".to_string(),
            });
        }
        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_BACKEND_TIMEOUT_MS {
            return Err(ConfigError::InvalidValue {
                key: "backend.request_timeout_ms".to_string(),
                value: self.request_timeout_ms.to_string(),
                reason: format!("must be between 1 and {MAX_BACKEND_TIMEOUT_MS}"),
            });
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::backend_base_url(),
            request_timeout_ms: defaults::backend_timeout_ms(),
            auth_token: None,
        }
    }
}

/// Ledger endpoint and signing identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,
    /// Deployed voting contract
    #[serde(default = "defaults::contract_address")]
    pub contract_address: String,
    /// Chain the contract lives on; `None` (`"any"` in files) accepts any chain
    #[serde(default = "defaults::expected_chain_id", with = "chain_id")]
    pub expected_chain_id: Option<u64>,
    /// Hex signing key. Without one there is no wallet to connect.
    #[serde(default, skip_serializing)]
    pub private_key: Option<String>,
}

impl LedgerConfig {
    /// Load ledger configuration from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let expected_chain_id = match env_opt("VOTESURE_CHAIN_ID") {
            Some(raw) if raw.trim().eq_ignore_ascii_case(chain_id::ANY) => None,
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: "VOTESURE_CHAIN_ID".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?),
            None => defaults::expected_chain_id(),
        };

        Ok(Self {
            rpc_url: env_opt("VOTESURE_RPC_URL").unwrap_or_else(defaults::rpc_url),
            contract_address: env_opt("VOTESURE_CONTRACT_ADDRESS").unwrap_or_else(defaults::contract_address),
            expected_chain_id,
            private_key: env_opt("VOTESURE_PRIVATE_KEY"),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "ledger.rpc_url".to_string(),
                hint: "set VOTESURE_RPC_URL".to_string(),
            });
        }
        let address = self.contract_address.trim();
        let hex = address.strip_prefix("0x").unwrap_or(address);
        if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ConfigError::InvalidValue {
                key: "ledger.contract_address".to_string(),
                value: self.contract_address.clone(),
                reason: "must be a 20-byte hex address".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: defaults::rpc_url(),
            contract_address: defaults::contract_address(),
            expected_chain_id: defaults::expected_chain_id(),
            private_key: None,
        }
    }
}

/// Reconciliation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Per-candidate ledger reads in flight; `1` fetches strictly in sequence
    #[serde(default = "defaults::roster_fetch_concurrency")]
    pub roster_fetch_concurrency: usize,
    /// Bound on the voter detail lookup after a positive ledger answer; must be non-zero
    #[serde(default = "defaults::enrichment_timeout_ms")]
    pub enrichment_timeout_ms: u64,
    /// Cap on the candidate count accepted from the ledger
    #[serde(default = "defaults::max_roster_size")]
    pub max_roster_size: u64,
}

impl ReconcileConfig {
    /// Load reconciliation configuration from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            roster_fetch_concurrency: env_or(
                "VOTESURE_ROSTER_CONCURRENCY",
                defaults::roster_fetch_concurrency(),
            )?,
            enrichment_timeout_ms: env_or("VOTESURE_ENRICHMENT_TIMEOUT_MS", defaults::enrichment_timeout_ms())?,
            max_roster_size: env_or("VOTESURE_MAX_ROSTER_SIZE", defaults::max_roster_size())?,
        })
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_millis(self.enrichment_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roster_fetch_concurrency == 0 || self.roster_fetch_concurrency > MAX_ROSTER_FETCH_CONCURRENCY {
            return Err(ConfigError::InvalidValue {
                key: "reconcile.roster_fetch_concurrency".to_string(),
                value: self.roster_fetch_concurrency.to_string(),
                reason: format!("must be between 1 and {MAX_ROSTER_FETCH_CONCURRENCY}"),
            });
        }
        if self.enrichment_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "reconcile.enrichment_timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "a zero timeout would drop every voter detail lookup".to_string(),
            });
        }
        if self.max_roster_size == 0 || self.max_roster_size > MAX_ROSTER_SIZE {
            return Err(ConfigError::InvalidValue {
                key: "reconcile.max_roster_size".to_string(),
                value: self.max_roster_size.to_string(),
                reason: format!("must be between 1 and {MAX_ROSTER_SIZE}"),
            });
        }
        Ok(())
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            roster_fetch_concurrency: defaults::roster_fetch_concurrency(),
            enrichment_timeout_ms: defaults::enrichment_timeout_ms(),
            max_roster_size: defaults::max_roster_size(),
        }
    }
}

/// Complete reconciler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl ReconcilerConfig {
    /// Load and validate configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self {
            backend: BackendConfig::load()?,
            ledger: LedgerConfig::load()?,
            reconcile: ReconcileConfig::load()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file.
    ///
    /// `VOTESURE_AUTH_TOKEN` and `VOTESURE_PRIVATE_KEY` override secrets
    /// given in the file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidValue {
            key: "config_file".to_string(),
            value: path.display().to_string(),
            reason: format!("failed to read file: {e}"),
        })?;

        let mut config: Self = toml::from_str(&contents).map_err(|e| ConfigError::InvalidValue {
            key: "config_file".to_string(),
            value: path.display().to_string(),
            reason: format!("failed to parse TOML: {e}"),
        })?;

        if let Some(token) = env_opt("VOTESURE_AUTH_TOKEN") {
            config.backend.auth_token = Some(token);
        }
        if let Some(key) = env_opt("VOTESURE_PRIVATE_KEY") {
            config.ledger.private_key = Some(key);
        }
        config.validate()?;
        Ok(config)
    }

    /// Use the TOML file if it exists, otherwise environment variables.
    pub fn load_with_optional_file(path: Option<impl AsRef<Path>>) -> Result<Self, ConfigError> {
        if let Some(path) = path
            && path.as_ref().exists()
        {
            tracing::info!(path = %path.as_ref().display(), "loading configuration from file");
            return Self::from_toml_file(path);
        }

        tracing::debug!("loading configuration from environment variables");
        Self::load()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend.validate()?;
        self.ledger.validate()?;
        self.reconcile.validate()
    }
}

/// Configuration error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration value is invalid
    #[error("invalid configuration for {key}: '{value}' ({reason})")]
    InvalidValue { key: String, value: String, reason: String },

    /// A required configuration value is missing
    #[error("missing required configuration: {key} ({hint})")]
    MissingRequired { key: String, hint: String },
}
