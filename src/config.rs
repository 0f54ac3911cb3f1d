// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup. The signer key
//! is intentionally allowed to be absent here: the mint pipeline resolves it
//! lazily and reports `SignerUnavailable` per mint attempt instead of
//! refusing to start.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SIGNER_PRIVATE_KEY` | Minter private key (hex, `0x` prefix optional) | unset |
//! | `DATACOIN_CONTRACT_ADDRESS` | DataCoin contract address | Sepolia deployment |
//! | `SEPOLIA_RPC_URLS` | Comma-separated ordered RPC candidate list | four public endpoints |
//! | `TOKEN_DECIMALS` | Token decimal precision | `18` |
//! | `UPLOAD_REWARD` | Tokens minted per verified upload | `10` |
//! | `DIRECT_RECLAIM_REWARD` | Tokens minted for a direct-reclaim proof | `15` |
//! | `ENCRYPT_ENDPOINT_URL` | Storage/encryption endpoint | Required |
//! | `PROBE_TIMEOUT_SECS` | Per-candidate liveness probe timeout | `5` |
//! | `CONFIRMATION_TIMEOUT_SECS` | Transaction confirmation wait | `60` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::time::Duration;

/// DataCoin contract on Sepolia.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0xa14159C1B383fBCa4A9C197aFC83E01DB4655B24";

/// Default RPC candidates, probed in this order.
pub const DEFAULT_RPC_URLS: [&str; 4] = [
    "https://ethereum-sepolia.publicnode.com",
    "https://sepolia.infura.io/v3/9aa3d95b3bc440fa88ea12eaa4456161",
    "https://rpc.sepolia.ethpandaops.io",
    "https://1rpc.io/sepolia",
];

const DEFAULT_TOKEN_DECIMALS: u8 = 18;
const DEFAULT_UPLOAD_REWARD: &str = "10";
const DEFAULT_DIRECT_RECLAIM_REWARD: &str = "15";
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 60;

/// Process-wide configuration, read-only after load.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Minter private key (hex, `0x` prefix optional). `None` until set.
    pub signer_private_key: Option<String>,
    /// DataCoin contract address.
    pub contract_address: String,
    /// Ordered RPC candidate URLs.
    pub rpc_urls: Vec<String>,
    /// Token decimal precision.
    pub token_decimals: u8,
    /// Reward per verified upload, in whole token units (decimal string).
    pub upload_reward: String,
    /// Reward for a completed direct-reclaim verification.
    pub direct_reclaim_reward: String,
    /// Storage/encryption endpoint URL.
    pub encrypt_endpoint: String,
    /// Per-candidate liveness probe timeout.
    pub probe_timeout: Duration,
    /// Transaction confirmation wait.
    pub confirmation_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let rpc_urls = match env::var("SEPOLIA_RPC_URLS") {
            Ok(raw) => parse_url_list(&raw)?,
            Err(_) => DEFAULT_RPC_URLS.iter().map(|s| s.to_string()).collect(),
        };

        let token_decimals = match env::var("TOKEN_DECIMALS") {
            Ok(raw) => raw
                .trim()
                .parse::<u8>()
                .map_err(|_| ConfigError::InvalidValue("TOKEN_DECIMALS", raw))?,
            Err(_) => DEFAULT_TOKEN_DECIMALS,
        };

        Ok(Self {
            signer_private_key: env::var("SIGNER_PRIVATE_KEY").ok(),
            contract_address: env_or_default(
                "DATACOIN_CONTRACT_ADDRESS",
                DEFAULT_CONTRACT_ADDRESS,
            ),
            rpc_urls,
            token_decimals,
            upload_reward: env_or_default("UPLOAD_REWARD", DEFAULT_UPLOAD_REWARD),
            direct_reclaim_reward: env_or_default(
                "DIRECT_RECLAIM_REWARD",
                DEFAULT_DIRECT_RECLAIM_REWARD,
            ),
            encrypt_endpoint: env_required("ENCRYPT_ENDPOINT_URL")?,
            probe_timeout: Duration::from_secs(env_secs(
                "PROBE_TIMEOUT_SECS",
                DEFAULT_PROBE_TIMEOUT_SECS,
            )?),
            confirmation_timeout: Duration::from_secs(env_secs(
                "CONFIRMATION_TIMEOUT_SECS",
                DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            )?),
        })
    }

    /// Build a configuration directly, without touching the environment.
    ///
    /// Intended for tests and embedding callers; timeouts and rewards take
    /// the documented defaults.
    pub fn from_parts(
        signer_private_key: Option<String>,
        contract_address: impl Into<String>,
        rpc_urls: Vec<String>,
        encrypt_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            signer_private_key,
            contract_address: contract_address.into(),
            rpc_urls,
            token_decimals: DEFAULT_TOKEN_DECIMALS,
            upload_reward: DEFAULT_UPLOAD_REWARD.to_string(),
            direct_reclaim_reward: DEFAULT_DIRECT_RECLAIM_REWARD.to_string(),
            encrypt_endpoint: encrypt_endpoint.into(),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            confirmation_timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
        }
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn env_secs(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Split a comma-separated URL list, validating each entry.
fn parse_url_list(raw: &str) -> Result<Vec<String>, ConfigError> {
    let urls: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if urls.is_empty() {
        return Err(ConfigError::InvalidValue(
            "SEPOLIA_RPC_URLS",
            raw.to_string(),
        ));
    }

    for candidate in &urls {
        candidate
            .parse::<url::Url>()
            .map_err(|_| ConfigError::InvalidValue("SEPOLIA_RPC_URLS", candidate.clone()))?;
    }

    Ok(urls)
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required configuration `{0}` is not set")]
    Missing(&'static str),

    #[error("invalid value for `{0}`: {1}")]
    InvalidValue(&'static str, String),
}
