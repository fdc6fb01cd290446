// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup and injected
//! through `AppState`. Secrets (token-signing key, relayer keypair) are never
//! re-read per request.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory for the embedded ledger database | `./data` |
//! | `JWT_SECRET` | HS256 session-token signing secret | Required |
//! | `SOLANA_RPC_URL` | Solana JSON-RPC endpoint | devnet |
//! | `RELAYER_SECRET_KEY` | Base58 relayer keypair (64 bytes) | Optional |
//! | `SHADOWWIRE_BASE_URL` | Privacy-pool API base URL | provider default |
//! | `SHADOWWIRE_API_KEY` | Server-level provider API key | Optional |
//! | `JUPITER_QUOTE_URL` | Swap quote endpoint | public default |
//! | `JUPITER_SWAP_URL` | Swap build endpoint | public default |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::path::PathBuf;

/// Environment variable name for the data directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

const DEFAULT_SOLANA_RPC_URL: &str = "https://api.devnet.solana.com";
const DEFAULT_SHADOWWIRE_BASE_URL: &str = "https://api.shadowwire.radr.network";
const DEFAULT_JUPITER_QUOTE_URL: &str = "https://public.jupiterapi.com/quote";
const DEFAULT_JUPITER_SWAP_URL: &str = "https://public.jupiterapi.com/swap";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },
}

/// Process-wide configuration, loaded once in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub solana_rpc_url: String,
    /// Base58-encoded 64-byte relayer keypair. Decoded exactly once into a
    /// `RelayerSigner` at startup; the transfer endpoint is disabled when absent.
    pub relayer_secret_key: Option<String>,
    pub shadowwire_base_url: String,
    pub shadowwire_api_key: Option<String>,
    pub jupiter_quote_url: String,
    pub jupiter_swap_url: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an injectable lookup (used by tests).
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidVar {
                var: "PORT",
                reason: e.to_string(),
            })?,
            None => 8080,
        };

        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::MissingVar("JWT_SECRET"))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::InvalidVar {
                var: "JWT_SECRET",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            data_dir: lookup(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            jwt_secret,
            solana_rpc_url: lookup("SOLANA_RPC_URL")
                .unwrap_or_else(|| DEFAULT_SOLANA_RPC_URL.to_string()),
            relayer_secret_key: lookup("RELAYER_SECRET_KEY").filter(|v| !v.is_empty()),
            shadowwire_base_url: lookup("SHADOWWIRE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SHADOWWIRE_BASE_URL.to_string()),
            shadowwire_api_key: lookup("SHADOWWIRE_API_KEY").filter(|v| !v.is_empty()),
            jupiter_quote_url: lookup("JUPITER_QUOTE_URL")
                .unwrap_or_else(|| DEFAULT_JUPITER_QUOTE_URL.to_string()),
            jupiter_swap_url: lookup("JUPITER_SWAP_URL")
                .unwrap_or_else(|| DEFAULT_JUPITER_SWAP_URL.to_string()),
        })
    }

    /// Path of the embedded database file inside `data_dir`.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("spectra.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| map.get(name).map(|v| v.to_string())
    }

    #[test]
    fn defaults_applied_when_unset() {
        let mut map = HashMap::new();
        map.insert("JWT_SECRET", "secret");
        let config = Config::from_lookup(lookup_from(&map)).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.solana_rpc_url, DEFAULT_SOLANA_RPC_URL);
        assert!(config.relayer_secret_key.is_none());
        assert_eq!(config.database_path(), PathBuf::from("./data/spectra.redb"));
    }

    #[test]
    fn missing_jwt_secret_is_an_error() {
        let map = HashMap::new();
        let err = Config::from_lookup(lookup_from(&map)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("JWT_SECRET")));
    }

    #[test]
    fn invalid_port_is_an_error() {
        let mut map = HashMap::new();
        map.insert("JWT_SECRET", "secret");
        map.insert("PORT", "not-a-port");
        let err = Config::from_lookup(lookup_from(&map)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { var: "PORT", .. }));
    }

    #[test]
    fn empty_relayer_key_treated_as_absent() {
        let mut map = HashMap::new();
        map.insert("JWT_SECRET", "secret");
        map.insert("RELAYER_SECRET_KEY", "");
        let config = Config::from_lookup(lookup_from(&map)).unwrap();
        assert!(config.relayer_secret_key.is_none());
    }
}
