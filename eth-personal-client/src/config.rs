use crate::rpc::{ClientConfig, DEFAULT_TIMEOUT};
use eyre::{Result, WrapErr};
use serde::Deserialize;
use std::{env, time::Duration};

/// Client configuration structure
///
/// This structure contains all the configuration parameters for talking to a node.
/// It handles loading values from environment variables with appropriate defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Ethereum RPC endpoint URL (default: http://localhost:8545)
    pub ethereum_rpc_url: String,

    /// Per-call response deadline in milliseconds (default: 30000)
    pub rpc_timeout_ms: u64,

    /// Chain id to sign for; queried from the node when unset
    pub chain_id: Option<u64>,

    /// Receipt polling interval in milliseconds (default: 1000)
    pub receipt_poll_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Environment Variables
    ///
    /// * `ETHEREUM_RPC_URL` - Ethereum RPC URL (default: "http://localhost:8545")
    /// * `RPC_TIMEOUT_MS` - Response deadline per call (default: 30000)
    /// * `CHAIN_ID` - Chain id override (default: unset)
    /// * `RECEIPT_POLL_MS` - Receipt polling interval (default: 1000)
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (useful for development)
        let _ = dotenv::dotenv();

        Ok(Config {
            ethereum_rpc_url: env::var("ETHEREUM_RPC_URL")
                .unwrap_or_else(|_| "http://localhost:8545".to_string()),
            rpc_timeout_ms: parse_var("RPC_TIMEOUT_MS")?
                .unwrap_or(DEFAULT_TIMEOUT.as_millis() as u64),
            chain_id: parse_var("CHAIN_ID")?,
            receipt_poll_ms: parse_var("RECEIPT_POLL_MS")?.unwrap_or(1_000),
        })
    }

    /// Settings for the RPC client core
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_millis(self.rpc_timeout_ms),
        }
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }
}

fn parse_var(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .wrap_err_with(|| format!("{name} must be an unsigned integer, got {raw:?}")),
        Err(_) => Ok(None),
    }
}
