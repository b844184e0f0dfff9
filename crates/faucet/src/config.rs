//! Faucet configuration
//!
//! Single source of every faucet parameter. Values start from defaults, are
//! overridden by `FAUCET_*` environment variables, then by CLI flags in the
//! binary, and are validated once at startup.

use crate::error::{FaucetError, FaucetResult};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Faucet service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetConfig {
    /// Server listen address
    pub server_addr: String,

    /// RPC endpoint for the chain
    pub rpc_url: String,

    /// Human-readable network name
    pub network: String,

    /// Chain ID used for EIP-155 signing
    pub chain_id: u64,

    /// Hot wallet private key (hex, required)
    pub private_key: String,

    /// Amount dispensed per claim (in wei)
    pub claim_amount_wei: u128,

    /// Gas limit for dispatch transactions
    pub gas_limit: u64,

    /// Gas price for dispatch transactions (in wei)
    pub gas_price_wei: u128,

    /// Cooldown between successful claims for one address (seconds)
    pub cooldown_secs: u64,

    /// Maximum successful claims per address per UTC calendar day
    pub max_claims_per_day: u32,

    /// Maximum requests per IP within a rolling hour
    pub max_ip_requests_per_hour: u32,

    /// Minimum spacing between requests from one IP (seconds)
    pub min_ip_interval_secs: u64,

    /// Per-request RPC timeout (seconds)
    pub rpc_timeout_secs: u64,

    /// Overall wait for transaction confirmation (seconds)
    pub confirm_timeout_secs: u64,

    /// Interval between receipt polls (milliseconds)
    pub receipt_poll_interval_ms: u64,

    /// Ledger database path
    pub db_path: String,

    /// Keep ledgers in memory instead of sled (limits reset on restart)
    pub in_memory_store: bool,

    /// Enable permissive CORS
    pub cors_enabled: bool,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:8787".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            network: "ande-testnet".to_string(),
            chain_id: 5197,
            private_key: String::new(),
            claim_amount_wei: 100_000_000_000_000_000_000, // 100 ANDE
            gas_limit: 21_000,
            gas_price_wei: 20_000_000_000, // 20 gwei
            cooldown_secs: 86_400,         // 24 hours
            max_claims_per_day: 3,
            max_ip_requests_per_hour: 10,
            min_ip_interval_secs: 60,
            rpc_timeout_secs: 10,
            confirm_timeout_secs: 45,
            receipt_poll_interval_ms: 2_000,
            db_path: "./faucet_data".to_string(),
            in_memory_store: false,
            cors_enabled: true,
        }
    }
}

impl FaucetConfig {
    /// Load from environment variables on top of defaults.
    pub fn from_env() -> FaucetResult<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("FAUCET_SERVER_ADDR") {
            config.server_addr = addr;
        }
        if let Ok(rpc_url) = std::env::var("FAUCET_RPC_URL") {
            config.rpc_url = rpc_url;
        }
        if let Ok(network) = std::env::var("FAUCET_NETWORK") {
            config.network = network;
        }
        if let Ok(key) = std::env::var("FAUCET_PRIVATE_KEY") {
            config.private_key = key;
        }
        if let Ok(db_path) = std::env::var("FAUCET_DB_PATH") {
            config.db_path = db_path;
        }

        parse_env("FAUCET_CHAIN_ID", &mut config.chain_id)?;
        parse_env("FAUCET_CLAIM_AMOUNT_WEI", &mut config.claim_amount_wei)?;
        parse_env("FAUCET_GAS_LIMIT", &mut config.gas_limit)?;
        parse_env("FAUCET_GAS_PRICE_WEI", &mut config.gas_price_wei)?;
        parse_env("FAUCET_COOLDOWN_SECS", &mut config.cooldown_secs)?;
        parse_env("FAUCET_MAX_CLAIMS_PER_DAY", &mut config.max_claims_per_day)?;
        parse_env(
            "FAUCET_MAX_IP_REQUESTS_PER_HOUR",
            &mut config.max_ip_requests_per_hour,
        )?;
        parse_env("FAUCET_MIN_IP_INTERVAL_SECS", &mut config.min_ip_interval_secs)?;
        parse_env("FAUCET_RPC_TIMEOUT_SECS", &mut config.rpc_timeout_secs)?;
        parse_env("FAUCET_CONFIRM_TIMEOUT_SECS", &mut config.confirm_timeout_secs)?;
        parse_env(
            "FAUCET_RECEIPT_POLL_INTERVAL_MS",
            &mut config.receipt_poll_interval_ms,
        )?;
        parse_env("FAUCET_IN_MEMORY_STORE", &mut config.in_memory_store)?;
        parse_env("FAUCET_CORS_ENABLED", &mut config.cors_enabled)?;

        Ok(config)
    }

    /// Startup check: reject configurations that would only fail later, at
    /// request time.
    pub fn validate(&self) -> FaucetResult<()> {
        if self.private_key.trim().is_empty() {
            return Err(FaucetError::Config(
                "hot wallet key is not set (FAUCET_PRIVATE_KEY)".to_string(),
            ));
        }
        if self.rpc_url.trim().is_empty() {
            return Err(FaucetError::Config("rpc_url is empty".to_string()));
        }
        if self.claim_amount_wei == 0 {
            return Err(FaucetError::Config("claim_amount_wei is zero".to_string()));
        }
        if self.gas_limit == 0 {
            return Err(FaucetError::Config("gas_limit is zero".to_string()));
        }
        if self.gas_price_wei == 0 {
            return Err(FaucetError::Config("gas_price_wei is zero".to_string()));
        }
        if self.max_claims_per_day == 0 {
            return Err(FaucetError::Config("max_claims_per_day is zero".to_string()));
        }
        if self.max_ip_requests_per_hour == 0 {
            return Err(FaucetError::Config(
                "max_ip_requests_per_hour is zero".to_string(),
            ));
        }
        if self.confirm_timeout_secs == 0 {
            return Err(FaucetError::Config("confirm_timeout_secs is zero".to_string()));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn cooldown_hours(&self) -> u64 {
        self.cooldown_secs / 3600
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

fn parse_env<T: FromStr>(name: &str, slot: &mut T) -> FaucetResult<()>
where
    T::Err: Display,
{
    if let Ok(raw) = std::env::var(name) {
        *slot = raw
            .parse()
            .map_err(|e| FaucetError::Config(format!("{}: {}", name, e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_key() -> FaucetConfig {
        FaucetConfig {
            private_key: "0x0000000000000000000000000000000000000000000000000000000000000001"
                .to_string(),
            ..FaucetConfig::default()
        }
    }

    #[test]
    fn defaults_are_valid_once_key_is_set() {
        assert!(FaucetConfig::default().validate().is_err());
        assert!(with_key().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_amounts() {
        let mut config = with_key();
        config.claim_amount_wei = 0;
        assert!(matches!(config.validate(), Err(FaucetError::Config(_))));

        let mut config = with_key();
        config.max_claims_per_day = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duration_helpers() {
        let config = with_key();
        assert_eq!(config.cooldown(), Duration::from_secs(86_400));
        assert_eq!(config.cooldown_hours(), 24);
        assert_eq!(config.receipt_poll_interval(), Duration::from_millis(2_000));
    }
}
