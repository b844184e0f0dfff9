//! Faucet service core logic
//!
//! Sequences a claim through validation, IP throttling, eligibility checks,
//! dispatch, and ledger recording, short-circuiting on the first failure.
//! Eligibility and recording for one address run under that address's lock
//! so the limits hold under concurrent requests.

use crate::config::FaucetConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{FaucetError, FaucetResult};
use crate::ledger::ClaimLedger;
use crate::locks::KeyedLocks;
use crate::metrics::FaucetMetrics;
use crate::rpc::{ChainRpc, HttpRpcClient};
use crate::throttle::IpThrottle;
use ande_common::{Address, Hash};
use ande_storage::Store;
use chrono::Utc;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Result of a successful claim.
#[derive(Debug, Clone)]
pub struct ClaimReceipt {
    pub address: Address,
    pub tx_hash: Hash,
    pub amount_wei: u128,
}

/// Read-only eligibility snapshot for one address.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimStatus {
    pub can_claim: bool,
    pub claims_today: u32,
    pub max_claims_per_day: u32,
    pub total_claims: u64,
    pub last_claim_at: Option<i64>,
    pub next_claim_at: Option<i64>,
    #[serde(rename = "cooldownRemaining")]
    pub cooldown_remaining_secs: u64,
}

/// Faucet identity and live balance, for UI display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetInfo {
    pub faucet_address: Address,
    pub claim_amount: String,
    pub current_balance: String,
    pub cooldown_hours: u64,
    pub max_claims_per_day: u32,
    pub network: String,
    pub chain_id: u64,
    pub rpc_url: String,
}

/// Faucet service
pub struct FaucetService {
    config: FaucetConfig,
    ledger: ClaimLedger,
    throttle: IpThrottle,
    dispatcher: Dispatcher,
    rpc: Arc<dyn ChainRpc>,
    address_locks: KeyedLocks,
    metrics: FaucetMetrics,
}

impl FaucetService {
    /// Create a service talking JSON-RPC to the configured endpoint.
    pub fn new(config: FaucetConfig, store: Arc<dyn Store>) -> FaucetResult<Self> {
        let rpc = Arc::new(HttpRpcClient::new(
            config.rpc_url.clone(),
            config.rpc_timeout(),
        )?);
        Self::with_rpc(config, store, rpc)
    }

    /// Create a service with an injected RPC client.
    pub fn with_rpc(
        config: FaucetConfig,
        store: Arc<dyn Store>,
        rpc: Arc<dyn ChainRpc>,
    ) -> FaucetResult<Self> {
        config.validate()?;

        let ledger = ClaimLedger::new(
            store.clone(),
            config.cooldown_secs,
            config.max_claims_per_day,
        );
        let throttle = IpThrottle::new(
            store,
            config.min_ip_interval_secs,
            config.max_ip_requests_per_hour,
        );
        let dispatcher = Dispatcher::new(&config, rpc.clone())?;
        info!("Faucet address: {}", dispatcher.faucet_address());

        Ok(Self {
            config,
            ledger,
            throttle,
            dispatcher,
            rpc,
            address_locks: KeyedLocks::new(100_000),
            metrics: FaucetMetrics::new(),
        })
    }

    pub fn config(&self) -> &FaucetConfig {
        &self.config
    }

    pub fn faucet_address(&self) -> Address {
        self.dispatcher.faucet_address()
    }

    pub fn metrics(&self) -> &FaucetMetrics {
        &self.metrics
    }

    pub fn ledger(&self) -> &ClaimLedger {
        &self.ledger
    }

    /// Process one claim request end to end.
    pub async fn claim(&self, address: &str, client_ip: IpAddr) -> FaucetResult<ClaimReceipt> {
        let outcome = self.claim_inner(address, client_ip).await;

        match &outcome {
            Ok(receipt) => self.metrics.record_success(receipt.amount_wei),
            Err(err) if err.status_code().is_client_error() => {
                self.metrics.record_rejection(err.code())
            }
            Err(err) => self.metrics.record_dispatch_failure(err.code()),
        }

        outcome
    }

    async fn claim_inner(&self, address: &str, client_ip: IpAddr) -> FaucetResult<ClaimReceipt> {
        // 1. Validate the recipient.
        let recipient = self.parse_recipient(address)?;
        info!(%recipient, %client_ip, "Claim request");

        // 2. IP throttle, consumed before any further work.
        let now = Utc::now().timestamp();
        self.throttle.check_and_consume(client_ip, now).await?;

        // Eligibility, dispatch, and recording are atomic per address.
        let _guard = self.address_locks.lock(&recipient.to_string()).await;
        let now = Utc::now().timestamp();

        // 3. Cooldown.
        let cooldown = self.ledger.check_cooldown(&recipient, now).await?;
        if !cooldown.can_claim {
            return Err(FaucetError::CooldownActive {
                retry_after_secs: cooldown.remaining_secs,
            });
        }

        // 4. Daily limit.
        let daily = self.ledger.check_daily_limit(&recipient, now).await?;
        if !daily.can_claim {
            return Err(FaucetError::DailyLimitReached {
                claims_today: daily.claims_today,
                max_claims_per_day: self.config.max_claims_per_day,
            });
        }

        // 5. Dispatch and wait for confirmation.
        let started = Instant::now();
        let tx_hash = match self.dispatcher.dispatch(&recipient).await {
            Ok(hash) => hash,
            Err(err) => {
                warn!(%recipient, error = %err, "Dispatch failed, claim not recorded");
                return Err(err);
            }
        };
        self.metrics.observe_dispatch(started.elapsed().as_secs_f64());

        // 6. Record only after confirmed success.
        self.ledger
            .record_claim(&recipient, Utc::now().timestamp())
            .await?;

        info!(%recipient, %tx_hash, "Claim dispensed");
        Ok(ClaimReceipt {
            address: recipient,
            tx_hash,
            amount_wei: self.config.claim_amount_wei,
        })
    }

    /// Re-derive the eligibility checks without consuming anything.
    pub async fn claim_status(&self, address: &str) -> FaucetResult<ClaimStatus> {
        let recipient = self.parse_recipient(address)?;
        let now = Utc::now().timestamp();

        let cooldown = self.ledger.check_cooldown(&recipient, now).await?;
        let daily = self.ledger.check_daily_limit(&recipient, now).await?;
        let record = self.ledger.record(&recipient).await?;

        let last_claim_at = record.as_ref().map(|r| r.last_claim_at);
        Ok(ClaimStatus {
            can_claim: cooldown.can_claim && daily.can_claim,
            claims_today: daily.claims_today,
            max_claims_per_day: self.config.max_claims_per_day,
            total_claims: record.map(|r| r.total_claims).unwrap_or(0),
            last_claim_at,
            next_claim_at: last_claim_at.map(|t| t + self.config.cooldown_secs as i64),
            cooldown_remaining_secs: cooldown.remaining_secs,
        })
    }

    /// Faucet identity, limits, and live balance.
    pub async fn info(&self) -> FaucetResult<FaucetInfo> {
        let balance = self.rpc.get_balance(&self.faucet_address()).await?;
        self.metrics.set_balance(balance);

        Ok(FaucetInfo {
            faucet_address: self.faucet_address(),
            claim_amount: self.config.claim_amount_wei.to_string(),
            current_balance: balance.to_string(),
            cooldown_hours: self.config.cooldown_hours(),
            max_claims_per_day: self.config.max_claims_per_day,
            network: self.config.network.clone(),
            chain_id: self.config.chain_id,
            rpc_url: self.config.rpc_url.clone(),
        })
    }

    /// Compare the configured chain ID against the node's. A mismatch means
    /// signed transactions would be rejected, so it is worth a loud warning
    /// at startup.
    pub async fn verify_chain_id(&self) -> FaucetResult<u64> {
        let remote = self.rpc.chain_id().await?;
        if remote != self.config.chain_id {
            warn!(
                configured = self.config.chain_id,
                remote, "Chain ID mismatch between config and RPC endpoint"
            );
        }
        Ok(remote)
    }

    fn parse_recipient(&self, address: &str) -> FaucetResult<Address> {
        let recipient =
            Address::parse(address).map_err(|e| FaucetError::InvalidAddress(e.to_string()))?;
        if recipient.is_zero() {
            return Err(FaucetError::InvalidAddress(
                "zero address not allowed".to_string(),
            ));
        }
        if recipient == self.faucet_address() {
            return Err(FaucetError::InvalidAddress(
                "cannot claim to the faucet address".to_string(),
            ));
        }
        Ok(recipient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::MockRpc;
    use ande_storage::MemoryStore;
    use k256::ecdsa::SigningKey;

    const RECIPIENT: &str = "0x00000000000000000000000000000000000000aa";

    fn random_key() -> String {
        let key = SigningKey::random(&mut rand::thread_rng());
        format!("0x{}", hex::encode(key.to_bytes()))
    }

    fn test_config() -> FaucetConfig {
        FaucetConfig {
            private_key: random_key(),
            confirm_timeout_secs: 5,
            receipt_poll_interval_ms: 1,
            ..FaucetConfig::default()
        }
    }

    fn service_with(rpc: Arc<MockRpc>, config: FaucetConfig) -> FaucetService {
        FaucetService::with_rpc(config, Arc::new(MemoryStore::new()), rpc).unwrap()
    }

    fn client_ip(n: u8) -> IpAddr {
        format!("203.0.113.{}", n).parse().unwrap()
    }

    #[tokio::test]
    async fn claim_then_immediate_retry_hits_cooldown() {
        let config = test_config();
        let rpc = Arc::new(MockRpc::new(config.claim_amount_wei * 10));
        let service = service_with(rpc, config.clone());

        let receipt = service.claim(RECIPIENT, client_ip(1)).await.unwrap();
        assert_eq!(receipt.amount_wei, config.claim_amount_wei);

        // Second claim from a different IP so only the cooldown can reject.
        let err = service.claim(RECIPIENT, client_ip(2)).await.unwrap_err();
        match err {
            FaucetError::CooldownActive { retry_after_secs } => {
                assert!(retry_after_secs > 86_000 && retry_after_secs <= 86_400);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let status = service.claim_status(RECIPIENT).await.unwrap();
        assert!(!status.can_claim);
        assert_eq!(status.claims_today, 1);
        assert_eq!(status.total_claims, 1);
        assert!(status.cooldown_remaining_secs > 86_000);
        assert_eq!(
            status.next_claim_at,
            status.last_claim_at.map(|t| t + 86_400)
        );
    }

    #[tokio::test]
    async fn invalid_addresses_are_rejected_up_front() {
        let config = test_config();
        let rpc = Arc::new(MockRpc::new(config.claim_amount_wei * 10));
        let service = service_with(rpc.clone(), config);

        for bad in ["", "not-an-address", "0x123"] {
            let err = service.claim(bad, client_ip(1)).await.unwrap_err();
            assert!(matches!(err, FaucetError::InvalidAddress(_)), "{bad:?}");
        }

        let zero = "0x0000000000000000000000000000000000000000";
        assert!(matches!(
            service.claim(zero, client_ip(1)).await.unwrap_err(),
            FaucetError::InvalidAddress(_)
        ));

        let own = service.faucet_address().to_string();
        assert!(matches!(
            service.claim(&own, client_ip(1)).await.unwrap_err(),
            FaucetError::InvalidAddress(_)
        ));

        // Nothing reached the chain.
        assert!(rpc.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_dispatch_does_not_consume_the_allowance() {
        let config = test_config();
        let mut mock = MockRpc::new(config.claim_amount_wei * 10);
        mock.fail_send = true;
        let service = service_with(Arc::new(mock), config);

        let err = service.claim(RECIPIENT, client_ip(1)).await.unwrap_err();
        assert!(matches!(err, FaucetError::Network(_)));

        let status = service.claim_status(RECIPIENT).await.unwrap();
        assert!(status.can_claim);
        assert_eq!(status.claims_today, 0);
        assert_eq!(status.total_claims, 0);
    }

    #[tokio::test]
    async fn empty_faucet_rejects_without_recording() {
        let config = test_config();
        let rpc = Arc::new(MockRpc::new(config.claim_amount_wei - 1));
        let service = service_with(rpc, config);

        let err = service.claim(RECIPIENT, client_ip(1)).await.unwrap_err();
        assert!(matches!(err, FaucetError::InsufficientFaucetFunds));

        let status = service.claim_status(RECIPIENT).await.unwrap();
        assert_eq!(status.total_claims, 0);
    }

    #[tokio::test]
    async fn repeated_requests_from_one_ip_are_throttled() {
        let config = test_config();
        let rpc = Arc::new(MockRpc::new(config.claim_amount_wei * 10));
        let service = service_with(rpc, config);

        // First request claims successfully; the second comes from the same
        // IP inside the spacing window, for a different address.
        service.claim(RECIPIENT, client_ip(9)).await.unwrap();
        let other = "0x00000000000000000000000000000000000000bb";
        let err = service.claim(other, client_ip(9)).await.unwrap_err();
        assert!(matches!(err, FaucetError::RateLimited { .. }));

        // The throttled address remains eligible.
        let status = service.claim_status(other).await.unwrap();
        assert!(status.can_claim);
    }

    #[tokio::test]
    async fn status_for_fresh_address_is_clean() {
        let config = test_config();
        let rpc = Arc::new(MockRpc::new(config.claim_amount_wei * 10));
        let service = service_with(rpc, config);

        let status = service.claim_status(RECIPIENT).await.unwrap();
        assert!(status.can_claim);
        assert_eq!(status.claims_today, 0);
        assert_eq!(status.max_claims_per_day, 3);
        assert_eq!(status.total_claims, 0);
        assert_eq!(status.last_claim_at, None);
        assert_eq!(status.next_claim_at, None);
        assert_eq!(status.cooldown_remaining_secs, 0);
    }

    #[tokio::test]
    async fn info_reports_live_balance_and_limits() {
        let config = test_config();
        let rpc = Arc::new(MockRpc::new(12_345));
        let service = service_with(rpc, config);

        let info = service.info().await.unwrap();
        assert_eq!(info.current_balance, "12345");
        assert_eq!(info.cooldown_hours, 24);
        assert_eq!(info.max_claims_per_day, 3);
        assert_eq!(info.network, "ande-testnet");
    }
}
