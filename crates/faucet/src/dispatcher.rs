//! Transaction dispatcher
//!
//! Owns the hot-wallet signing key and is the only component that mutates
//! on-chain state. Dispatches are legacy EIP-155 value transfers with fixed
//! gas parameters; nonce acquisition and submission run under a single mutex
//! so concurrent claims cannot collide on a nonce.

use crate::config::FaucetConfig;
use crate::error::{FaucetError, FaucetResult};
use crate::rpc::ChainRpc;
use ande_common::{Address, Hash, ADDRESS_LENGTH};
use k256::ecdsa::SigningKey;
use rlp::RlpStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct Dispatcher {
    rpc: Arc<dyn ChainRpc>,
    signing_key: SigningKey,
    faucet_address: Address,
    chain_id: u64,
    claim_amount_wei: u128,
    gas_limit: u64,
    gas_price_wei: u128,
    confirm_timeout: Duration,
    poll_interval: Duration,
    nonce_guard: Mutex<()>,
}

impl Dispatcher {
    pub fn new(config: &FaucetConfig, rpc: Arc<dyn ChainRpc>) -> FaucetResult<Self> {
        let signing_key = decode_signing_key(&config.private_key)?;
        let faucet_address = derive_address(&signing_key);

        Ok(Self {
            rpc,
            signing_key,
            faucet_address,
            chain_id: config.chain_id,
            claim_amount_wei: config.claim_amount_wei,
            gas_limit: config.gas_limit,
            gas_price_wei: config.gas_price_wei,
            confirm_timeout: config.confirm_timeout(),
            poll_interval: config.receipt_poll_interval(),
            nonce_guard: Mutex::new(()),
        })
    }

    pub fn faucet_address(&self) -> Address {
        self.faucet_address
    }

    /// Send the fixed claim amount to `to` and wait for on-chain
    /// confirmation.
    pub async fn dispatch(&self, to: &Address) -> FaucetResult<Hash> {
        let balance = self.rpc.get_balance(&self.faucet_address).await?;
        if balance < self.claim_amount_wei {
            warn!(balance = %balance, "Faucet balance below claim amount");
            return Err(FaucetError::InsufficientFaucetFunds);
        }

        let tx_hash = {
            let _guard = self.nonce_guard.lock().await;
            let nonce = self.rpc.get_transaction_count(&self.faucet_address).await?;
            let raw = self.encode_signed_transfer(to, nonce)?;
            self.rpc.send_raw_transaction(&raw).await?
        };

        info!(%tx_hash, %to, "Transaction submitted, awaiting confirmation");
        self.wait_for_confirmation(tx_hash).await
    }

    /// RLP-encode and sign a legacy EIP-155 value transfer.
    fn encode_signed_transfer(&self, to: &Address, nonce: u64) -> FaucetResult<Vec<u8>> {
        let mut unsigned = RlpStream::new_list(9);
        self.append_transfer_body(&mut unsigned, to, nonce);
        unsigned.append(&self.chain_id);
        unsigned.append(&0u8);
        unsigned.append(&0u8);

        let sighash = keccak_hash::keccak(&unsigned.out());
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&sighash.0)
            .map_err(|e| FaucetError::Dispatch(format!("Signing failed: {}", e)))?;
        let v = self.chain_id * 2 + 35 + recovery_id.to_byte() as u64;

        let mut signed = RlpStream::new_list(9);
        self.append_transfer_body(&mut signed, to, nonce);
        signed.append(&v);
        signed.append(&be_trimmed(&signature.r().to_bytes()));
        signed.append(&be_trimmed(&signature.s().to_bytes()));

        Ok(signed.out().to_vec())
    }

    fn append_transfer_body(&self, stream: &mut RlpStream, to: &Address, nonce: u64) {
        stream.append(&nonce);
        stream.append(&self.gas_price_wei);
        stream.append(&self.gas_limit);
        stream.append(&to.0.to_vec());
        stream.append(&self.claim_amount_wei);
        stream.append_empty_data();
    }

    async fn wait_for_confirmation(&self, tx_hash: Hash) -> FaucetResult<Hash> {
        let poll = async {
            loop {
                match self.rpc.get_transaction_receipt(&tx_hash).await? {
                    Some(receipt) if receipt.succeeded() => return Ok(tx_hash),
                    Some(_) => return Err(FaucetError::TransactionReverted(tx_hash)),
                    None => tokio::time::sleep(self.poll_interval).await,
                }
            }
        };

        match tokio::time::timeout(self.confirm_timeout, poll).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%tx_hash, "Gave up waiting for confirmation");
                Err(FaucetError::ConfirmationTimeout(tx_hash))
            }
        }
    }
}

fn decode_signing_key(private_key: &str) -> FaucetResult<SigningKey> {
    let digits = private_key.strip_prefix("0x").unwrap_or(private_key);
    let bytes = hex::decode(digits)
        .map_err(|e| FaucetError::Config(format!("hot wallet key is not valid hex: {}", e)))?;
    let key_bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| FaucetError::Config("hot wallet key must be 32 bytes".to_string()))?;

    SigningKey::from_bytes(&key_bytes.into())
        .map_err(|e| FaucetError::Config(format!("invalid hot wallet key: {}", e)))
}

/// Keccak-derived account address for a secp256k1 key.
pub fn derive_address(key: &SigningKey) -> Address {
    let public_key = key.verifying_key();
    let encoded = public_key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point marker.
    let digest = keccak_hash::keccak(&encoded.as_bytes()[1..]);
    let mut addr = [0u8; ADDRESS_LENGTH];
    addr.copy_from_slice(&digest.0[12..]);
    Address(addr)
}

/// Minimal big-endian form, as RLP integer fields require.
fn be_trimmed(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}
