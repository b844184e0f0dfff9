//! ANDE testnet faucet service
//!
//! Dispenses a fixed amount of testnet tokens per claim, with:
//! - Address validation (hex + EIP-55 checksum)
//! - Per-address cooldown and daily limits
//! - Per-IP request throttling
//! - Hot-wallet dispatch with confirmation tracking
//! - Prometheus metrics and an HTTP API

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod rpc;
pub mod service;
pub mod throttle;

pub use config::FaucetConfig;
pub use error::{FaucetError, FaucetResult};
pub use service::{ClaimReceipt, ClaimStatus, FaucetInfo, FaucetService};
