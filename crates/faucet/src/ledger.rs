//! Per-address claim ledger
//!
//! Tracks successful dispatches per recipient and answers the two
//! eligibility questions: has the cooldown elapsed, and how many claims
//! landed today (UTC). Records live in the injected [`Store`] under
//! `claim:<address>` keys so limits survive restarts with a durable backend.

use crate::error::{FaucetError, FaucetResult};
use ande_common::Address;
use ande_storage::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Claim history is pruned to this trailing window.
pub const HISTORY_WINDOW_SECS: i64 = 7 * 86_400;

const DAY_SECS: i64 = 86_400;
const KEY_PREFIX: &str = "claim:";

/// Per-address claim record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Unix seconds of the most recent successful dispatch.
    pub last_claim_at: i64,
    /// Timestamps of successful claims inside the trailing window, ascending.
    pub history: Vec<i64>,
    /// Lifetime count of successful claims; unaffected by pruning.
    pub total_claims: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct CooldownStatus {
    pub can_claim: bool,
    pub remaining_secs: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct DailyStatus {
    pub can_claim: bool,
    pub claims_today: u32,
}

pub struct ClaimLedger {
    store: Arc<dyn Store>,
    cooldown_secs: i64,
    max_claims_per_day: u32,
}

impl ClaimLedger {
    pub fn new(store: Arc<dyn Store>, cooldown_secs: u64, max_claims_per_day: u32) -> Self {
        Self {
            store,
            cooldown_secs: cooldown_secs as i64,
            max_claims_per_day,
        }
    }

    fn key(address: &Address) -> Vec<u8> {
        format!("{}{}", KEY_PREFIX, address).into_bytes()
    }

    pub async fn record(&self, address: &Address) -> FaucetResult<Option<ClaimRecord>> {
        match self
            .store
            .get(&Self::key(address))
            .await
            .map_err(FaucetError::storage)?
        {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(FaucetError::storage),
            None => Ok(None),
        }
    }

    /// An address may claim again once `cooldown_secs` have elapsed since its
    /// last successful dispatch. Unknown addresses may always claim.
    pub async fn check_cooldown(&self, address: &Address, now: i64) -> FaucetResult<CooldownStatus> {
        let status = match self.record(address).await? {
            Some(record) => {
                let elapsed = now - record.last_claim_at;
                if elapsed >= self.cooldown_secs {
                    CooldownStatus {
                        can_claim: true,
                        remaining_secs: 0,
                    }
                } else {
                    CooldownStatus {
                        can_claim: false,
                        remaining_secs: (self.cooldown_secs - elapsed) as u64,
                    }
                }
            }
            None => CooldownStatus {
                can_claim: true,
                remaining_secs: 0,
            },
        };
        Ok(status)
    }

    /// Counts history entries within the current UTC calendar day.
    pub async fn check_daily_limit(&self, address: &Address, now: i64) -> FaucetResult<DailyStatus> {
        let claims_today = match self.record(address).await? {
            Some(record) => {
                let today = utc_day(now);
                record
                    .history
                    .iter()
                    .filter(|&&ts| utc_day(ts) == today)
                    .count() as u32
            }
            None => 0,
        };

        Ok(DailyStatus {
            can_claim: claims_today < self.max_claims_per_day,
            claims_today,
        })
    }

    /// Appends a confirmed claim and prunes history beyond the trailing
    /// window. Must only be called after the dispatch has been confirmed
    /// on-chain; recording earlier would let a failed transaction consume a
    /// claim slot.
    pub async fn record_claim(&self, address: &Address, now: i64) -> FaucetResult<ClaimRecord> {
        let mut record = self.record(address).await?.unwrap_or_default();

        record.history.push(now);
        record.last_claim_at = now;
        record.total_claims += 1;
        prune_history(&mut record, now);

        let bytes = bincode::serialize(&record).map_err(FaucetError::storage)?;
        self.store
            .put(&Self::key(address), &bytes)
            .await
            .map_err(FaucetError::storage)?;

        debug!(%address, total = record.total_claims, "Recorded claim");
        Ok(record)
    }

    /// Walks all claim records and drops history entries older than the
    /// trailing window. Returns how many records were rewritten.
    pub async fn prune_stale(&self, now: i64) -> FaucetResult<usize> {
        let mut rewritten = 0;

        for (key, value) in self
            .store
            .scan_prefix(KEY_PREFIX.as_bytes())
            .await
            .map_err(FaucetError::storage)?
        {
            let mut record: ClaimRecord =
                bincode::deserialize(&value).map_err(FaucetError::storage)?;
            let before = record.history.len();
            prune_history(&mut record, now);
            if record.history.len() != before {
                let bytes = bincode::serialize(&record).map_err(FaucetError::storage)?;
                self.store.put(&key, &bytes).await.map_err(FaucetError::storage)?;
                rewritten += 1;
            }
        }

        Ok(rewritten)
    }
}

fn prune_history(record: &mut ClaimRecord, now: i64) {
    let cutoff = now - HISTORY_WINDOW_SECS;
    record.history.retain(|&ts| ts > cutoff);
}

fn utc_day(ts: i64) -> i64 {
    ts.div_euclid(DAY_SECS)
}
