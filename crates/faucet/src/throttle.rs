//! Per-IP request throttle
//!
//! Two independent rules, evaluated under a per-IP lock: a minimum spacing
//! between requests and a rolling-hour cap. Consumption is optimistic: an
//! allowed request is counted before eligibility or dispatch run, and the
//! slot is not returned if they fail.

use crate::error::{FaucetError, FaucetResult};
use crate::locks::KeyedLocks;
use ande_storage::Store;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

const HOUR_SECS: i64 = 3_600;
const KEY_PREFIX: &str = "ip:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpThrottleRecord {
    /// Requests inside the current rolling hour.
    pub request_count: u32,
    /// Unix seconds of the most recent counted request.
    pub last_request_at: i64,
}

pub struct IpThrottle {
    store: Arc<dyn Store>,
    locks: KeyedLocks,
    min_interval_secs: i64,
    max_requests_per_hour: u32,
}

impl IpThrottle {
    pub fn new(store: Arc<dyn Store>, min_interval_secs: u64, max_requests_per_hour: u32) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(100_000),
            min_interval_secs: min_interval_secs as i64,
            max_requests_per_hour,
        }
    }

    /// Check both rules and, if allowed, consume a slot.
    ///
    /// Rejected requests leave the record untouched: a spacing rejection must
    /// not push the next allowed time further out, and a cap rejection must
    /// not extend the rolling window.
    pub async fn check_and_consume(&self, ip: IpAddr, now: i64) -> FaucetResult<()> {
        let key = format!("{}{}", KEY_PREFIX, ip);
        let _guard = self.locks.lock(&key).await;

        let stored = self
            .store
            .get(key.as_bytes())
            .await
            .map_err(FaucetError::storage)?;

        let record = match stored {
            None => IpThrottleRecord {
                request_count: 1,
                last_request_at: now,
            },
            Some(bytes) => {
                let mut record: IpThrottleRecord =
                    bincode::deserialize(&bytes).map_err(FaucetError::storage)?;
                let elapsed = now - record.last_request_at;

                if elapsed < self.min_interval_secs {
                    return Err(FaucetError::RateLimited {
                        retry_after_secs: (self.min_interval_secs - elapsed) as u64,
                    });
                }

                if elapsed > HOUR_SECS {
                    record.request_count = 0;
                }
                if record.request_count >= self.max_requests_per_hour {
                    return Err(FaucetError::RateLimited {
                        retry_after_secs: (HOUR_SECS - elapsed).max(0) as u64,
                    });
                }

                record.request_count += 1;
                record.last_request_at = now;
                record
            }
        };

        let bytes = bincode::serialize(&record).map_err(FaucetError::storage)?;
        self.store
            .put(key.as_bytes(), &bytes)
            .await
            .map_err(FaucetError::storage)?;

        debug!(%ip, count = record.request_count, "IP throttle slot consumed");
        Ok(())
    }

    #[cfg(test)]
    async fn record(&self, ip: IpAddr) -> FaucetResult<Option<IpThrottleRecord>> {
        let key = format!("{}{}", KEY_PREFIX, ip);
        match self
            .store
            .get(key.as_bytes())
            .await
            .map_err(FaucetError::storage)?
        {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(FaucetError::storage),
            None => Ok(None),
        }
    }
}
