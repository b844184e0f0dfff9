//! Error types for the faucet service

use ande_common::Hash;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Faucet service errors
#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Rate limit exceeded: try again in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Cooldown active: try again in {retry_after_secs} seconds")]
    CooldownActive { retry_after_secs: u64 },

    #[error("Daily claim limit reached ({claims_today}/{max_claims_per_day})")]
    DailyLimitReached {
        claims_today: u32,
        max_claims_per_day: u32,
    },

    #[error("Insufficient funds in faucet")]
    InsufficientFaucetFunds,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gas price too low")]
    GasPriceTooLow,

    #[error("Nonce expired")]
    NonceExpired,

    #[error("Transaction {0} reverted")]
    TransactionReverted(Hash),

    #[error("Timed out waiting for confirmation of {0}")]
    ConfirmationTimeout(Hash),

    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FaucetError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        FaucetError::Storage(err.to_string())
    }

    /// Stable machine-readable code, used in HTTP bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            FaucetError::InvalidAddress(_) => "INVALID_ADDRESS",
            FaucetError::RateLimited { .. } => "RATE_LIMITED",
            FaucetError::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            FaucetError::DailyLimitReached { .. } => "DAILY_LIMIT_REACHED",
            FaucetError::InsufficientFaucetFunds => "INSUFFICIENT_FAUCET_FUNDS",
            FaucetError::Network(_) => "NETWORK_ERROR",
            FaucetError::GasPriceTooLow => "GAS_PRICE_TOO_LOW",
            FaucetError::NonceExpired => "NONCE_EXPIRED",
            FaucetError::TransactionReverted(_) => "TRANSACTION_REVERTED",
            FaucetError::ConfirmationTimeout(_) => "CONFIRMATION_TIMEOUT",
            FaucetError::Dispatch(_) => "DISPATCH_FAILED",
            FaucetError::Storage(_) => "STORAGE_ERROR",
            FaucetError::Config(_) => "CONFIGURATION_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            FaucetError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            FaucetError::RateLimited { .. }
            | FaucetError::CooldownActive { .. }
            | FaucetError::DailyLimitReached { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            FaucetError::RateLimited { retry_after_secs }
            | FaucetError::CooldownActive { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    fn user_message(&self) -> String {
        match self {
            FaucetError::RateLimited { retry_after_secs } => format!(
                "Too many requests from this IP. Try again in {} minute(s).",
                minutes_ceil(*retry_after_secs)
            ),
            FaucetError::CooldownActive { retry_after_secs } => format!(
                "This address claimed recently. Try again in {} hour(s).",
                hours_ceil(*retry_after_secs)
            ),
            FaucetError::DailyLimitReached {
                claims_today,
                max_claims_per_day,
            } => format!(
                "Daily claim limit reached ({} of {} today). Try again after midnight UTC.",
                claims_today, max_claims_per_day
            ),
            FaucetError::InsufficientFaucetFunds => {
                "Faucet is out of funds. Please try again later.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.code(),
            "message": self.user_message(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Some(secs) = self.retry_after_secs() {
            body["retryAfterSecs"] = json!(secs);
        }

        (self.status_code(), Json(body)).into_response()
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;

fn minutes_ceil(secs: u64) -> u64 {
    ((secs + 59) / 60).max(1)
}

fn hours_ceil(secs: u64) -> u64 {
    ((secs + 3599) / 3600).max(1)
}
