//! HTTP API for the faucet service

use crate::error::FaucetError;
use crate::service::{ClaimStatus, FaucetInfo, FaucetService};
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ande_common::Hash;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::error;

const WEI_PER_ANDE: u128 = 1_000_000_000_000_000_000;

/// Claim request body
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub success: bool,
    pub message: String,
    pub tx_hash: Hash,
    /// Dispensed amount in wei, as a decimal string.
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub success: bool,
    #[serde(flatten)]
    pub info: FaucetInfo,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(flatten)]
    pub status: ClaimStatus,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub address: Option<String>,
}

pub fn router(service: Arc<FaucetService>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/faucet/claim",
            post(claim_handler).get(faucet_info_handler),
        )
        .route("/api/faucet/status", get(status_handler))
        .with_state(service)
}

/// Claim handler
pub async fn claim_handler(
    State(service): State<Arc<FaucetService>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<ClaimRequest>,
) -> Response {
    let ip = client_ip(&headers, peer);

    match service.claim(&request.address, ip).await {
        Ok(receipt) => Json(ClaimResponse {
            success: true,
            message: format!(
                "Sent {} to {}",
                format_ande(receipt.amount_wei),
                receipt.address
            ),
            tx_hash: receipt.tx_hash,
            amount: receipt.amount_wei.to_string(),
        })
        .into_response(),
        Err(err) => {
            error!("Claim failed: {}", err);
            err.into_response()
        }
    }
}

/// Faucet info handler
pub async fn faucet_info_handler(State(service): State<Arc<FaucetService>>) -> Response {
    match service.info().await {
        Ok(info) => Json(InfoResponse {
            success: true,
            info,
        })
        .into_response(),
        Err(err) => {
            error!("Faucet info failed: {}", err);
            err.into_response()
        }
    }
}

/// Claim status handler
pub async fn status_handler(
    State(service): State<Arc<FaucetService>>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let Some(address) = query.address else {
        return FaucetError::InvalidAddress("missing address query parameter".to_string())
            .into_response();
    };

    match service.claim_status(&address).await {
        Ok(status) => Json(StatusResponse {
            success: true,
            status,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Prometheus metrics handler
pub async fn metrics_handler(State(service): State<Arc<FaucetService>>) -> Response {
    match service.metrics().gather() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics error: {}", err),
        )
            .into_response(),
    }
}

/// Root handler with endpoint listing
pub async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "ANDE Faucet",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /api/faucet/claim": "Request tokens",
            "GET /api/faucet/claim": "Faucet info",
            "GET /api/faucet/status": "Claim eligibility for an address",
            "GET /health": "Health check",
            "GET /metrics": "Prometheus metrics"
        }
    }))
}

/// First hop of `X-Forwarded-For` when present, else the socket peer.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .unwrap_or_else(|| peer.ip())
}

fn format_ande(wei: u128) -> String {
    let whole = wei / WEI_PER_ANDE;
    let frac = wei % WEI_PER_ANDE;
    if frac == 0 {
        format!("{} ANDE", whole)
    } else {
        let digits = format!("{:018}", frac);
        format!("{}.{} ANDE", whole, digits.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FaucetConfig;
    use crate::rpc::testing::MockRpc;
    use ande_storage::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use k256::ecdsa::SigningKey;
    use tower::ServiceExt;

    const RECIPIENT: &str = "0x00000000000000000000000000000000000000aa";

    fn test_app() -> Router {
        let config = FaucetConfig {
            private_key: {
                let key = SigningKey::random(&mut rand::thread_rng());
                format!("0x{}", hex::encode(key.to_bytes()))
            },
            confirm_timeout_secs: 5,
            receipt_poll_interval_ms: 1,
            ..FaucetConfig::default()
        };
        let rpc = Arc::new(MockRpc::new(config.claim_amount_wei * 10));
        let service =
            FaucetService::with_rpc(config, Arc::new(MemoryStore::new()), rpc).unwrap();
        router(Arc::new(service))
    }

    fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        let mut request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 41000))));
        request
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn claim_round_trip() {
        let app = test_app();
        let response = app
            .oneshot(request(
                "POST",
                "/api/faucet/claim",
                Some(serde_json::json!({ "address": RECIPIENT })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert!(json["txHash"].as_str().unwrap().starts_with("0x"));
        assert_eq!(json["amount"], "100000000000000000000");
    }

    #[tokio::test]
    async fn malformed_address_is_bad_request() {
        let app = test_app();
        let response = app
            .oneshot(request(
                "POST",
                "/api/faucet/claim",
                Some(serde_json::json!({ "address": "0x123" })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "INVALID_ADDRESS");
    }

    #[tokio::test]
    async fn status_reports_fresh_address() {
        let app = test_app();
        let response = app
            .oneshot(request(
                "GET",
                &format!("/api/faucet/status?address={}", RECIPIENT),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["canClaim"], true);
        assert_eq!(json["claimsToday"], 0);
        assert_eq!(json["maxClaimsPerDay"], 3);
        assert_eq!(json["cooldownRemaining"], 0);
        assert!(json["lastClaimAt"].is_null());
    }

    #[tokio::test]
    async fn status_without_address_is_bad_request() {
        let app = test_app();
        let response = app
            .oneshot(request("GET", "/api/faucet/status", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn faucet_info_shape() {
        let app = test_app();
        let response = app
            .oneshot(request("GET", "/api/faucet/claim", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["network"], "ande-testnet");
        assert_eq!(json["maxClaimsPerDay"], 3);
        assert_eq!(json["cooldownHours"], 24);
        assert!(json["faucetAddress"].as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = test_app();
        let response = app.oneshot(request("GET", "/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let peer = SocketAddr::from(([10, 0, 0, 1], 9000));

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.2".parse().unwrap());
        assert_eq!(
            client_ip(&headers, peer),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );

        let empty = HeaderMap::new();
        assert_eq!(client_ip(&empty, peer), peer.ip());

        let mut garbage = HeaderMap::new();
        garbage.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        assert_eq!(client_ip(&garbage, peer), peer.ip());
    }

    #[test]
    fn amounts_render_in_whole_tokens() {
        assert_eq!(format_ande(100_000_000_000_000_000_000), "100 ANDE");
        assert_eq!(format_ande(1_500_000_000_000_000_000), "1.5 ANDE");
    }
}
