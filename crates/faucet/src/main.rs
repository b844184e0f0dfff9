//! Faucet service binary

use ande_faucet::{api, FaucetConfig, FaucetService};
use ande_storage::{MemoryStore, SledStore, Store};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Faucet service CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server listen address
    #[arg(long)]
    server_addr: Option<String>,

    /// RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Hot wallet private key (prefer FAUCET_PRIVATE_KEY)
    #[arg(long)]
    private_key: Option<String>,

    /// Claim amount (in wei)
    #[arg(long)]
    claim_amount: Option<u128>,

    /// Ledger database path
    #[arg(long)]
    db_path: Option<String>,

    /// Keep ledgers in memory (limits reset on restart)
    #[arg(long)]
    in_memory: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let env_filter = if args.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ANDE Faucet Service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = FaucetConfig::from_env()?;

    // Override with CLI arguments
    if let Some(addr) = args.server_addr {
        config.server_addr = addr;
    }
    if let Some(rpc_url) = args.rpc_url {
        config.rpc_url = rpc_url;
    }
    if let Some(key) = args.private_key {
        config.private_key = key;
    }
    if let Some(amount) = args.claim_amount {
        config.claim_amount_wei = amount;
    }
    if let Some(db_path) = args.db_path {
        config.db_path = db_path;
    }
    if args.in_memory {
        config.in_memory_store = true;
    }

    // Fail fast on broken configuration
    config.validate()?;

    info!("Configuration:");
    info!("  Server address: {}", config.server_addr);
    info!("  RPC URL: {}", config.rpc_url);
    info!("  Network: {} (chain id {})", config.network, config.chain_id);
    info!("  Claim amount: {} wei", config.claim_amount_wei);
    info!(
        "  Cooldown: {}s, daily limit: {}",
        config.cooldown_secs, config.max_claims_per_day
    );
    info!(
        "  IP throttle: {}/hour, min spacing {}s",
        config.max_ip_requests_per_hour, config.min_ip_interval_secs
    );

    // Open the ledger store
    let store: Arc<dyn Store> = if config.in_memory_store {
        warn!("Using in-memory ledgers: limits reset on restart");
        Arc::new(MemoryStore::new())
    } else {
        info!("Ledger database at: {}", config.db_path);
        Arc::new(SledStore::open(&config.db_path)?)
    };

    // Create faucet service
    let service = Arc::new(FaucetService::new(config.clone(), store)?);
    info!("Faucet service initialized");

    // Cross-check the chain ID; a mismatch means every dispatch would fail.
    match service.verify_chain_id().await {
        Ok(remote) => info!("RPC endpoint reports chain id {}", remote),
        Err(e) => warn!("Could not verify chain id at startup: {}", e),
    }

    // Build router
    let mut app = api::router(service.clone()).layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
        info!("CORS enabled");
    }

    // Daily history pruning
    let pruner = service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(86_400));
        loop {
            interval.tick().await;
            let now = chrono::Utc::now().timestamp();
            match pruner.ledger().prune_stale(now).await {
                Ok(count) => info!("Pruned claim history in {} records", count),
                Err(e) => warn!("History pruning failed: {}", e),
            }
        }
    });

    // Start server
    let addr: SocketAddr = config.server_addr.parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutting down gracefully");
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
