//! hashbridge-node — the hashbridge relayer/resolver binary.
//!
//! Startup sequence:
//!   1. Load config (TOML, or documented defaults) and the asset registry
//!   2. Build the in-memory store and every domain component, all sharing
//!      one `RelayEvent` broadcast bus
//!   3. Start the Event Monitor (connects both chain clients, begins
//!      fanning in their event streams)
//!   4. Spawn the Relayer Controller's event loop, the balance-refresh
//!      loop per registered asset, the reservation-cleanup sweep, and the
//!      timeout sweep
//!   5. Start the JSON-RPC server
//!   6. Wait for Ctrl-C, then broadcast shutdown and join every task

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use hashbridge_auction::DutchAuction;
use hashbridge_chain::{ChainClient, EthereumChainClient, StellarChainClient};
use hashbridge_controller::RelayerController;
use hashbridge_core::config::RelayConfig;
use hashbridge_core::types::{Chain, Price};
use hashbridge_lifecycle::LifecycleManager;
use hashbridge_liquidity::{AssetConfig, AssetRegistry, BalanceTracker, LiquidityManager, ReservationTracker};
use hashbridge_monitor::EventMonitor;
use hashbridge_rpc::{RpcServer, RpcServerState};
use hashbridge_secrets::SecretManager;
use hashbridge_store::OrderStore;

#[derive(Parser, Debug)]
#[command(
    name = "hashbridge-node",
    version,
    about = "hashbridge relayer/resolver — a cross-chain HTLC swap facilitator"
)]
struct Args {
    /// Ethereum chain client RPC endpoint.
    #[arg(long, default_value = "http://127.0.0.1:8545")]
    ethereum_rpc: String,

    /// Stellar chain client RPC endpoint.
    #[arg(long, default_value = "http://127.0.0.1:8000/soroban/rpc")]
    stellar_rpc: String,

    /// Block/ledger height to resume Ethereum monitoring from.
    #[arg(long, default_value_t = 0)]
    ethereum_from_height: u64,

    /// Ledger height to resume Stellar monitoring from.
    #[arg(long, default_value_t = 0)]
    stellar_from_height: u64,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8645")]
    rpc_addr: SocketAddr,

    /// Path to a `RelayConfig` TOML file (defaults applied for any field
    /// the file omits); falls back to compiled-in defaults if unset.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a TOML file listing the registered assets (`[[assets]]`
    /// tables, one per `AssetConfig`). Required — the relayer has no
    /// liquidity to offer for an asset it hasn't registered.
    #[arg(long)]
    assets: PathBuf,

    /// Dutch-auction opening-price premium over `reserve_price`, in basis
    /// points. A deployment parameter. Default: 1000 (10%).
    #[arg(long, default_value_t = 1_000)]
    auction_premium_bps: u64,
}

#[derive(Deserialize)]
struct AssetRegistryFile {
    assets: Vec<AssetConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hashbridge=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("hashbridge node starting");

    let config = match &args.config {
        Some(path) => RelayConfig::load(path).context("loading relay config")?,
        None => RelayConfig::default(),
    };

    let asset_text = std::fs::read_to_string(&args.assets)
        .with_context(|| format!("reading asset registry {}", args.assets.display()))?;
    let asset_file: AssetRegistryFile = toml::from_str(&asset_text).context("parsing asset registry")?;

    let (events_tx, _events_rx) = broadcast::channel(1024);

    let store = Arc::new(OrderStore::new());
    let lifecycle = Arc::new(LifecycleManager::new(store.clone()));
    let secrets = Arc::new(SecretManager::new(store.clone()));

    let ethereum: Arc<dyn ChainClient> = Arc::new(EthereumChainClient::new(
        args.ethereum_rpc.clone(),
        Duration::from_secs(config.monitoring_poll_interval_seconds),
    ));
    let stellar: Arc<dyn ChainClient> = Arc::new(StellarChainClient::new(
        args.stellar_rpc.clone(),
        Duration::from_secs(config.monitoring_poll_interval_seconds),
    ));

    let registry = Arc::new(AssetRegistry::new());
    for asset in &asset_file.assets {
        info!(asset = %asset.asset, decimals = asset.decimals, "registering asset");
        registry.register(asset.clone()).context("registering asset")?;
    }

    let balances = Arc::new(BalanceTracker::new(
        Duration::from_secs(config.cache_ttl_seconds),
        events_tx.clone(),
    ));
    let reservations = Arc::new(ReservationTracker::new(
        config.reservation_timeout_seconds as i64,
        events_tx.clone(),
    ));

    let mut chains: HashMap<Chain, Arc<dyn ChainClient>> = HashMap::new();
    chains.insert(Chain::Ethereum, ethereum.clone());
    chains.insert(Chain::Stellar, stellar.clone());

    let liquidity = Arc::new(LiquidityManager::new(
        registry.clone(),
        balances.clone(),
        reservations.clone(),
        chains,
        events_tx.clone(),
    ));

    let premium = Price::new(10_000 + args.auction_premium_bps as u128, 10_000);
    let auction = Arc::new(DutchAuction::new(liquidity.clone(), premium));

    let controller = Arc::new(RelayerController::new(
        store.clone(),
        lifecycle.clone(),
        secrets,
        ethereum.clone(),
        stellar.clone(),
        events_tx.clone(),
    ));

    let monitor = Arc::new(EventMonitor::new(store.clone(), events_tx.clone()));
    let domain_events = monitor
        .start(ethereum.clone(), stellar.clone(), args.ethereum_from_height, args.stellar_from_height)
        .await
        .context("starting event monitor")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let controller_task = tokio::spawn(controller.clone().run(domain_events, shutdown_rx.clone()));

    for asset in &asset_file.assets {
        let client = chain_client_for(&asset.asset.chain, &ethereum, &stellar);
        balances.spawn_refresh_loop(
            asset.asset.chain,
            asset.asset.clone(),
            client,
            Duration::from_secs(config.balance_update_interval_seconds),
        );
    }

    let reservation_sweep_task = tokio::spawn(periodic_sweep(
        shutdown_rx.clone(),
        Duration::from_secs(config.reservation_cleanup_interval_seconds),
        {
            let reservations = reservations.clone();
            move |now| {
                let reservations = reservations.clone();
                async move {
                    let dropped = reservations.cleanup_expired(now);
                    if dropped > 0 {
                        info!(dropped, "reservation cleanup sweep");
                    }
                }
            }
        },
    ));

    let timeout_sweep_task = tokio::spawn(periodic_sweep(
        shutdown_rx.clone(),
        Duration::from_secs(config.sweeper_interval_seconds),
        {
            let controller = controller.clone();
            move |now| {
                let controller = controller.clone();
                async move { controller.sweep_timeouts(now).await }
            }
        },
    ));

    let rpc_state = Arc::new(RpcServerState {
        store,
        lifecycle,
        liquidity,
        auction,
        monitor,
        config,
        events: events_tx,
    });
    let rpc_handle = RpcServer::new(rpc_state).start(args.rpc_addr).await.context("starting RPC server")?;

    info!("hashbridge node ready");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown requested");

    let _ = shutdown_tx.send(true);
    let _ = rpc_handle.stop();
    let _ = tokio::join!(controller_task, reservation_sweep_task, timeout_sweep_task);

    Ok(())
}

fn chain_client_for(
    chain: &Chain,
    ethereum: &Arc<dyn ChainClient>,
    stellar: &Arc<dyn ChainClient>,
) -> Arc<dyn ChainClient> {
    match chain {
        Chain::Ethereum => ethereum.clone(),
        Chain::Stellar => stellar.clone(),
    }
}

/// Run `tick` on every `interval` until `shutdown` fires, passing the
/// current unix timestamp each time.
async fn periodic_sweep<F, Fut>(mut shutdown: watch::Receiver<bool>, interval: Duration, tick: F)
where
    F: Fn(i64) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                tick(now).await;
            }
        }
    }
}
