//! JSON-RPC server implementation: binds the `hashbridge`
//! namespace defined in `api.rs` to the live order store, lifecycle
//! manager, liquidity manager, and Dutch auction, the same shape
//! `chronx_rpc::server::RpcServer` uses to bind `chronx_state::StateDb`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use rand::RngCore;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use hashbridge_auction::{AuctionDecision, DutchAuction};
use hashbridge_core::config::RelayConfig;
use hashbridge_core::error::RelayError;
use hashbridge_core::order::{Order, OrderStatus};
use hashbridge_core::types::{AssetKey, ChainAddress, Hashlock, OrderId, Price};
use hashbridge_lifecycle::{LifecycleEvent, LifecycleManager};
use hashbridge_liquidity::LiquidityManager;
use hashbridge_monitor::EventMonitor;
use hashbridge_store::{OrderFilter, OrderStore};

use crate::api::HashbridgeApiServer;
use crate::types::{
    ApiError, GetOrdersParams, QuoteParams, RpcHealth, RpcLiquidityStatus, RpcMonitoringStatus,
    RpcOrder, RpcOrderCounts, RpcQuote, RpcStats, SubmitOrderParams,
};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

fn map_err(e: RelayError) -> ErrorObject<'static> {
    let api: ApiError = e.into();
    let code = match api.kind.as_str() {
        "InvalidInput" | "InvalidPreimage" | "IllegalTransition" => -32602,
        "OrderNotFound" => -32001,
        _ => -32603,
    };
    rpc_err(code, api.message)
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// State shared by every RPC call. Built once by the node binary and
/// cloned into the server as an `Arc`.
pub struct RpcServerState {
    pub store: Arc<OrderStore>,
    pub lifecycle: Arc<LifecycleManager>,
    pub liquidity: Arc<LiquidityManager>,
    pub auction: Arc<DutchAuction>,
    pub monitor: Arc<EventMonitor>,
    pub config: RelayConfig,
    pub events: tokio::sync::broadcast::Sender<hashbridge_core::event::RelayEvent>,
}

pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS. Returns a
    /// handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "hashbridge RPC server started");
        Ok(handle)
    }
}

#[async_trait]
impl HashbridgeApiServer for RpcServer {
    async fn submit_order(&self, params: SubmitOrderParams) -> RpcResult<RpcOrder> {
        let maker_asset = AssetKey::new(params.maker_asset.chain, params.maker_asset.symbol);
        let taker_asset = AssetKey::new(params.taker_asset.chain, params.taker_asset.symbol);

        let making_amount: u128 = params
            .making_amount
            .parse()
            .map_err(|_| rpc_err(-32602, "making_amount is not a valid integer string"))?;
        let taking_amount: u128 = params
            .taking_amount
            .parse()
            .map_err(|_| rpc_err(-32602, "taking_amount is not a valid integer string"))?;

        let secret_hashes = params
            .secret_hashes
            .unwrap_or_default()
            .iter()
            .map(|s| Hashlock::from_hex_0x(s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| rpc_err(-32602, format!("invalid secret_hashes entry: {e}")))?;
        let hashlock = *secret_hashes
            .first()
            .ok_or_else(|| rpc_err(-32602, "secret_hashes must carry at least one hashlock"))?;
        if making_amount == 0 {
            return Err(rpc_err(-32602, "making_amount must be > 0"));
        }

        let now = now_unix();
        let auction_start_time = now;
        let auction_end_time = now + self.state.config.auction_default_duration_seconds as i64;
        let timelock = params
            .timelock
            .unwrap_or(auction_end_time + self.state.config.escrow_timelock_safety_margin_seconds);

        let mut random_bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut random_bytes);
        let order = Order {
            order_id: OrderId::generate(now * 1000, &random_bytes),
            maker: ChainAddress(params.maker),
            receiver: ChainAddress(params.receiver),
            maker_asset,
            taker_asset,
            making_amount,
            taking_amount,
            hashlock,
            timelock,
            auction_start_time,
            auction_end_time,
            reserve_price: Price::new(taking_amount, making_amount),
            secret_hashes,
            safety_deposit: 0,
            status: OrderStatus::Pending,
            created_at: now,
            last_transition_at: now,
        };
        order.validate_invariants().map_err(map_err)?;

        self.state.store.insert_order(order.clone()).map_err(map_err)?;
        self.state
            .lifecycle
            .apply(&order.order_id, LifecycleEvent::Submit, now)
            .await
            .map_err(map_err)?;
        let _ = self
            .state
            .events
            .send(hashbridge_core::event::RelayEvent::OrderCreated { order_id: order.order_id.clone() });
        let order = self.state.store.get_order(&order.order_id).unwrap();
        Ok(RpcOrder::from_order(order.clone(), self.state.store.escrows_for_order(&order.order_id)))
    }

    async fn get_orders(&self, params: GetOrdersParams) -> RpcResult<Vec<RpcOrder>> {
        let filter = OrderFilter {
            status: params.status,
            maker: params.maker,
            limit: params.limit,
            offset: params.offset.unwrap_or(0),
        };
        let orders = self.state.store.list_orders(&filter);
        Ok(orders
            .into_iter()
            .map(|o| {
                let escrows = self.state.store.escrows_for_order(&o.order_id);
                RpcOrder::from_order(o, escrows)
            })
            .collect())
    }

    async fn get_order(&self, order_id: String) -> RpcResult<Option<RpcOrder>> {
        let id = OrderId::new(order_id);
        Ok(self.state.store.get_order(&id).map(|o| {
            let escrows = self.state.store.escrows_for_order(&id);
            RpcOrder::from_order(o, escrows)
        }))
    }

    /// Only `auction_active` orders are cancellable through this surface —
    /// the order hasn't committed an auction fill or touched an escrow yet,
    /// matching "non-terminal, non-escrowed" the narrowest way the state
    /// machine supports it. Any other status is rejected with the
    /// underlying illegal-transition error.
    async fn cancel_order(&self, order_id: String) -> RpcResult<RpcOrder> {
        let id = OrderId::new(order_id);
        let now = now_unix();
        self.state
            .lifecycle
            .apply(&id, LifecycleEvent::Cancel, now)
            .await
            .map_err(map_err)?;
        self.state.auction.release(&id);
        self.state.liquidity.release(&id);
        let order = self
            .state
            .store
            .get_order(&id)
            .ok_or_else(|| rpc_err(-32001, "order not found"))?;
        let escrows = self.state.store.escrows_for_order(&id);
        Ok(RpcOrder::from_order(order, escrows))
    }

    async fn quote(&self, params: QuoteParams) -> RpcResult<RpcQuote> {
        let id = OrderId::new(params.order_id);
        let order = self
            .state
            .store
            .get_order(&id)
            .ok_or_else(|| rpc_err(-32001, "order not found"))?;
        let now = now_unix();
        let (price, decision) = self.state.auction.tick(&order, now).await.map_err(map_err)?;
        if matches!(decision, AuctionDecision::Committed) {
            let _ = self.state.lifecycle.apply(&id, LifecycleEvent::Fill, now).await;
        }
        Ok(RpcQuote {
            order_id: id.to_string(),
            price_num: price.num.to_string(),
            price_den: price.den.to_string(),
            committed: matches!(decision, AuctionDecision::Committed),
        })
    }

    async fn get_stats(&self) -> RpcResult<RpcStats> {
        let store = &self.state.store;
        let orders = RpcOrderCounts {
            total: store.total_orders(),
            active: store.count_by_status(OrderStatus::AuctionActive),
            completed: store.count_by_status(OrderStatus::Completed),
            cancelled: store.count_by_status(OrderStatus::Cancelled),
            expired: store.count_by_status(OrderStatus::Expired),
        };
        let snapshot = self.state.liquidity.snapshot().await;
        let liquidity_status = RpcLiquidityStatus {
            healthy: snapshot.healthy_count(),
            warning: snapshot.warning_count(),
            critical: snapshot.critical_count(),
        };
        let health = self.state.monitor.health();
        let health = health.read().await;
        let monitoring = RpcMonitoringStatus {
            ethereum_connected: health.ethereum_connected,
            stellar_connected: health.stellar_connected,
            ethereum_monitoring: health.ethereum_monitoring,
            stellar_monitoring: health.stellar_monitoring,
        };
        Ok(RpcStats { orders, liquidity_status, monitoring })
    }

    async fn get_health(&self) -> RpcResult<RpcHealth> {
        let health = self.state.monitor.health();
        let health = health.read().await;
        let status = RpcMonitoringStatus {
            ethereum_connected: health.ethereum_connected,
            stellar_connected: health.stellar_connected,
            ethereum_monitoring: health.ethereum_monitoring,
            stellar_monitoring: health.stellar_monitoring,
        };
        Ok(RpcHealth {
            running: self.state.monitor.is_running(),
            chains_connected: status.clone(),
            chains_monitoring: status,
        })
    }
}
