//! Wire types for the `hashbridge` JSON-RPC namespace. Amounts
//! are string-encoded `u128`, hashlocks/preimages are `0x`-prefixed hex —
//! the same idiom `chronx_rpc::types` uses for `balance_chronos` and
//! hex-encoded transaction ids.

use serde::{Deserialize, Serialize};

use hashbridge_core::error::RelayError;
use hashbridge_core::order::{Escrow, EscrowStatus, Order, OrderStatus};
use hashbridge_core::types::{AssetKey, Chain};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcAssetKey {
    pub chain: Chain,
    pub symbol: String,
}

impl From<AssetKey> for RpcAssetKey {
    fn from(a: AssetKey) -> Self {
        Self { chain: a.chain, symbol: a.symbol }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcOrder {
    pub order_id: String,
    pub maker: String,
    pub receiver: String,
    pub maker_asset: RpcAssetKey,
    pub taker_asset: RpcAssetKey,
    pub making_amount: String,
    pub taking_amount: String,
    pub hashlock: String,
    pub timelock: i64,
    pub auction_start_time: i64,
    pub auction_end_time: i64,
    pub status: OrderStatus,
    pub created_at: i64,
    pub last_transition_at: i64,
    pub escrows: Vec<RpcEscrow>,
}

impl RpcOrder {
    pub fn from_order(order: Order, escrows: Vec<Escrow>) -> Self {
        Self {
            order_id: order.order_id.to_string(),
            maker: order.maker.0,
            receiver: order.receiver.0,
            maker_asset: order.maker_asset.into(),
            taker_asset: order.taker_asset.into(),
            making_amount: order.making_amount.to_string(),
            taking_amount: order.taking_amount.to_string(),
            hashlock: order.hashlock.to_hex_0x(),
            timelock: order.timelock,
            auction_start_time: order.auction_start_time,
            auction_end_time: order.auction_end_time,
            status: order.status,
            created_at: order.created_at,
            last_transition_at: order.last_transition_at,
            escrows: escrows.into_iter().map(RpcEscrow::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcEscrow {
    pub chain: Chain,
    pub contract_id: String,
    pub amount: String,
    pub status: EscrowStatus,
    pub tx_hash: String,
    pub height: u64,
}

impl From<Escrow> for RpcEscrow {
    fn from(e: Escrow) -> Self {
        Self {
            chain: e.chain,
            contract_id: hex::encode(e.contract_id),
            amount: e.amount.to_string(),
            status: e.status,
            tx_hash: e.tx_hash,
            height: e.height,
        }
    }
}

/// `POST /orders` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitOrderParams {
    pub maker: String,
    pub receiver: String,
    pub maker_asset: RpcAssetKey,
    pub taker_asset: RpcAssetKey,
    pub making_amount: String,
    pub taking_amount: String,
    pub timelock: Option<i64>,
    pub secret_hashes: Option<Vec<String>>,
}

/// `GET /orders?status=&maker=&limit=&offset=`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetOrdersParams {
    pub status: Option<OrderStatus>,
    pub maker: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcOrderCounts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub expired: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcStats {
    pub orders: RpcOrderCounts,
    pub liquidity_status: RpcLiquidityStatus,
    pub monitoring: RpcMonitoringStatus,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcLiquidityStatus {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcMonitoringStatus {
    pub ethereum_connected: bool,
    pub stellar_connected: bool,
    pub ethereum_monitoring: bool,
    pub stellar_monitoring: bool,
}

/// `GET /health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcHealth {
    pub running: bool,
    pub chains_connected: RpcMonitoringStatus,
    pub chains_monitoring: RpcMonitoringStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuoteParams {
    pub order_id: String,
}

/// `POST /quote` → auction quote snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcQuote {
    pub order_id: String,
    pub price_num: String,
    pub price_den: String,
    pub committed: bool,
}

/// `{kind, message, details}` API error shape, mirroring
/// `chronx-rpc::server::rpc_err`'s `ErrorObject::owned` helper.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: String,
    pub message: String,
    pub details: Option<String>,
}

impl From<&RelayError> for ApiError {
    fn from(e: &RelayError) -> Self {
        Self { kind: e.kind().to_string(), message: e.to_string(), details: None }
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        ApiError::from(&e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbridge_core::types::{ChainAddress, Hashlock, Price};

    fn sample_order() -> Order {
        Order {
            order_id: hashbridge_core::types::OrderId::new("o1"),
            maker: ChainAddress("0xA".into()),
            receiver: ChainAddress("GB...B".into()),
            maker_asset: AssetKey::new(Chain::Ethereum, "ETH"),
            taker_asset: AssetKey::new(Chain::Stellar, "XLM"),
            making_amount: 1_000,
            taking_amount: 2_000,
            hashlock: Hashlock([9u8; 32]),
            timelock: 1000,
            auction_start_time: 0,
            auction_end_time: 500,
            reserve_price: Price::new(1, 1),
            secret_hashes: vec![],
            safety_deposit: 0,
            status: OrderStatus::Pending,
            created_at: 0,
            last_transition_at: 0,
        }
    }

    #[test]
    fn order_conversion_string_encodes_amounts() {
        let rpc = RpcOrder::from_order(sample_order(), vec![]);
        assert_eq!(rpc.making_amount, "1000");
        assert_eq!(rpc.taking_amount, "2000");
        assert!(rpc.hashlock.starts_with("0x"));
    }

    #[test]
    fn api_error_carries_kind_and_message() {
        let err = RelayError::InvalidInput("bad amount".into());
        let api: ApiError = err.into();
        assert_eq!(api.kind, "InvalidInput");
        assert!(api.message.contains("bad amount"));
    }
}
