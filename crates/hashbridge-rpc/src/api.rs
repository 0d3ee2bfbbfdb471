use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{GetOrdersParams, QuoteParams, RpcHealth, RpcOrder, RpcQuote, RpcStats, SubmitOrderParams};

/// hashbridge JSON-RPC 2.0 API definition. One-to-one with the
/// HTTP surface table: `POST /orders` -> `submitOrder`, `GET /orders` ->
/// `getOrders`, `GET /orders/:id` -> `getOrder`, `DELETE /orders/:id` ->
/// `cancelOrder`, `POST /quote` -> `quote`, `GET /stats` -> `getStats`,
/// `GET /health` -> `getHealth`. An HTTP/WS gateway translating verbs to
/// these JSON-RPC calls is out of scope for this crate; it only provides
/// the calls such a gateway would translate to.
#[rpc(server, namespace = "hashbridge")]
pub trait HashbridgeApi {
    #[method(name = "submitOrder")]
    async fn submit_order(&self, params: SubmitOrderParams) -> RpcResult<RpcOrder>;

    #[method(name = "getOrders")]
    async fn get_orders(&self, params: GetOrdersParams) -> RpcResult<Vec<RpcOrder>>;

    #[method(name = "getOrder")]
    async fn get_order(&self, order_id: String) -> RpcResult<Option<RpcOrder>>;

    #[method(name = "cancelOrder")]
    async fn cancel_order(&self, order_id: String) -> RpcResult<RpcOrder>;

    #[method(name = "quote")]
    async fn quote(&self, params: QuoteParams) -> RpcResult<RpcQuote>;

    #[method(name = "getStats")]
    async fn get_stats(&self) -> RpcResult<RpcStats>;

    #[method(name = "getHealth")]
    async fn get_health(&self) -> RpcResult<RpcHealth>;
}
