//! hashbridge-rpc
//!
//! JSON-RPC surface over the order store, lifecycle manager,
//! liquidity manager, and Dutch auction: the wire-facing translation of
//! `POST /orders`, `GET /orders`, `GET /orders/:id`, `DELETE /orders/:id`,
//! `POST /quote`, `GET /stats`, and `GET /health` into one namespaced
//! `jsonrpsee` module, grounded on `chronx_rpc`'s `ChronxApi`/`RpcServer`
//! split between trait definition and implementation.

pub mod api;
pub mod server;
pub mod types;

pub use api::HashbridgeApiServer;
pub use server::{RpcServer, RpcServerState};
pub use types::*;
