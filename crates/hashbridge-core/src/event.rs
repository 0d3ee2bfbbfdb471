//! Domain event shapes shared by the chain clients, the event monitor, the
//! controller, and the RPC layer.
//!
//! Modeled as tagged variants rather than dynamic dictionaries — an
//! opaque-dictionary shape was considered and rejected as a mistake to
//! correct, not a pattern to keep.

use serde::{Deserialize, Serialize};

use crate::types::{AssetKey, Chain, Hashlock, OrderId, Preimage, Timestamp};

/// An event as emitted by a single chain client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChainEvent {
    EscrowCreated {
        order_id: OrderId,
        contract_id: Vec<u8>,
        amount: u128,
        asset: AssetKey,
        hashlock: Hashlock,
        timelock: Timestamp,
        tx_hash: String,
        height: u64,
    },
    SecretRevealed {
        order_id: OrderId,
        preimage: Preimage,
        tx_hash: String,
        revealer: String,
        height: u64,
    },
    EscrowClaimed {
        order_id: OrderId,
        contract_id: Vec<u8>,
        tx_hash: String,
        height: u64,
    },
    EscrowRefunded {
        order_id: OrderId,
        contract_id: Vec<u8>,
        tx_hash: String,
        height: u64,
    },
    Error {
        kind: String,
        message: String,
    },
    /// One-shot signal emitted by `start_monitoring()` once the client has
    /// captured its starting tip.
    Ready {
        from_height: u64,
    },
}

/// A `ChainEvent` tagged with the chain it came from — the shape the Event
/// Monitor republishes downstream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomainEvent {
    pub chain: Chain,
    pub event: ChainEvent,
}

/// Monitoring health snapshot, also returned by `GET /health`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct MonitoringHealth {
    pub ethereum_connected: bool,
    pub stellar_connected: bool,
    pub ethereum_monitoring: bool,
    pub stellar_monitoring: bool,
}

/// Outward-facing events published alongside chain events: balance changes,
/// liquidity alerts, order lifecycle milestones.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RelayEvent {
    OrderCreated {
        order_id: OrderId,
    },
    SwapCompleted {
        order_id: OrderId,
    },
    ChainError {
        chain: Chain,
        kind: String,
        message: String,
    },
    BalanceChanged {
        chain: Chain,
        asset: String,
        old_total: u128,
        new_total: u128,
    },
    LiquidityAlert {
        asset: String,
        status: String,
    },
    ReservationExpired {
        order_id: OrderId,
        asset: String,
        amount: u128,
    },
}
