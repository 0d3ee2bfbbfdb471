//! The `ChainClient` abstraction. Each chain's client owns its
//! own RPC connection and event-monitoring task; the controller and
//! liquidity layers only ever see this trait, never `Ethereum`/`Stellar`
//! concretely — mirrors how `chronx_p2p::P2pHandle` hides the libp2p swarm
//! behind a plain channel pair.

use async_trait::async_trait;
use tokio::sync::mpsc;

use hashbridge_core::error::RelayError;
use hashbridge_core::event::DomainEvent;
use hashbridge_core::order::{Escrow, Order};
use hashbridge_core::types::{Amount, AssetKey, Chain, ChainAddress, Hashlock, OrderId, Preimage, Timestamp};

/// Parameters for creating an escrow on one chain.
#[derive(Clone, Debug)]
pub struct CreateEscrowRequest {
    pub order_id: OrderId,
    pub amount: Amount,
    pub asset: AssetKey,
    pub hashlock: Hashlock,
    pub timelock: Timestamp,
    pub beneficiary: ChainAddress,
    pub safety_deposit: Amount,
}

/// What a successful `create_escrow`/`claim_escrow`/`refund_escrow` call
/// returns — enough to let the caller log and, for creation, enough to
/// build the `Escrow` row before the monitor even observes the event back.
#[derive(Clone, Debug)]
pub struct EscrowReceipt {
    pub tx_hash: String,
    pub contract_id: Vec<u8>,
    pub height: u64,
}

/// Per-chain RPC + monitoring client. One implementation per chain in the
/// swap pair — exactly two chains, not N.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain(&self) -> Chain;

    /// Establish the RPC connection and fail fast if the endpoint is
    /// unreachable — called once at startup.
    async fn connect(&self) -> Result<(), RelayError>;

    /// Chain-local validation of an order before it enters the book: is
    /// `maker`/`receiver` a well-formed address on this chain, is
    /// `maker_asset`/`taker_asset` known here.
    async fn validate_order(&self, order: &Order) -> Result<(), RelayError>;

    async fn create_escrow(&self, req: &CreateEscrowRequest) -> Result<EscrowReceipt, RelayError>;

    async fn claim_escrow(
        &self,
        order_id: &OrderId,
        preimage: &Preimage,
    ) -> Result<EscrowReceipt, RelayError>;

    async fn refund_escrow(&self, order_id: &OrderId) -> Result<EscrowReceipt, RelayError>;

    async fn get_escrow_state(&self, order_id: &OrderId) -> Result<Option<Escrow>, RelayError>;

    /// Current resolver-owned balance of `asset` on this chain, in native
    /// units. Used by `hashbridge-liquidity::BalanceTracker` to refresh its
    /// cache.
    async fn get_balance(&self, asset: &AssetKey) -> Result<Amount, RelayError>;

    /// Start the background polling task. Events are pushed onto the
    /// returned channel as they are observed, already gap-filled and
    /// dedup-windowed (see `poll.rs`). Calling this twice without an
    /// intervening `stop_monitoring` is a no-op that returns the existing
    /// receiver's sender side closed — callers should treat a second call
    /// as a logic error and not rely on it.
    async fn start_monitoring(
        &self,
        from_height: u64,
    ) -> Result<mpsc::Receiver<DomainEvent>, RelayError>;

    /// Idempotent: stopping an already-stopped monitor is not an error.
    async fn stop_monitoring(&self);
}
