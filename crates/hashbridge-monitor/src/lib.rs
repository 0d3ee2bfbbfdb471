//! hashbridge-monitor
//!
//! Cross-chain Event Monitor: fans the two chain clients'
//! `DomainEvent` streams into one, applies escrow/revelation events to the
//! store, and tracks the `MonitoringHealth` snapshot the RPC layer exposes.
//! The fan-in loop's shape is `chronx_p2p::network::P2pNetwork::run`'s
//! `tokio::select!` over two channel halves, generalized from two to an
//! arbitrary small set of per-chain receivers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

use hashbridge_core::error::RelayError;
use hashbridge_core::event::{ChainEvent, DomainEvent, MonitoringHealth, RelayEvent};
use hashbridge_core::order::{Escrow, EscrowStatus, SecretRevelation};
use hashbridge_core::types::Chain;
use hashbridge_chain::ChainClient;
use hashbridge_store::OrderStore;

/// Fans in both chain clients' event streams, applies them to the store,
/// and republishes a single combined stream for the controller to consume.
pub struct EventMonitor {
    store: Arc<OrderStore>,
    health: Arc<RwLock<MonitoringHealth>>,
    running: Arc<AtomicBool>,
    events: broadcast::Sender<RelayEvent>,
}

impl EventMonitor {
    pub fn new(store: Arc<OrderStore>, events: broadcast::Sender<RelayEvent>) -> Self {
        Self {
            store,
            health: Arc::new(RwLock::new(MonitoringHealth::default())),
            running: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    pub fn health(&self) -> Arc<RwLock<MonitoringHealth>> {
        self.health.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Connect both clients, start their monitors, and fan their combined
    /// events into the returned channel. Spawns the fan-in loop in the
    /// background; drop the returned receiver (or call `stop`) to end it.
    pub async fn start(
        &self,
        ethereum: Arc<dyn ChainClient>,
        stellar: Arc<dyn ChainClient>,
        ethereum_from_height: u64,
        stellar_from_height: u64,
    ) -> Result<mpsc::Receiver<DomainEvent>, RelayError> {
        ethereum.connect().await?;
        stellar.connect().await?;
        {
            let mut h = self.health.write().await;
            h.ethereum_connected = true;
            h.stellar_connected = true;
        }

        let eth_rx = ethereum.start_monitoring(ethereum_from_height).await?;
        let stellar_rx = stellar.start_monitoring(stellar_from_height).await?;
        {
            let mut h = self.health.write().await;
            h.ethereum_monitoring = true;
            h.stellar_monitoring = true;
        }

        self.running.store(true, Ordering::Relaxed);
        let (out_tx, out_rx) = mpsc::channel(512);
        let store = self.store.clone();
        let health = self.health.clone();
        let running = self.running.clone();
        let events = self.events.clone();

        tokio::spawn(fan_in(eth_rx, stellar_rx, store, health, running, events, out_tx));
        Ok(out_rx)
    }

    /// Idempotent: calling `stop` twice, or before `start`, is a no-op.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        let mut h = self.health.write().await;
        h.ethereum_monitoring = false;
        h.stellar_monitoring = false;
    }
}

async fn fan_in(
    mut eth_rx: mpsc::Receiver<DomainEvent>,
    mut stellar_rx: mpsc::Receiver<DomainEvent>,
    store: Arc<OrderStore>,
    health: Arc<RwLock<MonitoringHealth>>,
    running: Arc<AtomicBool>,
    events: broadcast::Sender<RelayEvent>,
    out_tx: mpsc::Sender<DomainEvent>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            break;
        }
        let event = tokio::select! {
            Some(ev) = eth_rx.recv() => ev,
            Some(ev) = stellar_rx.recv() => ev,
            else => break,
        };

        if let ChainEvent::Error { kind, message } = &event.event {
            let _ = events.send(RelayEvent::ChainError {
                chain: event.chain,
                kind: kind.clone(),
                message: message.clone(),
            });
        }

        if let Err(e) = apply_event(&store, &event) {
            warn!(chain = %event.chain, error = %e, "monitor: failed to apply chain event");
            let mut h = health.write().await;
            match event.chain {
                Chain::Ethereum => h.ethereum_monitoring = false,
                Chain::Stellar => h.stellar_monitoring = false,
            }
            continue;
        }

        if out_tx.send(event).await.is_err() {
            debug!("monitor: downstream consumer dropped, stopping fan-in");
            break;
        }
    }
    running.store(false, Ordering::Relaxed);
}

/// Apply one `DomainEvent` to the store: idempotent upserts keyed by
/// `(order_id, chain, tx_hash)` so re-delivery from a chain client's own
/// backfill never double-counts.
fn apply_event(store: &OrderStore, domain_event: &DomainEvent) -> Result<(), RelayError> {
    let chain = domain_event.chain;
    match &domain_event.event {
        ChainEvent::Ready { from_height } => {
            info!(%chain, from_height, "chain monitor ready");
            Ok(())
        }
        ChainEvent::EscrowCreated {
            order_id,
            contract_id,
            amount,
            asset,
            hashlock,
            timelock,
            tx_hash,
            height,
        } => {
            let order = store
                .get_order(order_id)
                .ok_or_else(|| RelayError::OrderNotFound(order_id.to_string()))?;
            let escrow = Escrow {
                order_id: order_id.clone(),
                chain,
                contract_id: contract_id.clone(),
                amount: *amount,
                asset: asset.clone(),
                hashlock: *hashlock,
                timelock: *timelock,
                creator: order.maker.clone(),
                beneficiary: order.receiver.clone(),
                safety_deposit: order.safety_deposit,
                status: EscrowStatus::Created,
                tx_hash: tx_hash.clone(),
                height: *height,
            };
            store.upsert_escrow(escrow);
            Ok(())
        }
        ChainEvent::SecretRevealed {
            order_id,
            preimage,
            tx_hash,
            revealer,
            ..
        } => {
            let order = store
                .get_order(order_id)
                .ok_or_else(|| RelayError::OrderNotFound(order_id.to_string()))?;
            store.append_revelation(SecretRevelation {
                id: 0,
                order_id: order_id.clone(),
                preimage: preimage.clone(),
                hashlock: order.hashlock,
                chain,
                tx_hash: tx_hash.clone(),
                revealer: hashbridge_core::types::ChainAddress(revealer.clone()),
                timestamp: 0,
            })?;
            Ok(())
        }
        ChainEvent::EscrowClaimed { order_id, .. } => {
            store.set_escrow_status(order_id, chain, EscrowStatus::Claimed)
        }
        ChainEvent::EscrowRefunded { order_id, .. } => {
            store.set_escrow_status(order_id, chain, EscrowStatus::Refunded)
        }
        ChainEvent::Error { kind, message } => {
            warn!(%chain, kind, message, "chain client reported an error event");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbridge_core::order::{Order, OrderStatus};
    use hashbridge_core::types::{AssetKey, ChainAddress, Hashlock, OrderId, Price};

    fn sample_order(id: &str) -> Order {
        Order {
            order_id: OrderId::new(id),
            maker: ChainAddress("0xA".into()),
            receiver: ChainAddress("GB...B".into()),
            maker_asset: AssetKey::new(Chain::Ethereum, "ETH"),
            taker_asset: AssetKey::new(Chain::Stellar, "XLM"),
            making_amount: 1,
            taking_amount: 1,
            hashlock: Hashlock([1u8; 32]),
            timelock: 1000,
            auction_start_time: 0,
            auction_end_time: 500,
            reserve_price: Price::new(1, 1),
            secret_hashes: vec![],
            safety_deposit: 0,
            status: OrderStatus::AuctionActive,
            created_at: 0,
            last_transition_at: 0,
        }
    }

    #[test]
    fn escrow_created_event_is_applied_once() {
        let store = OrderStore::new();
        let id = OrderId::new("o1");
        store.insert_order(sample_order("o1")).unwrap();

        let event = DomainEvent {
            chain: Chain::Ethereum,
            event: ChainEvent::EscrowCreated {
                order_id: id.clone(),
                contract_id: vec![1, 2, 3],
                amount: 10,
                asset: AssetKey::new(Chain::Ethereum, "ETH"),
                hashlock: Hashlock([1u8; 32]),
                timelock: 900,
                tx_hash: "0xabc".into(),
                height: 5,
            },
        };
        apply_event(&store, &event).unwrap();
        apply_event(&store, &event).unwrap();
        assert_eq!(store.escrows_for_order(&id).len(), 1);
    }

    #[test]
    fn escrow_event_for_unknown_order_is_an_error() {
        let store = OrderStore::new();
        let event = DomainEvent {
            chain: Chain::Ethereum,
            event: ChainEvent::EscrowCreated {
                order_id: OrderId::new("ghost"),
                contract_id: vec![],
                amount: 1,
                asset: AssetKey::new(Chain::Ethereum, "ETH"),
                hashlock: Hashlock([0u8; 32]),
                timelock: 1,
                tx_hash: "0xdead".into(),
                height: 1,
            },
        };
        assert!(apply_event(&store, &event).is_err());
    }
}
