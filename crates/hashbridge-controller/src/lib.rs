//! hashbridge-controller
//!
//! Relayer Controller: the only component that crosses chains
//! imperatively. Consumes the Event Monitor's combined `DomainEvent`
//! stream, drives the exact 5-step `SecretRevealed` handling, and runs a
//! periodic timeout sweep. Bootstrapped the way `chronx_node::main` wires
//! long-lived tasks together: one `tokio::spawn` per task, a shutdown
//! broadcast checked in every loop's `tokio::select!`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};

use hashbridge_core::error::RelayError;
use hashbridge_core::event::{ChainEvent, DomainEvent, RelayEvent};
use hashbridge_core::order::{EscrowStatus, Order, OrderStatus};
use hashbridge_core::types::{Chain, OrderId, Preimage, Timestamp};
use hashbridge_chain::ChainClient;
use hashbridge_lifecycle::{LifecycleEvent, LifecycleManager};
use hashbridge_secrets::SecretManager;
use hashbridge_store::OrderStore;

/// Retry policy for a `Transient` claim/refund failure: 5
/// attempts, 2x backoff starting at 1s.
const MAX_CLAIM_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const TIMELOCK_IMMINENT_WINDOW: Timestamp = 60;

fn now_unix() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as Timestamp)
        .unwrap_or(0)
}

pub struct RelayerController {
    store: Arc<OrderStore>,
    lifecycle: Arc<LifecycleManager>,
    secrets: Arc<SecretManager>,
    chains: HashMap<Chain, Arc<dyn ChainClient>>,
    events: broadcast::Sender<RelayEvent>,
}

impl RelayerController {
    pub fn new(
        store: Arc<OrderStore>,
        lifecycle: Arc<LifecycleManager>,
        secrets: Arc<SecretManager>,
        ethereum: Arc<dyn ChainClient>,
        stellar: Arc<dyn ChainClient>,
        events: broadcast::Sender<RelayEvent>,
    ) -> Self {
        let mut chains: HashMap<Chain, Arc<dyn ChainClient>> = HashMap::new();
        chains.insert(Chain::Ethereum, ethereum);
        chains.insert(Chain::Stellar, stellar);
        Self { store, lifecycle, secrets, chains, events }
    }

    fn chain_client(&self, chain: Chain) -> &Arc<dyn ChainClient> {
        self.chains.get(&chain).expect("both chains registered at construction")
    }

    /// Drive the combined event stream until the channel closes or
    /// `shutdown` fires.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<DomainEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("controller: shutdown received");
                        break;
                    }
                }
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            info!("controller: event stream closed");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle_event(&self, domain_event: DomainEvent) {
        let now = now_unix();
        match &domain_event.event {
            ChainEvent::EscrowCreated { order_id, .. } => {
                self.handle_escrow_created(order_id, now).await;
            }
            ChainEvent::SecretRevealed { order_id, preimage, revealer, .. } => {
                let chain = domain_event.chain;
                if let Err(e) = self
                    .handle_secret_revealed(order_id, chain, preimage.clone(), revealer.clone(), now)
                    .await
                {
                    warn!(order_id = %order_id, error = %e, "controller: secret-revealed handling failed");
                }
            }
            ChainEvent::EscrowClaimed { .. }
            | ChainEvent::EscrowRefunded { .. }
            | ChainEvent::Ready { .. }
            | ChainEvent::Error { .. } => {}
        }
    }

    /// The Event Monitor has already upserted the escrow row by the time this
    /// fires, so the store's own count distinguishes first arrival from
    /// second. `Fill` is applied defensively on every call — a no-op once
    /// the order is already past `auction_active`, whether that happened
    /// here or earlier via `DutchAuction::tick`/`quote` committing.
    async fn handle_escrow_created(&self, order_id: &OrderId, now: Timestamp) {
        let _ = self.lifecycle.apply(order_id, LifecycleEvent::Fill, now).await;

        let observed = if self.store.escrows_for_order(order_id).len() <= 1 {
            LifecycleEvent::FirstEscrowObserved
        } else {
            LifecycleEvent::SecondEscrowObserved
        };
        if let Err(e) = self.lifecycle.apply(order_id, observed, now).await {
            warn!(order_id = %order_id, error = %e, "controller: failed to advance lifecycle on escrow observed");
        }
    }

    /// The exact 5-step secret-revealed handling sequence.
    async fn handle_secret_revealed(
        &self,
        order_id: &OrderId,
        chain: Chain,
        preimage: Preimage,
        revealer: String,
        now: Timestamp,
    ) -> Result<(), RelayError> {
        let order = self
            .store
            .get_order(order_id)
            .ok_or_else(|| RelayError::OrderNotFound(order_id.to_string()))?;

        // 1. Validate preimage against the order's hashlock.
        if !self.secrets.verify(&preimage, &order.hashlock) {
            return Err(RelayError::InvalidPreimage { order_id: order_id.to_string() });
        }
        self.secrets.store(
            &order,
            preimage.clone(),
            chain,
            String::new(),
            hashbridge_core::types::ChainAddress(revealer),
            now,
        )?;

        let opposite = chain.other();

        // 2. Look up the escrow on the opposite chain; if absent, defer.
        let opposite_escrow = match self.store.get_escrow(order_id, opposite) {
            Some(e) => e,
            None => {
                info!(order_id = %order_id, "controller: opposite escrow not yet observed, deferring claim");
                return Ok(());
            }
        };
        if opposite_escrow.status != EscrowStatus::Created {
            // Already claimed or refunded — nothing left to do (double-reveal
            // idempotence, or a refund that raced the claim).
            return Ok(());
        }

        // Allow the lifecycle manager to move past secret_revealed even if
        // the claim below has to retry.
        let _ = self
            .lifecycle
            .apply(order_id, LifecycleEvent::SecretRevealedOnChain, now)
            .await;

        // 3. Invoke claim_escrow on the opposite chain, with retry/backoff.
        // 5. On failure, classify per §7 and retry with bounded backoff; if
        //    the opposite chain's timelock is imminent, escalate to Fatal.
        let client = self.chain_client(opposite);
        let mut attempt = 1;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match client.claim_escrow(order_id, &preimage).await {
                Ok(_receipt) => break,
                Err(e) if e.is_retryable() && attempt < MAX_CLAIM_ATTEMPTS => {
                    let imminent = opposite_escrow.timelock - now < TIMELOCK_IMMINENT_WINDOW;
                    if imminent {
                        error!(order_id = %order_id, "controller: opposite timelock imminent, escalating claim failure to fatal");
                        return Err(RelayError::Fatal(format!(
                            "claim_escrow retry budget exhausted with imminent timelock for order {order_id}"
                        )));
                    }
                    warn!(order_id = %order_id, attempt, error = %e, "controller: claim_escrow transient failure, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        // 4. On success, mark the opposite escrow claimed; complete if both
        //    escrows are now claimed.
        self.store.set_escrow_status(order_id, opposite, EscrowStatus::Claimed)?;
        if self.both_escrows_claimed(order_id) {
            self.lifecycle
                .apply(order_id, LifecycleEvent::ClaimSucceededOnOppositeChain, now)
                .await?;
            let _ = self.events.send(RelayEvent::SwapCompleted { order_id: order_id.clone() });
        }
        Ok(())
    }

    fn both_escrows_claimed(&self, order_id: &OrderId) -> bool {
        let escrows = self.store.escrows_for_order(order_id);
        escrows.len() == 2 && escrows.iter().all(|e| e.status == EscrowStatus::Claimed)
    }

    /// Periodic sweep, run every minute: for each non-terminal order past
    /// its timelock, refund every escrow still `created`.
    pub async fn sweep_timeouts(&self, now: Timestamp) {
        let orders = self.store.list_orders(&hashbridge_store::OrderFilter::default());
        for order in orders {
            if order.status.is_terminal() || order.timelock >= now {
                continue;
            }
            self.sweep_one(&order, now).await;
        }
    }

    async fn sweep_one(&self, order: &Order, now: Timestamp) {
        let _ = self
            .lifecycle
            .apply(&order.order_id, LifecycleEvent::TimelockExpiredNoClaim, now)
            .await;

        let mut all_settled = true;
        for chain in [Chain::Ethereum, Chain::Stellar] {
            let Some(escrow) = self.store.get_escrow(&order.order_id, chain) else {
                continue;
            };
            if escrow.status != EscrowStatus::Created {
                continue;
            }
            all_settled = false;
            let client = self.chain_client(chain);
            match client.refund_escrow(&order.order_id).await {
                Ok(_) => {
                    if let Err(e) = self.store.set_escrow_status(&order.order_id, chain, EscrowStatus::Refunded) {
                        warn!(order_id = %order.order_id, error = %e, "controller: failed to record refund");
                    }
                }
                Err(e) => {
                    warn!(order_id = %order.order_id, %chain, error = %e, "controller: refund_escrow failed, will retry next sweep");
                }
            }
        }

        if all_settled || self.all_escrows_refunded(&order.order_id) {
            let _ = self
                .lifecycle
                .apply(&order.order_id, LifecycleEvent::AllEscrowsRefunded, now)
                .await;
        }
    }

    fn all_escrows_refunded(&self, order_id: &OrderId) -> bool {
        let escrows = self.store.escrows_for_order(order_id);
        !escrows.is_empty() && escrows.iter().all(|e| e.status == EscrowStatus::Refunded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hashbridge_core::order::{Escrow, OrderStatus};
    use hashbridge_core::types::{AssetKey, ChainAddress, Hashlock, Price};
    use hashbridge_chain::{CreateEscrowRequest, EscrowReceipt};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockChain {
        chain: Chain,
        claim_failures_remaining: AtomicU32,
    }

    #[async_trait]
    impl ChainClient for MockChain {
        fn chain(&self) -> Chain {
            self.chain
        }
        async fn connect(&self) -> Result<(), RelayError> {
            Ok(())
        }
        async fn validate_order(&self, _order: &Order) -> Result<(), RelayError> {
            Ok(())
        }
        async fn create_escrow(&self, _req: &CreateEscrowRequest) -> Result<EscrowReceipt, RelayError> {
            unimplemented!()
        }
        async fn claim_escrow(&self, _order_id: &OrderId, _preimage: &Preimage) -> Result<EscrowReceipt, RelayError> {
            if self.claim_failures_remaining.load(Ordering::SeqCst) > 0 {
                self.claim_failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(RelayError::Transient { op: "claim".into(), attempt: 1, detail: "mock".into() });
            }
            Ok(EscrowReceipt { tx_hash: "0xclaim".into(), contract_id: vec![], height: 1 })
        }
        async fn refund_escrow(&self, _order_id: &OrderId) -> Result<EscrowReceipt, RelayError> {
            Ok(EscrowReceipt { tx_hash: "0xrefund".into(), contract_id: vec![], height: 1 })
        }
        async fn get_escrow_state(&self, _order_id: &OrderId) -> Result<Option<Escrow>, RelayError> {
            Ok(None)
        }
        async fn get_balance(&self, _asset: &AssetKey) -> Result<u128, RelayError> {
            Ok(0)
        }
        async fn start_monitoring(&self, _from_height: u64) -> Result<mpsc::Receiver<DomainEvent>, RelayError> {
            unimplemented!()
        }
        async fn stop_monitoring(&self) {}
    }

    fn sample_order(id: &str) -> Order {
        Order {
            order_id: OrderId::new(id),
            maker: ChainAddress("0xA".into()),
            receiver: ChainAddress("GB...B".into()),
            maker_asset: AssetKey::new(Chain::Ethereum, "ETH"),
            taker_asset: AssetKey::new(Chain::Stellar, "XLM"),
            making_amount: 1,
            taking_amount: 1,
            hashlock: Hashlock([0u8; 32]),
            timelock: 10_000,
            auction_start_time: 0,
            auction_end_time: 500,
            reserve_price: Price::new(1, 1),
            secret_hashes: vec![],
            safety_deposit: 0,
            status: OrderStatus::BothEscrowed,
            created_at: 0,
            last_transition_at: 0,
        }
    }

    fn sample_escrow(order_id: &OrderId, chain: Chain) -> Escrow {
        Escrow {
            order_id: order_id.clone(),
            chain,
            contract_id: vec![1],
            amount: 1,
            asset: AssetKey::new(chain, "X"),
            hashlock: Hashlock([0u8; 32]),
            timelock: 9_000,
            creator: ChainAddress("c".into()),
            beneficiary: ChainAddress("b".into()),
            safety_deposit: 0,
            status: EscrowStatus::Created,
            tx_hash: format!("0xescrow-{chain}"),
            height: 1,
        }
    }

    fn make_controller(
        store: Arc<OrderStore>,
        eth_failures: u32,
    ) -> Arc<RelayerController> {
        let lifecycle = Arc::new(LifecycleManager::new(store.clone()));
        let secrets = Arc::new(SecretManager::new(store.clone()));
        let ethereum: Arc<dyn ChainClient> = Arc::new(MockChain {
            chain: Chain::Ethereum,
            claim_failures_remaining: AtomicU32::new(eth_failures),
        });
        let stellar: Arc<dyn ChainClient> = Arc::new(MockChain {
            chain: Chain::Stellar,
            claim_failures_remaining: AtomicU32::new(0),
        });
        let (events, _rx) = broadcast::channel(16);
        Arc::new(RelayerController::new(store, lifecycle, secrets, ethereum, stellar, events))
    }

    #[tokio::test]
    async fn happy_path_claims_opposite_and_completes() {
        let store = Arc::new(OrderStore::new());
        let id = OrderId::new("o1");
        store.insert_order(sample_order("o1")).unwrap();
        store.upsert_escrow(sample_escrow(&id, Chain::Ethereum));
        store.upsert_escrow(sample_escrow(&id, Chain::Stellar));
        let controller = make_controller(store.clone(), 0);

        controller
            .handle_secret_revealed(&id, Chain::Stellar, Preimage([0u8; 32]), "r".into(), 0)
            .await
            .unwrap();

        assert_eq!(
            store.get_escrow(&id, Chain::Ethereum).unwrap().status,
            EscrowStatus::Claimed
        );
        assert_eq!(store.get_order(&id).unwrap().status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn completing_a_swap_emits_swap_completed_event() {
        let store = Arc::new(OrderStore::new());
        let id = OrderId::new("o1");
        store.insert_order(sample_order("o1")).unwrap();
        store.upsert_escrow(sample_escrow(&id, Chain::Ethereum));
        store.upsert_escrow(sample_escrow(&id, Chain::Stellar));

        let lifecycle = Arc::new(LifecycleManager::new(store.clone()));
        let secrets = Arc::new(SecretManager::new(store.clone()));
        let ethereum: Arc<dyn ChainClient> = Arc::new(MockChain {
            chain: Chain::Ethereum,
            claim_failures_remaining: AtomicU32::new(0),
        });
        let stellar: Arc<dyn ChainClient> = Arc::new(MockChain {
            chain: Chain::Stellar,
            claim_failures_remaining: AtomicU32::new(0),
        });
        let (events, mut rx) = broadcast::channel(16);
        let controller =
            RelayerController::new(store, lifecycle, secrets, ethereum, stellar, events);

        controller
            .handle_secret_revealed(&id, Chain::Stellar, Preimage([0u8; 32]), "r".into(), 0)
            .await
            .unwrap();

        let event = rx.try_recv().expect("expected a SwapCompleted event");
        assert!(matches!(event, RelayEvent::SwapCompleted { order_id } if order_id == id));
    }

    #[tokio::test]
    async fn mismatched_preimage_is_rejected_without_claiming() {
        let store = Arc::new(OrderStore::new());
        let id = OrderId::new("o1");
        store.insert_order(sample_order("o1")).unwrap();
        store.upsert_escrow(sample_escrow(&id, Chain::Ethereum));
        store.upsert_escrow(sample_escrow(&id, Chain::Stellar));
        let controller = make_controller(store.clone(), 0);

        let result = controller
            .handle_secret_revealed(&id, Chain::Stellar, Preimage([0xFF; 32]), "r".into(), 0)
            .await;
        assert!(matches!(result, Err(RelayError::InvalidPreimage { .. })));
        assert_eq!(
            store.get_escrow(&id, Chain::Ethereum).unwrap().status,
            EscrowStatus::Created
        );
    }

    #[tokio::test]
    async fn missing_opposite_escrow_defers_without_error() {
        let store = Arc::new(OrderStore::new());
        let id = OrderId::new("o1");
        let mut order = sample_order("o1");
        order.status = OrderStatus::EscrowCreated;
        store.insert_order(order).unwrap();
        store.upsert_escrow(sample_escrow(&id, Chain::Stellar));
        let controller = make_controller(store.clone(), 0);

        let result = controller
            .handle_secret_revealed(&id, Chain::Stellar, Preimage([0u8; 32]), "r".into(), 0)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_claim_failure_is_retried_until_success() {
        let store = Arc::new(OrderStore::new());
        let id = OrderId::new("o1");
        store.insert_order(sample_order("o1")).unwrap();
        store.upsert_escrow(sample_escrow(&id, Chain::Ethereum));
        store.upsert_escrow(sample_escrow(&id, Chain::Stellar));
        let controller = make_controller(store.clone(), 2);

        controller
            .handle_secret_revealed(&id, Chain::Stellar, Preimage([0u8; 32]), "r".into(), 0)
            .await
            .unwrap();
        assert_eq!(
            store.get_escrow(&id, Chain::Ethereum).unwrap().status,
            EscrowStatus::Claimed
        );
    }

    fn escrow_created_event(order_id: &OrderId, chain: Chain) -> DomainEvent {
        DomainEvent {
            chain,
            event: ChainEvent::EscrowCreated {
                order_id: order_id.clone(),
                contract_id: vec![1],
                amount: 1,
                asset: AssetKey::new(chain, "X"),
                hashlock: Hashlock([0u8; 32]),
                timelock: 9_000,
                tx_hash: format!("0xescrow-{chain}"),
                height: 1,
            },
        }
    }

    /// Drives the whole pipeline the way `fan_in` and `run` do: an order
    /// starting at `auction_active`, fed `EscrowCreated` on both chains and
    /// then `SecretRevealed`, with no status set by hand anywhere.
    #[tokio::test]
    async fn event_driven_happy_path_reaches_completed() {
        let preimage = Preimage([7u8; 32]);
        let hashlock = hashbridge_crypto::hash_preimage(&preimage);

        let store = Arc::new(OrderStore::new());
        let id = OrderId::new("o1");
        let mut order = sample_order("o1");
        order.status = OrderStatus::AuctionActive;
        order.hashlock = hashlock;
        store.insert_order(order).unwrap();
        let controller = make_controller(store.clone(), 0);

        store.upsert_escrow(sample_escrow(&id, Chain::Ethereum));
        controller.handle_event(escrow_created_event(&id, Chain::Ethereum)).await;
        assert_eq!(store.get_order(&id).unwrap().status, OrderStatus::EscrowCreated);

        store.upsert_escrow(sample_escrow(&id, Chain::Stellar));
        controller.handle_event(escrow_created_event(&id, Chain::Stellar)).await;
        assert_eq!(store.get_order(&id).unwrap().status, OrderStatus::BothEscrowed);

        controller
            .handle_event(DomainEvent {
                chain: Chain::Stellar,
                event: ChainEvent::SecretRevealed {
                    order_id: id.clone(),
                    preimage,
                    tx_hash: "0xreveal".into(),
                    revealer: "r".into(),
                    height: 1,
                },
            })
            .await;

        assert_eq!(store.get_order(&id).unwrap().status, OrderStatus::Completed);
        assert_eq!(
            store.get_escrow(&id, Chain::Ethereum).unwrap().status,
            EscrowStatus::Claimed
        );
    }

    #[tokio::test]
    async fn sweep_refunds_expired_orders() {
        let store = Arc::new(OrderStore::new());
        let id = OrderId::new("o1");
        let mut order = sample_order("o1");
        order.timelock = 5;
        order.status = OrderStatus::BothEscrowed;
        store.insert_order(order.clone()).unwrap();
        let mut e1 = sample_escrow(&id, Chain::Ethereum);
        e1.timelock = 5;
        let mut e2 = sample_escrow(&id, Chain::Stellar);
        e2.timelock = 5;
        store.upsert_escrow(e1);
        store.upsert_escrow(e2);
        let controller = make_controller(store.clone(), 0);

        controller.sweep_timeouts(100).await;

        assert_eq!(
            store.get_escrow(&id, Chain::Ethereum).unwrap().status,
            EscrowStatus::Refunded
        );
        assert_eq!(store.get_order(&id).unwrap().status, OrderStatus::Refunded);
    }
}
