//! hashbridge-lifecycle
//!
//! Order Lifecycle Manager: the single writer of `Order::status`
//! transitions. Every transition for a given order is serialized through a
//! per-order `tokio::sync::Mutex` — a global per-order lock table rather
//! than one process-wide lock or a lock-free CAS loop — grounded on
//! `chronx_state::engine::StateEngine`'s validate-then-commit shape.

pub mod transitions;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use hashbridge_core::error::RelayError;
use hashbridge_core::order::OrderStatus;
use hashbridge_core::types::{OrderId, Timestamp};
use hashbridge_store::OrderStore;

pub use transitions::{apply_transition, LifecycleEvent};

/// Serializes concurrent lifecycle events for the same order and commits
/// legal transitions to the store.
pub struct LifecycleManager {
    store: Arc<OrderStore>,
    locks: StdMutex<HashMap<OrderId, Arc<AsyncMutex<()>>>>,
}

impl LifecycleManager {
    pub fn new(store: Arc<OrderStore>) -> Self {
        Self {
            store,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, order_id: &OrderId) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .unwrap()
            .entry(order_id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Apply `event` to `order_id`, serialized against any other event for
    /// the same order. Returns the resulting status.
    pub async fn apply(
        &self,
        order_id: &OrderId,
        event: LifecycleEvent,
        now: Timestamp,
    ) -> Result<OrderStatus, RelayError> {
        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let order = self
            .store
            .get_order(order_id)
            .ok_or_else(|| RelayError::OrderNotFound(order_id.to_string()))?;

        if let Some(deferred) = self.handle_edge_case(order.status, event, order_id) {
            return deferred;
        }

        let next = transitions::apply_transition(order.status, event)?;
        if next != order.status {
            self.store.set_status(order_id, next, now)?;
            debug!(order_id = %order_id, from = %order.status, to = %next, "order transitioned");
        }
        Ok(next)
    }

    /// The two edge cases that are not plain missing-edge rejections but
    /// need their own handling:
    ///
    /// - reveal-before-dual-escrow: a `SecretRevealedOnChain` observed while
    ///   only one side's escrow exists is deferred — the preimage is still
    ///   recorded by `hashbridge-secrets`, but the order's status does not
    ///   advance until the second escrow is observed.
    /// - refund-races-claim: once an order is `Completed`, a late refund
    ///   observation for the same order is not an error — first receipt
    ///   wins — but it is surprising enough on a completed swap to log as
    ///   anomalous.
    fn handle_edge_case(
        &self,
        current: OrderStatus,
        event: LifecycleEvent,
        order_id: &OrderId,
    ) -> Option<Result<OrderStatus, RelayError>> {
        if current == OrderStatus::EscrowCreated && event == LifecycleEvent::SecretRevealedOnChain
        {
            debug!(
                order_id = %order_id,
                "secret revealed ahead of the second escrow; deferring status advance"
            );
            return Some(Ok(current));
        }

        if current == OrderStatus::Completed && event == LifecycleEvent::AllEscrowsRefunded {
            warn!(
                order_id = %order_id,
                "anomalous: refund observed for an order already completed by claim"
            );
            return Some(Ok(current));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbridge_core::order::{Order, OrderStatus};
    use hashbridge_core::types::{AssetKey, Chain, ChainAddress, Hashlock, Price};

    fn sample_order(id: &str, status: OrderStatus) -> Order {
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
            status,
            created_at: 0,
            last_transition_at: 0,
        }
    }

    #[tokio::test]
    async fn happy_path_advances_status_in_store() {
        let store = Arc::new(OrderStore::new());
        store
            .insert_order(sample_order("o1", OrderStatus::Pending))
            .unwrap();
        let mgr = LifecycleManager::new(store.clone());
        let id = OrderId::new("o1");

        let next = mgr.apply(&id, LifecycleEvent::Submit, 1).await.unwrap();
        assert_eq!(next, OrderStatus::AuctionActive);
        assert_eq!(store.get_order(&id).unwrap().status, OrderStatus::AuctionActive);
    }

    #[tokio::test]
    async fn pending_to_completed_is_rejected() {
        let store = Arc::new(OrderStore::new());
        store
            .insert_order(sample_order("o1", OrderStatus::Pending))
            .unwrap();
        let mgr = LifecycleManager::new(store.clone());
        let id = OrderId::new("o1");

        let result = mgr
            .apply(&id, LifecycleEvent::ClaimSucceededOnOppositeChain, 1)
            .await;
        assert!(matches!(result, Err(RelayError::IllegalTransition { .. })));
        assert_eq!(store.get_order(&id).unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn reveal_before_second_escrow_defers() {
        let store = Arc::new(OrderStore::new());
        store
            .insert_order(sample_order("o1", OrderStatus::EscrowCreated))
            .unwrap();
        let mgr = LifecycleManager::new(store.clone());
        let id = OrderId::new("o1");

        let status = mgr
            .apply(&id, LifecycleEvent::SecretRevealedOnChain, 5)
            .await
            .unwrap();
        assert_eq!(status, OrderStatus::EscrowCreated);
        assert_eq!(store.get_order(&id).unwrap().status, OrderStatus::EscrowCreated);
    }

    #[tokio::test]
    async fn refund_after_completion_is_anomalous_but_not_an_error() {
        let store = Arc::new(OrderStore::new());
        store
            .insert_order(sample_order("o1", OrderStatus::Completed))
            .unwrap();
        let mgr = LifecycleManager::new(store.clone());
        let id = OrderId::new("o1");

        let status = mgr
            .apply(&id, LifecycleEvent::AllEscrowsRefunded, 9)
            .await
            .unwrap();
        assert_eq!(status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn double_reveal_keeps_secret_revealed_idempotently() {
        let store = Arc::new(OrderStore::new());
        store
            .insert_order(sample_order("o1", OrderStatus::BothEscrowed))
            .unwrap();
        let mgr = LifecycleManager::new(store.clone());
        let id = OrderId::new("o1");

        let first = mgr
            .apply(&id, LifecycleEvent::SecretRevealedOnChain, 1)
            .await
            .unwrap();
        let second = mgr
            .apply(&id, LifecycleEvent::SecretRevealedOnChain, 2)
            .await
            .unwrap();
        assert_eq!(first, OrderStatus::SecretRevealed);
        assert_eq!(second, OrderStatus::SecretRevealed);
    }
}
