//! hashbridge-secrets
//!
//! Secret Manager: binds preimages to hashlocks, validates
//! revelations, and caches `order_id -> preimage` for fast cross-chain
//! propagation by the controller.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, warn};

use hashbridge_core::error::RelayError;
use hashbridge_core::order::{Order, SecretRevelation};
use hashbridge_core::types::{Chain, ChainAddress, Hashlock, OrderId, Preimage, Timestamp};
use hashbridge_store::OrderStore;

/// Binds preimages to hashlocks and drives claim propagation data.
pub struct SecretManager {
    store: std::sync::Arc<OrderStore>,
    /// `order_id -> preimage`, cache-first lookups ahead of the append-only
    /// log in `store`, for fast cross-chain propagation.
    cache: RwLock<HashMap<OrderId, Preimage>>,
}

impl SecretManager {
    pub fn new(store: std::sync::Arc<OrderStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// `generate()`: 32 uniformly random bytes, sha256 hashlock.
    pub fn generate(&self) -> (Preimage, Hashlock) {
        hashbridge_crypto::generate()
    }

    /// `store(order_id, preimage, chain, tx_hash, revealer)`.
    /// Rejects if `sha256(preimage) != order.hashlock`; on success appends
    /// to the revelation log and caches `order_id -> preimage`.
    ///
    /// Returns `Ok(true)` if this was a newly recorded revelation,
    /// `Ok(false)` if it was an idempotent re-delivery of one already seen.
    pub fn store(
        &self,
        order: &Order,
        preimage: Preimage,
        chain: Chain,
        tx_hash: String,
        revealer: ChainAddress,
        timestamp: Timestamp,
    ) -> Result<bool, RelayError> {
        if !hashbridge_crypto::verify(&preimage, &order.hashlock) {
            warn!(order_id = %order.order_id, "preimage does not match order hashlock");
            return Err(RelayError::InvalidPreimage {
                order_id: order.order_id.to_string(),
            });
        }

        let revelation = SecretRevelation {
            id: 0, // assigned by the store
            order_id: order.order_id.clone(),
            preimage: preimage.clone(),
            hashlock: order.hashlock,
            chain,
            tx_hash,
            revealer,
            timestamp,
        };

        let appended = self.store.append_revelation(revelation)?.is_some();
        if appended {
            self.cache
                .write()
                .unwrap()
                .insert(order.order_id.clone(), preimage);
            debug!(order_id = %order.order_id, "secret revelation recorded");
        }
        Ok(appended)
    }

    /// `get(order_id)` — cache-first, then the append-only store.
    pub fn get(&self, order_id: &OrderId) -> Option<Preimage> {
        if let Some(p) = self.cache.read().unwrap().get(order_id).cloned() {
            return Some(p);
        }
        let revelations = self.store.revelations_for_order(order_id);
        let found = revelations.into_iter().next().map(|r| r.preimage);
        if let Some(p) = &found {
            self.cache
                .write()
                .unwrap()
                .insert(order_id.clone(), p.clone());
        }
        found
    }

    /// `verify(preimage, hashlock)`.
    pub fn verify(&self, preimage: &Preimage, hashlock: &Hashlock) -> bool {
        hashbridge_crypto::verify(preimage, hashlock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbridge_core::order::OrderStatus;
    use hashbridge_core::types::{AssetKey, Price};
    use std::sync::Arc;

    fn sample_order(hashlock: Hashlock) -> Order {
        Order {
            order_id: OrderId::new("o1"),
            maker: ChainAddress("0xA".into()),
            receiver: ChainAddress("GB...B".into()),
            maker_asset: AssetKey::new(Chain::Ethereum, "ETH"),
            taker_asset: AssetKey::new(Chain::Stellar, "XLM"),
            making_amount: 1,
            taking_amount: 1,
            hashlock,
            timelock: 1000,
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

    #[test]
    fn stores_and_retrieves_valid_revelation() {
        let store = Arc::new(OrderStore::new());
        let mgr = SecretManager::new(store.clone());
        let (preimage, hashlock) = mgr.generate();
        let order = sample_order(hashlock);
        store.insert_order(order.clone()).unwrap();

        let appended = mgr
            .store(
                &order,
                preimage.clone(),
                Chain::Stellar,
                "0xtx".into(),
                ChainAddress("r".into()),
                1,
            )
            .unwrap();
        assert!(appended);
        assert_eq!(mgr.get(&order.order_id), Some(preimage));
    }

    #[test]
    fn rejects_mismatched_preimage() {
        let store = Arc::new(OrderStore::new());
        let mgr = SecretManager::new(store.clone());
        let (_, hashlock) = mgr.generate();
        let order = sample_order(hashlock);
        store.insert_order(order.clone()).unwrap();

        let wrong = hashbridge_core::types::Preimage([0xEEu8; 32]);
        let result = mgr.store(
            &order,
            wrong,
            Chain::Stellar,
            "0xtx".into(),
            ChainAddress("r".into()),
            1,
        );
        assert!(matches!(result, Err(RelayError::InvalidPreimage { .. })));
        assert!(mgr.get(&order.order_id).is_none());
    }

    #[test]
    fn second_reveal_on_opposite_chain_is_idempotent() {
        let store = Arc::new(OrderStore::new());
        let mgr = SecretManager::new(store.clone());
        let (preimage, hashlock) = mgr.generate();
        let order = sample_order(hashlock);
        store.insert_order(order.clone()).unwrap();

        assert!(mgr
            .store(
                &order,
                preimage.clone(),
                Chain::Stellar,
                "0xtx".into(),
                ChainAddress("r".into()),
                1
            )
            .unwrap());
        // Same tx redelivered — idempotent, not a second row.
        assert!(!mgr
            .store(
                &order,
                preimage,
                Chain::Stellar,
                "0xtx".into(),
                ChainAddress("r".into()),
                1
            )
            .unwrap());
    }
}
