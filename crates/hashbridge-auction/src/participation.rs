//! Per-tick auction participation decision: compute price, ask
//! the Liquidity Manager, reserve, commit or skip. Release on fill, expire,
//! or cancel.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use hashbridge_core::error::RelayError;
use hashbridge_core::order::Order;
use hashbridge_core::types::{OrderId, Price, Timestamp};
use hashbridge_liquidity::LiquidityManager;

use crate::price::{current_price, opening_price};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuctionDecision {
    Committed,
    Skipped,
}

/// Tracks which orders currently hold a liquidity reservation from a
/// successful auction commit, so `release` can be a no-op for orders that
/// never reserved.
pub struct DutchAuction {
    liquidity: Arc<LiquidityManager>,
    /// Opening price markup over `reserve_price` — a deployment
    /// parameter, see `opening_price`.
    premium: Price,
    committed: Mutex<HashSet<OrderId>>,
}

impl DutchAuction {
    pub fn new(liquidity: Arc<LiquidityManager>, premium: Price) -> Self {
        Self { liquidity, premium, committed: Mutex::new(HashSet::new()) }
    }

    /// One participation tick for a single order already in
    /// `auction_active`. Orders sharing a `taker_asset` must be ticked in
    /// `created_at` order by the caller to honor FCFS — ties are broken by
    /// order creation time.
    pub async fn tick(&self, order: &Order, now: Timestamp) -> Result<(Price, AuctionDecision), RelayError> {
        let opening = opening_price(order.reserve_price, self.premium);
        let price = current_price(opening, order.reserve_price, order.auction_start_time, order.auction_end_time, now);

        let reserved = self
            .liquidity
            .reserve(&order.order_id, &order.taker_asset, order.taking_amount, order.safety_deposit, now)
            .await?;
        if reserved {
            self.committed.lock().unwrap().insert(order.order_id.clone());
            info!(order_id = %order.order_id, price.num, price.den, "auction committed");
            Ok((price, AuctionDecision::Committed))
        } else {
            debug!(order_id = %order.order_id, "auction skipped this tick: insufficient free liquidity");
            Ok((price, AuctionDecision::Skipped))
        }
    }

    /// Release the liquidity hold for an order on fill, expire, or cancel.
    /// Idempotent — releasing an order that never committed is a no-op.
    pub fn release(&self, order_id: &OrderId) {
        let mut committed = self.committed.lock().unwrap();
        if committed.remove(order_id) {
            self.liquidity.release(order_id);
        }
    }

    pub fn is_committed(&self, order_id: &OrderId) -> bool {
        self.committed.lock().unwrap().contains(order_id)
    }
}

/// Order candidates sharing a `taker_asset`, sorted oldest-first so ticking
/// them in this order enforces FCFS.
pub fn fcfs_order(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by_key(|o| o.created_at);
    orders
}
