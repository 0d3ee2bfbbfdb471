//! hashbridge-store
//!
//! In-memory-only state for orders, escrows, and secret revelations.
//! Indexed for fast lookup by id and by status, mirroring the "named
//! trees" shape `chronx_state::StateDb` uses for its sled trees — here
//! each "tree" is a plain `HashMap` behind one `RwLock`, since
//! persistence is explicitly out of scope and the expected scale
//! (thousands of in-flight orders, not millions of accounts) does not
//! warrant a sharded concurrent map (see `DESIGN.md` for the recorded
//! decision).

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use hashbridge_core::error::RelayError;
use hashbridge_core::order::{Escrow, Order, OrderStatus, SecretRevelation};
use hashbridge_core::types::{Chain, OrderId};

/// Filter accepted by [`OrderStore::list_orders`], mirroring the query
/// parameters of `GET /orders?status=&maker=&limit=&offset=`.
#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub maker: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    by_status: HashMap<OrderStatusKey, HashSet<OrderId>>,
    escrows: HashMap<(OrderId, Chain), Escrow>,
    revelations: Vec<SecretRevelation>,
    revelations_by_order: HashMap<OrderId, Vec<usize>>,
    /// Dedup key for escrow-created events: prevents the same on-chain
    /// event from inserting a second escrow row.
    seen_escrow_events: HashSet<(OrderId, Chain, String)>,
    /// Dedup key for revelations: `(order_id, chain, tx_hash)`.
    seen_revelation_events: HashSet<(OrderId, Chain, String)>,
    next_revelation_id: u64,
}

/// Hashable proxy for `OrderStatus` (which itself is `Copy` but not `Hash`
/// — kept minimal rather than deriving `Hash` on the wire type for no
/// reason beyond this index).
type OrderStatusKey = u8;

fn status_key(status: OrderStatus) -> OrderStatusKey {
    status as u8
}

/// Thread-safe in-memory order/escrow/secret store.
#[derive(Default)]
pub struct OrderStore {
    inner: RwLock<Inner>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a brand-new order. Fails if the id is already taken — spec
    /// §3 invariant: "Exactly one order owns a given order_id."
    pub fn insert_order(&self, order: Order) -> Result<(), RelayError> {
        let mut inner = self.inner.write().unwrap();
        if inner.orders.contains_key(&order.order_id) {
            return Err(RelayError::InvalidInput(format!(
                "order_id {} already exists",
                order.order_id
            )));
        }
        inner
            .by_status
            .entry(status_key(order.status))
            .or_default()
            .insert(order.order_id.clone());
        inner.orders.insert(order.order_id.clone(), order);
        Ok(())
    }

    pub fn get_order(&self, id: &OrderId) -> Option<Order> {
        self.inner.read().unwrap().orders.get(id).cloned()
    }

    /// Move an order to a new status, updating the status index. Does not
    /// itself validate that the transition is legal — that is
    /// `hashbridge-lifecycle`'s job; this is a pure data mutation.
    pub fn set_status(
        &self,
        id: &OrderId,
        new_status: OrderStatus,
        now: hashbridge_core::types::Timestamp,
    ) -> Result<(), RelayError> {
        let mut inner = self.inner.write().unwrap();
        let old_status = {
            let order = inner
                .orders
                .get(id)
                .ok_or_else(|| RelayError::OrderNotFound(id.to_string()))?;
            order.status
        };
        if let Some(set) = inner.by_status.get_mut(&status_key(old_status)) {
            set.remove(id);
        }
        inner
            .by_status
            .entry(status_key(new_status))
            .or_default()
            .insert(id.clone());
        let order = inner.orders.get_mut(id).unwrap();
        order.status = new_status;
        order.last_transition_at = now;
        Ok(())
    }

    pub fn list_orders(&self, filter: &OrderFilter) -> Vec<Order> {
        let inner = self.inner.read().unwrap();
        let mut matches: Vec<&Order> = match filter.status {
            Some(status) => inner
                .by_status
                .get(&status_key(status))
                .into_iter()
                .flatten()
                .filter_map(|id| inner.orders.get(id))
                .collect(),
            None => inner.orders.values().collect(),
        };
        if let Some(maker) = &filter.maker {
            matches.retain(|o| &o.maker.0 == maker);
        }
        matches.sort_by_key(|o| o.created_at);
        let start = filter.offset.min(matches.len());
        let end = match filter.limit {
            Some(n) => (start + n).min(matches.len()),
            None => matches.len(),
        };
        matches[start..end].iter().map(|o| (*o).clone()).collect()
    }

    pub fn count_by_status(&self, status: OrderStatus) -> usize {
        self.inner
            .read()
            .unwrap()
            .by_status
            .get(&status_key(status))
            .map(|s| s.len())
            .unwrap_or(0)
    }

    pub fn total_orders(&self) -> usize {
        self.inner.read().unwrap().orders.len()
    }

    // ── Escrows ──────────────────────────────────────────────────────────────

    /// Idempotently record an escrow-created observation. Returns `true`
    /// if this created a new row, `false` if it was a dedup hit —
    /// re-delivery must not produce a second row.
    pub fn upsert_escrow(&self, escrow: Escrow) -> bool {
        let mut inner = self.inner.write().unwrap();
        let key = (escrow.order_id.clone(), escrow.chain, escrow.tx_hash.clone());
        if inner.seen_escrow_events.contains(&key) {
            return false;
        }
        inner.seen_escrow_events.insert(key);
        inner
            .escrows
            .insert((escrow.order_id.clone(), escrow.chain), escrow);
        true
    }

    pub fn get_escrow(&self, order_id: &OrderId, chain: Chain) -> Option<Escrow> {
        self.inner
            .read()
            .unwrap()
            .escrows
            .get(&(order_id.clone(), chain))
            .cloned()
    }

    pub fn escrows_for_order(&self, order_id: &OrderId) -> Vec<Escrow> {
        let inner = self.inner.read().unwrap();
        [Chain::Ethereum, Chain::Stellar]
            .into_iter()
            .filter_map(|c| inner.escrows.get(&(order_id.clone(), c)).cloned())
            .collect()
    }

    /// Advance an escrow's status. Escrow status never reverts — the
    /// caller is responsible for only calling this with a forward move;
    /// this function does not itself re-validate the lattice to keep the
    /// hot path (one lock acquisition) cheap.
    pub fn set_escrow_status(
        &self,
        order_id: &OrderId,
        chain: Chain,
        status: hashbridge_core::order::EscrowStatus,
    ) -> Result<(), RelayError> {
        let mut inner = self.inner.write().unwrap();
        let escrow = inner
            .escrows
            .get_mut(&(order_id.clone(), chain))
            .ok_or_else(|| RelayError::OrderNotFound(order_id.to_string()))?;
        escrow.status = status;
        Ok(())
    }

    // ── Secret revelations ───────────────────────────────────────────────────

    /// Append a revelation. Returns `Ok(None)` if this exact
    /// `(order_id, chain, tx_hash)` was already recorded (idempotent
    /// re-delivery), `Ok(Some(id))` if newly appended.
    pub fn append_revelation(
        &self,
        mut revelation: SecretRevelation,
    ) -> Result<Option<u64>, RelayError> {
        let mut inner = self.inner.write().unwrap();
        let key = (
            revelation.order_id.clone(),
            revelation.chain,
            revelation.tx_hash.clone(),
        );
        if inner.seen_revelation_events.contains(&key) {
            return Ok(None);
        }
        let id = inner.next_revelation_id;
        inner.next_revelation_id += 1;
        revelation.id = id;
        inner.seen_revelation_events.insert(key);
        let idx = inner.revelations.len();
        inner
            .revelations_by_order
            .entry(revelation.order_id.clone())
            .or_default()
            .push(idx);
        inner.revelations.push(revelation);
        Ok(Some(id))
    }

    pub fn revelations_for_order(&self, order_id: &OrderId) -> Vec<SecretRevelation> {
        let inner = self.inner.read().unwrap();
        inner
            .revelations_by_order
            .get(order_id)
            .into_iter()
            .flatten()
            .filter_map(|idx| inner.revelations.get(*idx).cloned())
            .collect()
    }
}
