//! Liquidity Manager: the has-liquidity end-to-end call and
//! the three-tier health status, composed from the Asset Registry,
//! Balance Tracker, and Reservation Tracker.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::warn;

use hashbridge_chain::ChainClient;
use hashbridge_core::error::RelayError;
use hashbridge_core::event::RelayEvent;
use hashbridge_core::types::{Amount, AssetKey, OrderId, Timestamp};

use crate::balance::BalanceTracker;
use crate::registry::AssetRegistry;
use crate::reservation::ReservationTracker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiquidityStatus {
    Healthy,
    Warning,
    Critical,
}

impl LiquidityStatus {
    fn as_str(self) -> &'static str {
        match self {
            LiquidityStatus::Healthy => "healthy",
            LiquidityStatus::Warning => "warning",
            LiquidityStatus::Critical => "critical",
        }
    }
}

/// Aggregated counts published on demand and diffed on every threshold
/// crossing.
#[derive(Clone, Debug, Default)]
pub struct LiquidityStatusSnapshot {
    pub per_asset: HashMap<AssetKey, LiquidityStatus>,
}

impl LiquidityStatusSnapshot {
    pub fn healthy_count(&self) -> usize {
        self.per_asset.values().filter(|s| matches!(s, LiquidityStatus::Healthy)).count()
    }
    pub fn warning_count(&self) -> usize {
        self.per_asset.values().filter(|s| matches!(s, LiquidityStatus::Warning)).count()
    }
    pub fn critical_count(&self) -> usize {
        self.per_asset.values().filter(|s| matches!(s, LiquidityStatus::Critical)).count()
    }
}

pub struct LiquidityManager {
    registry: Arc<AssetRegistry>,
    balances: Arc<BalanceTracker>,
    reservations: Arc<ReservationTracker>,
    chains: HashMap<hashbridge_core::types::Chain, Arc<dyn ChainClient>>,
    snapshot: RwLock<LiquidityStatusSnapshot>,
    events: broadcast::Sender<RelayEvent>,
}

impl LiquidityManager {
    pub fn new(
        registry: Arc<AssetRegistry>,
        balances: Arc<BalanceTracker>,
        reservations: Arc<ReservationTracker>,
        chains: HashMap<hashbridge_core::types::Chain, Arc<dyn ChainClient>>,
        events: broadcast::Sender<RelayEvent>,
    ) -> Self {
        Self {
            registry,
            balances,
            reservations,
            chains,
            snapshot: RwLock::new(LiquidityStatusSnapshot::default()),
            events,
        }
    }

    pub async fn snapshot(&self) -> LiquidityStatusSnapshot {
        self.snapshot.read().await.clone()
    }

    /// The has-liquidity check: normalize, fetch cache-first,
    /// subtract reservations, compare. `requested_decimal` is the
    /// human-facing amount string (e.g. `"1.5"`), validated against the
    /// asset's registered decimals before comparison. `safety_deposit` is
    /// the extra principal a resolver locks alongside the fill on its own
    /// escrow — part of the same asset's balance requirement, not a side
    /// allowance.
    pub async fn has_liquidity(
        &self,
        asset: &AssetKey,
        requested_decimal: &str,
        safety_deposit: Amount,
        now: Timestamp,
    ) -> Result<bool, RelayError> {
        let requested = self.registry.convert_from_decimal(asset, requested_decimal)?;
        let available = self.available(asset, now).await?;
        Ok(available >= requested.saturating_add(safety_deposit))
    }

    /// `reserve` end-to-end: checks liquidity and, on success, records the
    /// hold. Returns `Ok(false)` (not an error) when liquidity is
    /// insufficient — the caller decides whether that's fatal. `amount`
    /// and `safety_deposit` are reserved together since both draw on the
    /// same balance before the resolver's escrow is funded.
    pub async fn reserve(
        &self,
        order_id: &OrderId,
        asset: &AssetKey,
        amount: Amount,
        safety_deposit: Amount,
        now: Timestamp,
    ) -> Result<bool, RelayError> {
        let total = self.total_balance(asset).await?;
        let required = amount.saturating_add(safety_deposit);
        let ok = self.reservations.reserve(order_id, asset, required, total, now);
        self.refresh_status(asset, now).await;
        Ok(ok)
    }

    pub fn release(&self, order_id: &OrderId) {
        self.reservations.release(order_id);
    }

    pub fn release_by_asset(&self, asset: &AssetKey, amount: Amount) -> Amount {
        self.reservations.release_by_asset(asset, amount)
    }

    async fn total_balance(&self, asset: &AssetKey) -> Result<Amount, RelayError> {
        let client = self
            .chains
            .get(&asset.chain)
            .ok_or_else(|| RelayError::InvalidInput(format!("no chain client for {}", asset.chain)))?;
        self.balances.get_balance(asset.chain, asset, client.as_ref()).await
    }

    async fn available(&self, asset: &AssetKey, now: Timestamp) -> Result<Amount, RelayError> {
        let total = self.total_balance(asset).await?;
        let reserved = self.reservations.reserved_total(asset, now);
        Ok(total.saturating_sub(reserved))
    }

    /// Recompute and publish this asset's three-tier status, emitting
    /// `LiquidityAlert` if it changed.
    pub async fn refresh_status(&self, asset: &AssetKey, now: Timestamp) {
        let config = match self.registry.get(asset) {
            Some(c) => c,
            None => return,
        };
        let stale = self.balances.is_stale(asset.chain, asset).await;
        let available = match self.available(asset, now).await {
            Ok(a) => a,
            Err(e) => {
                warn!(%asset, error = %e, "liquidity status refresh failed to fetch balance");
                return;
            }
        };
        let status = if stale {
            LiquidityStatus::Critical
        } else if available < config.minimum_threshold {
            LiquidityStatus::Critical
        } else if available < config.warning_threshold {
            LiquidityStatus::Warning
        } else {
            LiquidityStatus::Healthy
        };

        let mut snapshot = self.snapshot.write().await;
        let previous = snapshot.per_asset.insert(asset.clone(), status);
        if previous != Some(status) {
            let _ = self.events.send(RelayEvent::LiquidityAlert {
                asset: asset.symbol.clone(),
                status: status.as_str().to_string(),
            });
        }
    }
}
