//! Balance Tracker: per-`(chain, asset)` cached balance with
//! TTL, periodic refresh, change notification, and exponential-backoff
//! retry. The refresh loop's `tokio::select!` timer shape is the same one
//! `hashbridge_chain::poll::run` uses for its own interval polling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use hashbridge_chain::ChainClient;
use hashbridge_core::error::RelayError;
use hashbridge_core::event::RelayEvent;
use hashbridge_core::types::{AssetKey, Chain};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
/// Consecutive refresh failures before an entry is marked `stale` (spec
/// §4.7 "after consecutive failures exceed a threshold").
const STALE_AFTER_FAILURES: u32 = 3;

#[derive(Clone, Debug)]
struct CachedBalance {
    amount: u128,
    fetched_at: Instant,
    consecutive_failures: u32,
    stale: bool,
}

/// Per-`(chain, asset)` balance cache.
pub struct BalanceTracker {
    ttl: Duration,
    entries: RwLock<HashMap<(Chain, AssetKey), CachedBalance>>,
    running: Arc<AtomicBool>,
    events: broadcast::Sender<RelayEvent>,
}

impl BalanceTracker {
    pub fn new(ttl: Duration, events: broadcast::Sender<RelayEvent>) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Cache-first lookup. Refreshes from the chain client if the entry is
    /// missing or past its TTL. On a stale entry, returns the last known
    /// value rather than failing.
    pub async fn get_balance(
        &self,
        chain: Chain,
        asset: &AssetKey,
        client: &dyn ChainClient,
    ) -> Result<u128, RelayError> {
        let key = (chain, asset.clone());
        let fresh = {
            let entries = self.entries.read().await;
            entries.get(&key).filter(|e| e.fetched_at.elapsed() < self.ttl).map(|e| e.amount)
        };
        if let Some(amount) = fresh {
            return Ok(amount);
        }
        self.update_balance(chain, asset, client).await
    }

    /// Force a refresh regardless of TTL freshness.
    pub async fn update_balance(
        &self,
        chain: Chain,
        asset: &AssetKey,
        client: &dyn ChainClient,
    ) -> Result<u128, RelayError> {
        let key = (chain, asset.clone());
        match client.get_balance(asset).await {
            Ok(amount) => {
                let mut entries = self.entries.write().await;
                let old = entries.get(&key).map(|e| e.amount);
                entries.insert(
                    key,
                    CachedBalance { amount, fetched_at: Instant::now(), consecutive_failures: 0, stale: false },
                );
                if let Some(old) = old {
                    if old != amount {
                        debug!(%chain, %asset, old, new = amount, "balance changed");
                        let _ = self.events.send(RelayEvent::BalanceChanged {
                            chain,
                            asset: asset.symbol.clone(),
                            old_total: old,
                            new_total: amount,
                        });
                    }
                }
                Ok(amount)
            }
            Err(e) => {
                let mut entries = self.entries.write().await;
                let entry = entries.entry(key).or_insert(CachedBalance {
                    amount: 0,
                    fetched_at: Instant::now(),
                    consecutive_failures: 0,
                    stale: false,
                });
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= STALE_AFTER_FAILURES {
                    entry.stale = true;
                }
                if entry.stale {
                    Ok(entry.amount)
                } else {
                    Err(e)
                }
            }
        }
    }

    pub async fn is_stale(&self, chain: Chain, asset: &AssetKey) -> bool {
        self.entries
            .read()
            .await
            .get(&(chain, asset.clone()))
            .map(|e| e.stale)
            .unwrap_or(false)
    }

    /// Spawn the periodic refresh task for one `(chain, asset)` pair.
    /// Failures back off exponentially (1s, 2s, 4s, ... capped at 60s) and
    /// reset to the base interval on the next success.
    pub fn spawn_refresh_loop(
        self: &Arc<Self>,
        chain: Chain,
        asset: AssetKey,
        client: Arc<dyn ChainClient>,
        interval: Duration,
    ) {
        self.running.store(true, Ordering::Relaxed);
        let tracker = self.clone();
        let running = self.running.clone();
        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                tokio::time::sleep(interval).await;
                match tracker.update_balance(chain, &asset, client.as_ref()).await {
                    Ok(_) => backoff = INITIAL_BACKOFF,
                    Err(e) => {
                        warn!(%chain, %asset, error = %e, "balance refresh failed, backing off");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hashbridge_chain::{CreateEscrowRequest, EscrowReceipt};
    use hashbridge_core::order::{Escrow, Order};
    use hashbridge_core::types::{OrderId, Preimage};
    use std::sync::atomic::AtomicU32;
    use tokio::sync::mpsc;

    struct StubClient {
        values: Vec<u128>,
        calls: AtomicU32,
        fail_first_n: u32,
    }

    #[async_trait]
    impl ChainClient for StubClient {
        fn chain(&self) -> Chain {
            Chain::Ethereum
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
        async fn claim_escrow(&self, _o: &OrderId, _p: &Preimage) -> Result<EscrowReceipt, RelayError> {
            unimplemented!()
        }
        async fn refund_escrow(&self, _o: &OrderId) -> Result<EscrowReceipt, RelayError> {
            unimplemented!()
        }
        async fn get_escrow_state(&self, _o: &OrderId) -> Result<Option<Escrow>, RelayError> {
            Ok(None)
        }
        async fn get_balance(&self, _asset: &AssetKey) -> Result<u128, RelayError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                return Err(RelayError::Transient { op: "getBalance".into(), attempt: 1, detail: "stub".into() });
            }
            Ok(self.values[(n - self.fail_first_n) as usize % self.values.len()])
        }
        async fn start_monitoring(&self, _from: u64) -> Result<mpsc::Receiver<hashbridge_core::event::DomainEvent>, RelayError> {
            unimplemented!()
        }
        async fn stop_monitoring(&self) {}
    }

    #[tokio::test]
    async fn fresh_entry_served_from_cache() {
        let (tx, _rx) = broadcast::channel(16);
        let tracker = BalanceTracker::new(Duration::from_secs(60), tx);
        let client = StubClient { values: vec![100, 200], calls: AtomicU32::new(0), fail_first_n: 0 };
        let asset = AssetKey::new(Chain::Ethereum, "ETH");
        let first = tracker.get_balance(Chain::Ethereum, &asset, &client).await.unwrap();
        let second = tracker.get_balance(Chain::Ethereum, &asset, &client).await.unwrap();
        assert_eq!(first, 100);
        assert_eq!(second, 100); // cache hit, second stub value never reached
    }

    #[tokio::test]
    async fn stale_after_threshold_failures_serves_last_known_value() {
        let (tx, _rx) = broadcast::channel(16);
        let tracker = BalanceTracker::new(Duration::from_millis(0), tx);
        let client = StubClient { values: vec![50], calls: AtomicU32::new(0), fail_first_n: 100 };
        let asset = AssetKey::new(Chain::Ethereum, "ETH");

        // Seed a value first so there's something to fall back to once stale.
        let seeded = tracker
            .entries
            .write()
            .await
            .insert(
                (Chain::Ethereum, asset.clone()),
                CachedBalance { amount: 42, fetched_at: Instant::now() - Duration::from_secs(3600), consecutive_failures: 0, stale: false },
            );
        assert!(seeded.is_none());

        for _ in 0..STALE_AFTER_FAILURES {
            let _ = tracker.update_balance(Chain::Ethereum, &asset, &client).await;
        }
        assert!(tracker.is_stale(Chain::Ethereum, &asset).await);
        assert_eq!(tracker.update_balance(Chain::Ethereum, &asset, &client).await.unwrap(), 42);
    }
}
