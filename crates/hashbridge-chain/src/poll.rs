//! Shared polling loop for both chain clients, handling gap-filling and
//! a bounded dedup window. Both `EthereumChainClient` and
//! `StellarChainClient` talk to an indexer that exposes the same two
//! methods under a chain-specific prefix — `<prefix>_getHeight` and
//! `<prefix>_getEvents` — so the loop itself is written once here and
//! parameterized by prefix, grounded on the `tokio::select!` fan-in shape
//! `chronx_p2p::network::P2pNetwork::run` uses for its own event loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use hashbridge_core::error::RelayError;
use hashbridge_core::event::{ChainEvent, DomainEvent};
use hashbridge_core::types::Chain;

use crate::rpc::JsonRpcTransport;

/// How the poll loop behaves — chain-specific prefix plus tuning knobs the
/// node config exposes.
#[derive(Clone, Debug)]
pub struct PollConfig {
    pub method_prefix: &'static str,
    pub interval: Duration,
    /// Max block/ledger span requested per `getEvents` call — a gap larger
    /// than this is filled incrementally rather than in one request.
    pub max_chunk: u64,
    /// Capacity of the recently-seen tx_hash ring used to drop duplicate
    /// deliveries from an indexer that double-serves a range. This is a
    /// pre-filter ahead of the store's permanent dedup, not a replacement
    /// for it.
    pub dedup_window: usize,
    pub max_attempts: u32,
}

struct DedupRing {
    seen: std::collections::HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl DedupRing {
    fn new(capacity: usize) -> Self {
        Self {
            seen: std::collections::HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Returns `true` if `key` had not been seen before (i.e. is fresh).
    fn insert(&mut self, key: String) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.seen.insert(key);
        true
    }
}

/// Abstracts the raw JSON-RPC call behind the poll loop so tests can feed a
/// scripted sequence of heights/events without a live indexer. Implemented
/// for `JsonRpcTransport`; a mock implementation stands in for it in tests.
#[async_trait::async_trait]
pub(crate) trait PollTransport: Send + Sync {
    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, RelayError>;
}

#[async_trait::async_trait]
impl PollTransport for JsonRpcTransport {
    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, RelayError> {
        JsonRpcTransport::call(self, method, params).await
    }
}

#[derive(serde::Deserialize)]
struct RawEvent {
    height: u64,
    tx_hash: String,
    #[serde(flatten)]
    event: ChainEvent,
}

async fn fetch_height<T: PollTransport>(transport: &T, prefix: &str) -> Result<u64, RelayError> {
    let result = transport
        .call(&format!("{prefix}_getHeight"), serde_json::json!([]))
        .await?;
    result.as_u64().ok_or_else(|| {
        RelayError::Degraded {
            context: format!("{prefix}_getHeight returned non-numeric result"),
        }
    })
}

async fn fetch_events<T: PollTransport>(
    transport: &T,
    prefix: &str,
    from: u64,
    to: u64,
) -> Result<Vec<RawEvent>, RelayError> {
    let result = transport
        .call(&format!("{prefix}_getEvents"), serde_json::json!([from, to]))
        .await?;
    serde_json::from_value(result)
        .map_err(|e| RelayError::Degraded {
            context: format!("{prefix}_getEvents returned malformed payload: {e}"),
        })
}

/// Drive the poll loop until `stop` is set or the receiver is dropped.
pub async fn run<T: PollTransport + 'static>(
    chain: Chain,
    transport: T,
    config: PollConfig,
    from_height: u64,
    stop: Arc<AtomicBool>,
    tx: mpsc::Sender<DomainEvent>,
) {
    let mut watermark = from_height;
    let mut dedup = DedupRing::new(config.dedup_window);

    if tx
        .send(DomainEvent {
            chain,
            event: ChainEvent::Ready { from_height },
        })
        .await
        .is_err()
    {
        return;
    }

    while !stop.load(Ordering::Relaxed) {
        tokio::time::sleep(config.interval).await;
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let tip = match fetch_height(&transport, config.method_prefix).await {
            Ok(h) => h,
            Err(e) => {
                warn!(%chain, error = %e, "poll: failed to fetch chain height");
                continue;
            }
        };
        if tip <= watermark {
            continue;
        }

        // Gap-filling: walk the range in bounded chunks so one indexer
        // call never has to materialize an unbounded span after a long
        // disconnect.
        let mut cursor = watermark + 1;
        while cursor <= tip {
            let chunk_end = (cursor + config.max_chunk - 1).min(tip);
            match fetch_with_retry(&transport, config.method_prefix, cursor, chunk_end, config.max_attempts)
                .await
            {
                Ok(events) => {
                    for raw in events {
                        if !dedup.insert(raw.tx_hash.clone()) {
                            debug!(%chain, tx_hash = %raw.tx_hash, "poll: dropped duplicate within dedup window");
                            continue;
                        }
                        if tx
                            .send(DomainEvent {
                                chain,
                                event: raw.event,
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    watermark = chunk_end;
                    cursor = chunk_end + 1;
                }
                Err(e) => {
                    warn!(%chain, from = cursor, to = chunk_end, error = %e, "poll: giving up on this chunk for now, will retry next tick");
                    break;
                }
            }
        }
    }
}

async fn fetch_with_retry<T: PollTransport>(
    transport: &T,
    prefix: &str,
    from: u64,
    to: u64,
    max_attempts: u32,
) -> Result<Vec<RawEvent>, RelayError> {
    let mut attempt = 1;
    loop {
        match fetch_events(transport, prefix, from, to).await {
            Ok(events) => return Ok(events),
            Err(e) if attempt < max_attempts => {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
                attempt += 1;
                debug!(attempt, error = %e, "poll: retrying getEvents");
            }
            Err(e) => return Err(e),
        }
    }
}
