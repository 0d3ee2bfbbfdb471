use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use hashbridge_core::error::RelayError;
use hashbridge_core::event::DomainEvent;
use hashbridge_core::order::{Escrow, EscrowStatus, Order};
use hashbridge_core::types::{Amount, AssetKey, Chain, OrderId, Preimage};

use crate::client::{ChainClient, CreateEscrowRequest, EscrowReceipt};
use crate::poll::{self, PollConfig};
use crate::rpc::JsonRpcTransport;

pub struct StellarChainClient {
    transport: JsonRpcTransport,
    poll_config: PollConfig,
    stop: Arc<AtomicBool>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl StellarChainClient {
    pub fn new(rpc_url: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            transport: JsonRpcTransport::new(rpc_url),
            poll_config: PollConfig {
                method_prefix: "stellar",
                interval: poll_interval,
                // Stellar ledgers close roughly every 5s vs. Ethereum's 12s
                // block time — a smaller chunk keeps a single getEvents
                // call from spanning a much wider wall-clock window.
                max_chunk: 500,
                dedup_window: 4_096,
                max_attempts: 5,
            },
            stop: Arc::new(AtomicBool::new(false)),
            task: std::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl ChainClient for StellarChainClient {
    fn chain(&self) -> Chain {
        Chain::Stellar
    }

    async fn connect(&self) -> Result<(), RelayError> {
        self.transport
            .call("stellar_getHeight", serde_json::json!([]))
            .await?;
        Ok(())
    }

    async fn validate_order(&self, order: &Order) -> Result<(), RelayError> {
        if !order.receiver.0.starts_with('G') || order.receiver.0.len() != 56 {
            return Err(RelayError::InvalidInput(format!(
                "{} is not a well-formed Stellar account id",
                order.receiver.0
            )));
        }
        Ok(())
    }

    async fn create_escrow(&self, req: &CreateEscrowRequest) -> Result<EscrowReceipt, RelayError> {
        let result = self
            .transport
            .call(
                "stellar_createEscrow",
                serde_json::json!({
                    "orderId": req.order_id,
                    "amount": req.amount.to_string(),
                    "asset": req.asset.symbol,
                    "hashlock": req.hashlock.to_hex_0x(),
                    "timelock": req.timelock,
                    "beneficiary": req.beneficiary.0,
                    "safetyDeposit": req.safety_deposit.to_string(),
                }),
            )
            .await?;
        parse_receipt(result)
    }

    async fn claim_escrow(
        &self,
        order_id: &OrderId,
        preimage: &Preimage,
    ) -> Result<EscrowReceipt, RelayError> {
        let result = self
            .transport
            .call(
                "stellar_claimEscrow",
                serde_json::json!({ "orderId": order_id, "preimage": preimage.to_hex_0x() }),
            )
            .await?;
        parse_receipt(result)
    }

    async fn refund_escrow(&self, order_id: &OrderId) -> Result<EscrowReceipt, RelayError> {
        let result = self
            .transport
            .call("stellar_refundEscrow", serde_json::json!({ "orderId": order_id }))
            .await?;
        parse_receipt(result)
    }

    async fn get_escrow_state(&self, order_id: &OrderId) -> Result<Option<Escrow>, RelayError> {
        let result = self
            .transport
            .call("stellar_getEscrow", serde_json::json!([order_id]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let escrow: WireEscrow = serde_json::from_value(result)
            .map_err(|e| RelayError::Degraded { context: format!("stellar_getEscrow: {e}") })?;
        Ok(Some(escrow.into_escrow(Chain::Stellar)))
    }

    async fn start_monitoring(
        &self,
        from_height: u64,
    ) -> Result<mpsc::Receiver<DomainEvent>, RelayError> {
        self.stop.store(false, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(256);
        let transport = self.transport.clone();
        let config = self.poll_config.clone();
        let stop = self.stop.clone();
        let handle = tokio::spawn(poll::run(Chain::Stellar, transport, config, from_height, stop, tx));
        *self.task.lock().unwrap() = Some(handle);
        Ok(rx)
    }

    async fn get_balance(&self, asset: &AssetKey) -> Result<Amount, RelayError> {
        let result = self
            .transport
            .call("stellar_getBalance", serde_json::json!([asset.symbol]))
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| RelayError::Degraded { context: "stellar_getBalance: expected string amount".into() })?;
        raw.parse()
            .map_err(|_| RelayError::Degraded { context: format!("stellar_getBalance: malformed amount {raw}") })
    }

    async fn stop_monitoring(&self) {
        self.stop.store(true, Ordering::Relaxed);
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEscrow {
    order_id: OrderId,
    contract_id: Vec<u8>,
    amount: u128,
    asset: hashbridge_core::types::AssetKey,
    hashlock: hashbridge_core::types::Hashlock,
    timelock: i64,
    creator: String,
    beneficiary: String,
    safety_deposit: u128,
    status: String,
    tx_hash: String,
    height: u64,
}

impl WireEscrow {
    fn into_escrow(self, chain: Chain) -> Escrow {
        Escrow {
            order_id: self.order_id,
            chain,
            contract_id: self.contract_id,
            amount: self.amount,
            asset: self.asset,
            hashlock: self.hashlock,
            timelock: self.timelock,
            creator: hashbridge_core::types::ChainAddress(self.creator),
            beneficiary: hashbridge_core::types::ChainAddress(self.beneficiary),
            safety_deposit: self.safety_deposit,
            status: match self.status.as_str() {
                "claimed" => EscrowStatus::Claimed,
                "refunded" => EscrowStatus::Refunded,
                _ => EscrowStatus::Created,
            },
            tx_hash: self.tx_hash,
            height: self.height,
        }
    }
}

fn parse_receipt(value: serde_json::Value) -> Result<EscrowReceipt, RelayError> {
    let tx_hash = value["txHash"]
        .as_str()
        .ok_or_else(|| RelayError::Degraded { context: "missing txHash in receipt".into() })?
        .to_string();
    let height = value["height"].as_u64().unwrap_or(0);
    let contract_id = value["contractId"]
        .as_str()
        .map(|s| s.as_bytes().to_vec())
        .unwrap_or_default();
    Ok(EscrowReceipt { tx_hash, contract_id, height })
}
