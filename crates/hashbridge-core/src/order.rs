//! Order, Escrow, and SecretRevelation data model.

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Chain, ChainAddress, Hashlock, OrderId, Preimage, Price, Timestamp};

/// One of the eleven states an order may occupy. Edges between these are
/// enforced by `hashbridge-lifecycle`, not by this type — this crate only
/// carries the data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    Pending,
    AuctionActive,
    EscrowCreated,
    BothEscrowed,
    SecretRevealed,
    HtlcCreated,
    Filled,
    Completed,
    Cancelled,
    Expired,
    Refunded,
}

impl OrderStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The unit of swap intent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub maker: ChainAddress,
    pub receiver: ChainAddress,
    pub maker_asset: crate::types::AssetKey,
    pub taker_asset: crate::types::AssetKey,
    pub making_amount: Amount,
    pub taking_amount: Amount,
    pub hashlock: Hashlock,
    pub timelock: Timestamp,
    pub auction_start_time: Timestamp,
    pub auction_end_time: Timestamp,
    pub reserve_price: Price,
    /// Extra secret hashes for partial fills.
    pub secret_hashes: Vec<Hashlock>,
    /// Extra principal locked alongside the maker's amount on the
    /// resolver's own escrow.
    pub safety_deposit: Amount,
    pub status: OrderStatus,
    pub created_at: Timestamp,
    pub last_transition_at: Timestamp,
}

impl Order {
    /// Validate the invariants a freshly submitted order must satisfy.
    /// Does not check chain-local address/asset validity — that is
    /// `ChainClient::validate_order`'s job.
    pub fn validate_invariants(&self) -> Result<(), crate::error::RelayError> {
        use crate::error::RelayError;

        if self.making_amount == 0 {
            return Err(RelayError::InvalidInput("making_amount must be > 0".into()));
        }
        if self.taking_amount == 0 {
            return Err(RelayError::InvalidInput("taking_amount must be > 0".into()));
        }
        if !(self.auction_start_time <= self.auction_end_time
            && self.auction_end_time < self.timelock)
        {
            return Err(RelayError::InvalidInput(
                "auction_start_time <= auction_end_time < timelock violated".into(),
            ));
        }
        Ok(())
    }
}

/// Status of a single-chain escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    Created,
    Claimed,
    Refunded,
}

/// One per chain per order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Escrow {
    pub order_id: OrderId,
    pub chain: Chain,
    pub contract_id: Vec<u8>,
    pub amount: Amount,
    pub asset: crate::types::AssetKey,
    pub hashlock: Hashlock,
    pub timelock: Timestamp,
    pub creator: ChainAddress,
    pub beneficiary: ChainAddress,
    pub safety_deposit: Amount,
    pub status: EscrowStatus,
    pub tx_hash: String,
    pub height: u64,
}

impl Escrow {
    /// Escrow invariant: hashlock and timelock must match the order.
    pub fn matches_order(&self, order: &Order) -> bool {
        self.hashlock == order.hashlock && self.order_id == order.order_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetKey;

    fn sample_order() -> Order {
        Order {
            order_id: OrderId::new("order_1"),
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
            status: OrderStatus::Pending,
            created_at: 0,
            last_transition_at: 0,
        }
    }

    #[test]
    fn rejects_zero_amounts() {
        let mut o = sample_order();
        o.making_amount = 0;
        assert!(o.validate_invariants().is_err());
    }

    #[test]
    fn rejects_auction_window_not_before_timelock() {
        let mut o = sample_order();
        o.auction_end_time = o.timelock;
        assert!(o.validate_invariants().is_err());
    }

    #[test]
    fn accepts_well_formed_order() {
        assert!(sample_order().validate_invariants().is_ok());
    }

    #[test]
    fn terminal_states_are_exactly_the_documented_three() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Expired.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }
}

/// Append-only record of a revealed preimage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecretRevelation {
    /// Monotonic id assigned at append time, used for idempotent replay
    /// detection by the store.
    pub id: u64,
    pub order_id: OrderId,
    pub preimage: Preimage,
    pub hashlock: Hashlock,
    pub chain: Chain,
    pub tx_hash: String,
    pub revealer: ChainAddress,
    pub timestamp: Timestamp,
}
