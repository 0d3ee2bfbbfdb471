//! Primitive newtypes shared across the relayer core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw integer amount in an asset's native unit (no floats, ever).
pub type Amount = u128;

/// Absolute UNIX time in seconds.
pub type Timestamp = i64;

// ── Chain ────────────────────────────────────────────────────────────────────

/// The two legs of every swap. Named after the wire vocabulary in the
/// external event shape ("ethereum" | "stellar") rather than "A"/"B" so
/// logs and RPC payloads read naturally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Stellar,
}

impl Chain {
    /// The chain on the other side of a swap.
    pub fn other(self) -> Chain {
        match self {
            Chain::Ethereum => Chain::Stellar,
            Chain::Stellar => Chain::Ethereum,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Ethereum => write!(f, "ethereum"),
            Chain::Stellar => write!(f, "stellar"),
        }
    }
}

// ── OrderId ──────────────────────────────────────────────────────────────────

/// Opaque order identifier. The core reserves the right to mint ids of the
/// shape `order_<timestamp_ms>_<random_hex>` (see [`OrderId::generate`]) but
/// accepts any non-empty string supplied by a caller.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Mint a fresh id: `order_<unix_ms>_<16 hex chars>`.
    pub fn generate(now_ms: i64, random_bytes: &[u8; 8]) -> Self {
        Self(format!("order_{now_ms}_{}", hex::encode(random_bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderId({})", self.0)
    }
}

// ── ChainAddress ─────────────────────────────────────────────────────────────

/// A chain-scoped address (an EVM `0x...` address, a Stellar `G...` account,
/// or a contract id). Opaque to the core beyond chain-local validation in
/// `ChainClient::validate_order`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainAddress(pub String);

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── AssetKey ─────────────────────────────────────────────────────────────────

/// Identifies an asset as `(chain, symbol-or-contract)`. Unique across all
/// networks — two assets with the same symbol on different chains are
/// distinct `AssetKey`s.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct AssetKey {
    pub chain: Chain,
    pub symbol: String,
}

impl AssetKey {
    pub fn new(chain: Chain, symbol: impl Into<String>) -> Self {
        Self { chain, symbol: symbol.into() }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.symbol)
    }
}

// ── Hashlock ─────────────────────────────────────────────────────────────────

/// 32-byte binding to an unrevealed preimage: `sha256(preimage)` (see
/// hashbridge-crypto; canonical hash function per design note §9).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hashlock(pub [u8; 32]);

impl Hashlock {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn to_hex_0x(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex_0x(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let mut arr = [0u8; 32];
        if bytes.len() == 32 {
            arr.copy_from_slice(&bytes);
        } else {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        Ok(Self(arr))
    }
}

impl fmt::Display for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_0x())
    }
}

impl fmt::Debug for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hashlock({}…)", &self.to_hex_0x()[..10])
    }
}

// ── Preimage ─────────────────────────────────────────────────────────────────

/// 32 bytes revealed to unlock an escrow. Not `Debug`-printed in full to
/// avoid leaking secrets into logs accidentally.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preimage(pub [u8; 32]);

impl Preimage {
    pub fn from_hex_0x(s: &str) -> Result<Self, hex::FromHexError> {
        let hl = Hashlock::from_hex_0x(s)?;
        Ok(Self(hl.0))
    }

    pub fn to_hex_0x(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Preimage(<redacted>)")
    }
}

// ── Price ────────────────────────────────────────────────────────────────────

/// An integer ratio, used for auction prices so the core never touches
/// floating point. `num / den` is the price of one unit of `taker_asset`
/// expressed in `maker_asset` base units (or vice versa, by convention of
/// the caller — the auction always keeps numerator and denominator in the
/// same units it was constructed with).
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Price {
    pub num: u128,
    pub den: u128,
}

impl Price {
    pub fn new(num: u128, den: u128) -> Self {
        assert!(den > 0, "price denominator must be non-zero");
        Self { num, den }
    }

    /// Apply this price to an amount of the quote asset, returning the
    /// equivalent amount of the base asset, floored.
    pub fn apply(&self, amount: u128) -> u128 {
        // amount * num / den, widened to avoid overflow on typical 18-decimal amounts.
        let wide = (amount as u128).saturating_mul(self.num);
        wide / self.den
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashlock_hex_round_trips() {
        let hl = Hashlock([0x42u8; 32]);
        let s = hl.to_hex_0x();
        assert!(s.starts_with("0x"));
        assert_eq!(Hashlock::from_hex_0x(&s).unwrap(), hl);
    }

    #[test]
    fn hashlock_rejects_wrong_length() {
        assert!(Hashlock::from_hex_0x("0xabcd").is_err());
    }

    #[test]
    fn price_apply_is_integer_only() {
        let p = Price::new(3, 2);
        assert_eq!(p.apply(10), 15);
        assert_eq!(p.apply(1), 1); // floors 1.5 -> 1
    }

    #[test]
    fn chain_other_is_involution() {
        assert_eq!(Chain::Ethereum.other(), Chain::Stellar);
        assert_eq!(Chain::Stellar.other(), Chain::Ethereum);
        assert_eq!(Chain::Ethereum.other().other(), Chain::Ethereum);
    }
}
