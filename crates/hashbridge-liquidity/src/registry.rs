//! Asset Registry: per-asset configuration and decimal
//! conversion. Generalizes `chronx_core::constants::CHRONOS_PER_KX` — one
//! hardcoded `10^6` scale factor for a single asset — into a per-asset
//! `decimals` field looked up at runtime for an open set of assets.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use hashbridge_core::error::RelayError;
use hashbridge_core::types::AssetKey;

/// Upper bound on `AssetConfig::decimals` a registered asset may declare.
/// 36 comfortably covers every ERC-20/Stellar asset in practice (most sit
/// at 6-18) while still catching a fat-fingered or malformed config file.
pub const MAX_DECIMALS: u32 = 36;

/// Static configuration for one registered asset. `Serialize`/`Deserialize`
/// so a node binary can load a list of these from a TOML file at startup
/// the way `RelayConfig::load` loads its own settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetConfig {
    pub asset: AssetKey,
    /// Native-unit fractional digits (18 for most ERC-20s, 7 for Stellar).
    /// Must be in `0..=MAX_DECIMALS`; `register` rejects anything outside
    /// that range rather than silently registering a config that would
    /// later panic `10u128.pow(decimals)` in `format_fixed`/`parse_fixed`.
    pub decimals: u32,
    /// On-chain identifier: contract address on Ethereum, asset code/issuer
    /// on Stellar.
    pub on_chain_id: String,
    /// True for the chain's native coin (ETH, XLM) rather than a token/asset
    /// issued on top of it — `on_chain_id` is a convention-by-chain string
    /// either way, so callers that need to tell "the chain's own coin"
    /// apart from "an asset on that chain" need this explicitly.
    pub is_native: bool,
    pub warning_threshold: u128,
    pub minimum_threshold: u128,
}

#[derive(Default)]
pub struct AssetRegistry {
    assets: RwLock<HashMap<AssetKey, AssetConfig>>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a config whose `decimals` falls outside `0..=MAX_DECIMALS`
    /// instead of registering it and failing later at conversion time.
    pub fn register(&self, config: AssetConfig) -> Result<(), RelayError> {
        if config.decimals > MAX_DECIMALS {
            return Err(RelayError::InvalidInput(format!(
                "asset {} declares {} decimals, maximum is {MAX_DECIMALS}",
                config.asset, config.decimals
            )));
        }
        self.assets.write().unwrap().insert(config.asset.clone(), config);
        Ok(())
    }

    pub fn get(&self, asset: &AssetKey) -> Option<AssetConfig> {
        self.assets.read().unwrap().get(asset).cloned()
    }

    /// Interpret `raw` native units as a decimal string with the asset's
    /// `decimals` fractional digits.
    pub fn convert_to_decimal(&self, asset: &AssetKey, raw: u128) -> Result<String, RelayError> {
        let config = self.require(asset)?;
        Ok(format_fixed(raw, config.decimals))
    }

    /// Inverse of `convert_to_decimal`. Rejects on precision loss — a
    /// fractional part with more digits than `decimals` would silently
    /// truncate, which this refuses instead.
    pub fn convert_from_decimal(&self, asset: &AssetKey, decimal: &str) -> Result<u128, RelayError> {
        let config = self.require(asset)?;
        parse_fixed(decimal, config.decimals)
    }

    fn require(&self, asset: &AssetKey) -> Result<AssetConfig, RelayError> {
        self.get(asset).ok_or_else(|| {
            RelayError::InvalidInput(format!("asset {asset} is not registered"))
        })
    }
}

fn format_fixed(raw: u128, decimals: u32) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let scale = 10u128.pow(decimals);
    let whole = raw / scale;
    let frac = raw % scale;
    format!("{whole}.{frac:0width$}", width = decimals as usize)
}

fn parse_fixed(decimal: &str, decimals: u32) -> Result<u128, RelayError> {
    let (whole, frac) = match decimal.split_once('.') {
        Some((w, f)) => (w, f),
        None => (decimal, ""),
    };
    if frac.len() > decimals as usize {
        return Err(RelayError::InvalidInput(format!(
            "{decimal} has more than {decimals} fractional digits"
        )));
    }
    let whole_part: u128 = whole
        .parse()
        .map_err(|_| RelayError::InvalidInput(format!("{decimal} is not a valid decimal amount")))?;
    let frac_padded = format!("{frac:0<width$}", width = decimals as usize);
    let frac_part: u128 = if frac_padded.is_empty() {
        0
    } else {
        frac_padded
            .parse()
            .map_err(|_| RelayError::InvalidInput(format!("{decimal} is not a valid decimal amount")))?
    };
    Ok(whole_part * 10u128.pow(decimals) + frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbridge_core::types::Chain;

    fn eth_usdc() -> AssetConfig {
        AssetConfig {
            asset: AssetKey::new(Chain::Ethereum, "USDC"),
            decimals: 6,
            on_chain_id: "0xusdc".into(),
            is_native: false,
            warning_threshold: 1_000_000,
            minimum_threshold: 100_000,
        }
    }

    #[test]
    fn round_trips_through_decimal_string() {
        let registry = AssetRegistry::new();
        registry.register(eth_usdc()).unwrap();
        let asset = AssetKey::new(Chain::Ethereum, "USDC");
        let decimal = registry.convert_to_decimal(&asset, 1_500_000).unwrap();
        assert_eq!(decimal, "1.500000");
        assert_eq!(registry.convert_from_decimal(&asset, &decimal).unwrap(), 1_500_000);
    }

    #[test]
    fn rejects_precision_loss() {
        let registry = AssetRegistry::new();
        registry.register(eth_usdc()).unwrap();
        let asset = AssetKey::new(Chain::Ethereum, "USDC");
        assert!(registry.convert_from_decimal(&asset, "1.1234567").is_err());
    }

    #[test]
    fn unregistered_asset_is_rejected() {
        let registry = AssetRegistry::new();
        let asset = AssetKey::new(Chain::Stellar, "XLM");
        assert!(registry.convert_to_decimal(&asset, 1).is_err());
    }

    #[test]
    fn decimals_beyond_max_are_rejected() {
        let registry = AssetRegistry::new();
        let mut config = eth_usdc();
        config.decimals = MAX_DECIMALS + 1;
        assert!(registry.register(config).is_err());
        assert!(registry.get(&AssetKey::new(Chain::Ethereum, "USDC")).is_none());
    }
}
