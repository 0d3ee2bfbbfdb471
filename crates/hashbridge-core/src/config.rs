//! Configuration surface: every recognized tunable is a field here with a
//! documented default. Loadable from a TOML file (`RelayConfig::load`) or
//! used as-is via `RelayConfig::default()`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Freshness window for the balance cache, seconds.
    pub cache_ttl_seconds: u64,
    /// Background balance-refresh cadence, seconds.
    pub balance_update_interval_seconds: u64,
    /// Auto-expiry of auction liquidity holds, seconds.
    pub reservation_timeout_seconds: u64,
    /// Reservation-sweeper cadence, seconds.
    pub reservation_cleanup_interval_seconds: u64,
    /// Dutch-auction window length when an order doesn't specify one.
    pub auction_default_duration_seconds: u64,
    /// Upper bound applied to quote deviation.
    pub max_slippage: f64,
    /// Warning-band fraction of total balance.
    pub low_liquidity_threshold_fraction: f64,
    /// Critical-band fraction of total balance.
    pub critical_liquidity_threshold_fraction: f64,
    /// Per-call chain RPC deadline, seconds.
    pub rpc_timeout_seconds: u64,
    /// Fallback poll cadence when event streaming is unavailable, seconds.
    pub monitoring_poll_interval_seconds: u64,
    /// Destination-chain escrow timelock safety margin vs. source-chain
    /// escrow, seconds. Default: 30 minutes.
    pub escrow_timelock_safety_margin_seconds: i64,
    /// Consecutive balance-refresh failures before an entry is marked
    /// stale.
    pub balance_stale_after_failures: u32,
    /// Controller's bounded retry count on a `Transient` claim failure.
    pub controller_claim_retry_attempts: u32,
    /// Periodic timeout-sweeper cadence, seconds. Default: every minute.
    pub sweeper_interval_seconds: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 30,
            balance_update_interval_seconds: 15,
            reservation_timeout_seconds: 300,
            reservation_cleanup_interval_seconds: 60,
            auction_default_duration_seconds: 300,
            max_slippage: 0.05,
            low_liquidity_threshold_fraction: 0.20,
            critical_liquidity_threshold_fraction: 0.05,
            rpc_timeout_seconds: 30,
            monitoring_poll_interval_seconds: 12,
            escrow_timelock_safety_margin_seconds: 30 * 60,
            balance_stale_after_failures: 4,
            controller_claim_retry_attempts: 5,
            sweeper_interval_seconds: 60,
        }
    }
}

impl RelayConfig {
    /// Load from a TOML file, falling back to documented defaults for any
    /// field the file omits.
    pub fn load(path: &std::path::Path) -> Result<Self, crate::error::RelayError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            crate::error::RelayError::Fatal(format!("reading config {}: {e}", path.display()))
        })?;
        toml::from_str(&text)
            .map_err(|e| crate::error::RelayError::Fatal(format!("parsing config: {e}")))
    }
}
