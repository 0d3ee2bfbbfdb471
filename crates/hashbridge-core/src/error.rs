//! Error taxonomy for the relayer core.
//!
//! Every fallible operation in the workspace returns `RelayError` (or a
//! `Result` aliased to it) so that the relayer controller and the RPC layer
//! can apply a single, uniform recovery policy per `kind`.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum RelayError {
    /// RPC timeout, connection reset, temporary upstream failure.
    /// Policy: retry with exponential backoff, bounded attempts, escalate
    /// to `Degraded` after the cap.
    #[error("transient error on {op} (attempt {attempt}): {detail}")]
    Transient {
        op: String,
        attempt: u32,
        detail: String,
    },

    /// Repeated `Transient` on a balance fetch. Policy: mark cache stale,
    /// continue serving the last known value, raise `liquidityAlert`.
    #[error("degraded: {context}")]
    Degraded { context: String },

    /// `has_liquidity` returned false, or a reservation lost a race.
    /// Policy: skip participation this tick, no retry.
    #[error("insufficient liquidity for {asset}: need {need}, available {available}")]
    InsufficientLiquidity {
        asset: String,
        need: u128,
        available: u128,
    },

    /// Amount out of scale, bad address format, wrong chain, unknown asset.
    /// Policy: reject the originating request; do not advance state.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `sha256(preimage) != hashlock` on a secret-reveal event.
    /// Policy: log, do not propagate, do not advance order.
    #[error("invalid preimage for order {order_id}")]
    InvalidPreimage { order_id: String },

    /// Claim or refund event for an unknown order id.
    /// Policy: log and ignore — may be a foreign escrow.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// Signing key missing, config invalid, unrecoverable chain disconnect.
    /// Policy: abort the process with a non-zero exit code.
    #[error("fatal: {0}")]
    Fatal(String),

    /// A requested state transition is not an edge of the order state
    /// machine.
    #[error("illegal order transition: {from} -> {attempted}")]
    IllegalTransition { from: String, attempted: String },

    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// Short machine-readable kind tag for the `{kind, message, details}`
    /// API error shape returned to RPC callers.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Transient { .. } => "Transient",
            RelayError::Degraded { .. } => "Degraded",
            RelayError::InsufficientLiquidity { .. } => "InsufficientLiquidity",
            RelayError::InvalidInput(_) => "InvalidInput",
            RelayError::InvalidPreimage { .. } => "InvalidPreimage",
            RelayError::OrderNotFound(_) => "OrderNotFound",
            RelayError::Fatal(_) => "Fatal",
            RelayError::IllegalTransition { .. } => "InvalidInput",
            RelayError::Other(_) => "Other",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Transient { .. })
    }
}
