//! Dutch Auction: time-decaying offer price plus the
//! liquidity-gated participation decision that commits or skips each
//! order on every quote-request tick.

pub mod participation;
pub mod price;

pub use participation::{fcfs_order, AuctionDecision, DutchAuction};
pub use price::{current_price, opening_price};
