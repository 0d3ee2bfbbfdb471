//! hashbridge-chain
//!
//! Chain clients and the event-monitoring poll loop.
//! Each `ChainClient` owns its own RPC connection and background task;
//! nothing here ever shares state across the chain boundary beyond the
//! `mpsc::Receiver<DomainEvent>` handed back from `start_monitoring`.

pub mod client;
mod ethereum;
mod poll;
mod rpc;
mod stellar;

pub use client::{ChainClient, CreateEscrowRequest, EscrowReceipt};
pub use ethereum::EthereumChainClient;
pub use poll::PollConfig;
pub use rpc::JsonRpcTransport;
pub use stellar::StellarChainClient;
