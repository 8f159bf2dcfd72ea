//! Auction Client Library
//!
//! Client-side engine for an on-chain English auction: ledger clock
//! reconciliation, a synchronized auction repository, the per-auction
//! lifecycle, bid rules, transaction tracking and multi-step flows.

pub mod bid_rules;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod navigation;
pub mod query;
pub mod repository;
pub mod steps;
pub mod sync;
pub mod transaction;
pub mod types;
pub mod wallet;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use client::{AuctionClient, BackgroundTasks};
pub use clock::{BackgroundTask, ClockReconciler, LocalClock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use error::{BidError, ClientError, ClientResult, QueryError, StepError, SubmissionError};
pub use lifecycle::{AuctionPhase, EndStrategy, LifecycleEngine, LifecycleHandle, TickOutcome};
pub use navigation::Navigation;
pub use query::{AuctionQuery, GraphQlQueryClient};
pub use repository::{AuctionRepository, ReplaceOutcome};
pub use steps::{StepKind, StepOrchestrator};
pub use transaction::{TransactionFlow, TransactionId, TransactionKind, TransactionRecord, TransactionState};
pub use types::{Address, AuctionId, AuctionSettings, AuctionSnapshot, Bid};
pub use wallet::{AccountProvider, ContractCall, SubmissionReceipt, WriteSurface};
