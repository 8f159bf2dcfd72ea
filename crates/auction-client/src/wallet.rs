//! Ports for the contract write surface and the signing/account provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SubmissionError;
use crate::types::{Address, AuctionId};

/// A state-changing call against the auction contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ContractCall {
    Bid { auction_id: AuctionId, amount: u128 },
    Settle { auction_id: AuctionId },
    AddRelayer { address: Address },
    RemoveRelayer { address: Address },
    CreateTag { tag: String, target_uri: String },
}

impl fmt::Display for ContractCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractCall::Bid { auction_id, amount } => {
                write!(f, "bid {} on auction {}", amount, auction_id)
            }
            ContractCall::Settle { auction_id } => write!(f, "settle auction {}", auction_id),
            ContractCall::AddRelayer { address } => write!(f, "add relayer {}", address),
            ContractCall::RemoveRelayer { address } => write!(f, "remove relayer {}", address),
            ContractCall::CreateTag { tag, target_uri } => {
                write!(f, "create tag {} -> {}", tag, target_uri)
            }
        }
    }
}

/// Execution status reported with a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// What the write surface returns once the ledger accepts a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub transaction_hash: String,
    pub status: ReceiptStatus,
}

impl SubmissionReceipt {
    pub fn success(transaction_hash: impl Into<String>) -> Self {
        Self {
            transaction_hash: transaction_hash.into(),
            status: ReceiptStatus::Success,
        }
    }
}

/// Contract write surface. Every failure mode (declined signature,
/// insufficient funds, revert, network) is reported as a `SubmissionError`.
#[async_trait]
pub trait WriteSurface: Send + Sync {
    async fn submit(&self, call: ContractCall) -> Result<SubmissionReceipt, SubmissionError>;
}

/// Connected account as reported by the signing provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub chain_id: u64,
}

/// Signing/account provider. `None` means no wallet is connected and all
/// write operations are disabled.
pub trait AccountProvider: Send + Sync {
    fn active_account(&self) -> Option<Account>;
}

/// Provider with no wallet attached
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl AccountProvider for Disconnected {
    fn active_account(&self) -> Option<Account> {
        None
    }
}

/// Provider bound to one fixed account
#[derive(Debug, Clone)]
pub struct StaticAccount(pub Account);

impl AccountProvider for StaticAccount {
    fn active_account(&self) -> Option<Account> {
        Some(self.0.clone())
    }
}

/// Write surface used when no signer is available; rejects every call
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyWriter;

#[async_trait]
impl WriteSurface for ReadOnlyWriter {
    async fn submit(&self, call: ContractCall) -> Result<SubmissionReceipt, SubmissionError> {
        Err(SubmissionError::new(format!("cannot {}: client is read-only", call)))
    }
}
