//! Transaction flow engine
//!
//! Tracks each logical write attempt under a caller-chosen id, from the
//! moment it is requested until the ledger accepts or the submission fails.
//! All consumers referencing the same id read the same record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::SubmissionError;
use crate::types::AuctionId;
use crate::wallet::{ReceiptStatus, SubmissionReceipt};

/// Caller-chosen key for one logical write attempt. Distinct from the ledger
/// hash, which does not exist until the submission is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Conventional id for an auction-scoped write, e.g. `bid-7`
    pub fn for_auction(kind: TransactionKind, auction_id: AuctionId) -> Self {
        Self(format!("{}-{}", kind.slug(), auction_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Bid,
    Settle,
    AddRelayer,
    RemoveRelayer,
    CreateTag,
}

impl TransactionKind {
    pub fn slug(&self) -> &'static str {
        match self {
            TransactionKind::Bid => "bid",
            TransactionKind::Settle => "settle",
            TransactionKind::AddRelayer => "add-relayer",
            TransactionKind::RemoveRelayer => "remove-relayer",
            TransactionKind::CreateTag => "create-tag",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            TransactionKind::Bid => "Bid placed successfully",
            TransactionKind::Settle => "Auction settled successfully",
            TransactionKind::AddRelayer => "Relayer added successfully",
            TransactionKind::RemoveRelayer => "Relayer removed successfully",
            TransactionKind::CreateTag => "Tag created successfully",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Lifecycle state of a transaction id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Absent,
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub kind: TransactionKind,
    pub is_pending: bool,
    pub is_success: bool,
    pub is_error: bool,
    pub message: Option<String>,
    pub hash: Option<String>,
}

impl TransactionRecord {
    pub fn pending(kind: TransactionKind, hash: Option<String>) -> Self {
        Self {
            kind,
            is_pending: true,
            is_success: false,
            is_error: false,
            message: None,
            hash,
        }
    }

    pub fn state(&self) -> TransactionState {
        if self.is_error {
            TransactionState::Error
        } else if self.is_success {
            TransactionState::Success
        } else {
            TransactionState::Pending
        }
    }

    /// Merge the fields present in `update`; absent fields are kept
    pub fn apply(&mut self, update: &TransactionUpdate) {
        if let Some(is_pending) = update.is_pending {
            self.is_pending = is_pending;
        }
        if let Some(is_success) = update.is_success {
            self.is_success = is_success;
        }
        if let Some(is_error) = update.is_error {
            self.is_error = is_error;
        }
        if let Some(message) = &update.message {
            self.message = Some(message.clone());
        }
        if let Some(hash) = &update.hash {
            self.hash = Some(hash.clone());
        }
    }
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionUpdate {
    pub is_pending: Option<bool>,
    pub is_success: Option<bool>,
    pub is_error: Option<bool>,
    pub message: Option<String>,
    pub hash: Option<String>,
}

impl TransactionUpdate {
    /// Hash arrived, still waiting for the outcome
    pub fn hash(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            ..Self::default()
        }
    }

    pub fn success(hash: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            is_pending: Some(false),
            is_success: Some(true),
            is_error: Some(false),
            message: Some(message.into()),
            hash: Some(hash.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_pending: Some(false),
            is_success: Some(false),
            is_error: Some(true),
            message: Some(message.into()),
            hash: None,
        }
    }
}

pub type TransactionMap = HashMap<TransactionId, TransactionRecord>;

/// Sole owner of all transaction records
pub struct TransactionFlow {
    records: watch::Sender<TransactionMap>,
}

impl Default for TransactionFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionFlow {
    pub fn new() -> Self {
        let (records, _) = watch::channel(TransactionMap::new());
        Self { records }
    }

    /// Create a pending record, replacing any previous one under `id`
    pub fn add_transaction(&self, id: TransactionId, kind: TransactionKind, hash: Option<String>) {
        self.records.send_modify(|records| {
            records.insert(id, TransactionRecord::pending(kind, hash));
        });
    }

    /// Merge `update` into the record. Returns false if `id` is unknown.
    pub fn update_transaction(&self, id: &TransactionId, update: TransactionUpdate) -> bool {
        self.records.send_if_modified(|records| match records.get_mut(id) {
            Some(record) => {
                record.apply(&update);
                true
            }
            None => false,
        })
    }

    pub fn remove_transaction(&self, id: &TransactionId) -> Option<TransactionRecord> {
        let mut removed = None;
        self.records.send_if_modified(|records| {
            removed = records.remove(id);
            removed.is_some()
        });
        removed
    }

    pub fn get(&self, id: &TransactionId) -> Option<TransactionRecord> {
        self.records.borrow().get(id).cloned()
    }

    pub fn state(&self, id: &TransactionId) -> TransactionState {
        self.records
            .borrow()
            .get(id)
            .map_or(TransactionState::Absent, TransactionRecord::state)
    }

    pub fn is_pending(&self, id: &TransactionId) -> bool {
        self.state(id) == TransactionState::Pending
    }

    pub fn pending_count(&self) -> usize {
        self.records.borrow().values().filter(|r| r.is_pending).count()
    }

    /// Receiver notified whenever any record changes
    pub fn subscribe(&self) -> watch::Receiver<TransactionMap> {
        self.records.subscribe()
    }

    /// Track `submission` under `id`: create a pending record, await the
    /// write surface, then record the hash and success message or the
    /// failure message verbatim. `is_pending` is always cleared.
    ///
    /// Concurrent calls sharing an id are not rejected; the last write wins.
    /// Callers should disable the triggering control while pending.
    pub async fn initiate_transaction<F>(
        &self,
        id: TransactionId,
        kind: TransactionKind,
        submission: F,
    ) -> TransactionRecord
    where
        F: Future<Output = Result<SubmissionReceipt, SubmissionError>>,
    {
        let mut record = TransactionRecord::pending(kind, None);
        self.add_transaction(id.clone(), kind, None);

        let update = match submission.await {
            Ok(receipt) if receipt.status == ReceiptStatus::Success => {
                info!("Transaction {} ({}) accepted: {}", id, kind, receipt.transaction_hash);
                TransactionUpdate::success(receipt.transaction_hash, kind.success_message())
            }
            Ok(receipt) => {
                error!("Transaction {} ({}) reverted: {}", id, kind, receipt.transaction_hash);
                TransactionUpdate {
                    hash: Some(receipt.transaction_hash),
                    ..TransactionUpdate::error("Transaction reverted")
                }
            }
            Err(e) => {
                error!("Transaction {} ({}) failed: {}", id, kind, e.message);
                TransactionUpdate::error(e.message)
            }
        };

        record.apply(&update);
        if !self.update_transaction(&id, update) {
            info!("Transaction {} was removed before it completed", id);
        }
        record
    }
}
