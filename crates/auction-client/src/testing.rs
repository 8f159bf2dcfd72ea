//! In-memory ports for unit tests

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::{QueryError, SubmissionError};
use crate::query::AuctionQuery;
use crate::types::{AuctionSettings, AuctionSnapshot};
use crate::wallet::{ContractCall, SubmissionReceipt, WriteSurface};

/// Query service returning whatever was last set
pub struct StaticQuery {
    auctions: Mutex<Result<Vec<AuctionSnapshot>, QueryError>>,
    settings: Mutex<Result<AuctionSettings, QueryError>>,
    ledger_time: Mutex<Result<i64, QueryError>>,
}

impl Default for StaticQuery {
    fn default() -> Self {
        Self {
            auctions: Mutex::new(Ok(Vec::new())),
            settings: Mutex::new(Ok(AuctionSettings::default())),
            ledger_time: Mutex::new(Ok(0)),
        }
    }
}

impl StaticQuery {
    pub fn set_auctions(&self, auctions: Result<Vec<AuctionSnapshot>, QueryError>) {
        *self.auctions.lock().unwrap() = auctions;
    }

    pub fn set_settings(&self, settings: Result<AuctionSettings, QueryError>) {
        *self.settings.lock().unwrap() = settings;
    }

    pub fn set_ledger_time(&self, ledger_time: Result<i64, QueryError>) {
        *self.ledger_time.lock().unwrap() = ledger_time;
    }
}

#[async_trait]
impl AuctionQuery for StaticQuery {
    async fn fetch_auctions(&self, _first: u32) -> Result<Vec<AuctionSnapshot>, QueryError> {
        self.auctions.lock().unwrap().clone()
    }

    async fn fetch_settings(&self) -> Result<AuctionSettings, QueryError> {
        self.settings.lock().unwrap().clone()
    }

    async fn latest_ledger_timestamp(&self) -> Result<i64, QueryError> {
        self.ledger_time.lock().unwrap().clone()
    }
}

/// Write surface that records calls and answers with a fixed response
pub struct RecordingWriter {
    calls: Mutex<Vec<ContractCall>>,
    response: Mutex<Result<SubmissionReceipt, SubmissionError>>,
}

impl RecordingWriter {
    pub fn accepting(hash: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            response: Mutex::new(Ok(SubmissionReceipt::success(hash))),
        }
    }

    pub fn rejecting(message: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            response: Mutex::new(Err(SubmissionError::new(message))),
        }
    }

    pub fn calls(&self) -> Vec<ContractCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WriteSurface for RecordingWriter {
    async fn submit(&self, call: ContractCall) -> Result<SubmissionReceipt, SubmissionError> {
        self.calls.lock().unwrap().push(call);
        self.response.lock().unwrap().clone()
    }
}
