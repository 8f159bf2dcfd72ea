//! Shared in-memory ports for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use auction_client::error::{QueryError, SubmissionError};
use auction_client::wallet::{Account, StaticAccount};
use auction_client::{
    Address, AuctionClient, AuctionId, AuctionQuery, AuctionSettings, AuctionSnapshot, ClientConfig,
    ContractCall, ManualClock, SubmissionReceipt, WriteSurface,
};

pub struct MockQuery {
    pub auctions: Mutex<Vec<AuctionSnapshot>>,
    pub auctions_error: Mutex<Option<QueryError>>,
    pub settings: Mutex<AuctionSettings>,
    pub ledger_time: Mutex<Result<i64, QueryError>>,
}

impl MockQuery {
    pub fn new(auctions: Vec<AuctionSnapshot>, ledger_time: i64) -> Self {
        Self {
            auctions: Mutex::new(auctions),
            auctions_error: Mutex::new(None),
            settings: Mutex::new(AuctionSettings::default()),
            ledger_time: Mutex::new(Ok(ledger_time)),
        }
    }

    pub fn set_auctions(&self, auctions: Vec<AuctionSnapshot>) {
        *self.auctions.lock().unwrap() = auctions;
    }
}

#[async_trait]
impl AuctionQuery for MockQuery {
    async fn fetch_auctions(&self, _first: u32) -> Result<Vec<AuctionSnapshot>, QueryError> {
        if let Some(e) = self.auctions_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.auctions.lock().unwrap().clone())
    }

    async fn fetch_settings(&self) -> Result<AuctionSettings, QueryError> {
        Ok(*self.settings.lock().unwrap())
    }

    async fn latest_ledger_timestamp(&self) -> Result<i64, QueryError> {
        self.ledger_time.lock().unwrap().clone()
    }
}

/// Records every call; answers with the configured response
pub struct MockWriter {
    pub calls: Mutex<Vec<ContractCall>>,
    pub response: Mutex<Result<SubmissionReceipt, SubmissionError>>,
}

impl MockWriter {
    pub fn accepting() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            response: Mutex::new(Ok(SubmissionReceipt::success("0xabc"))),
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
impl WriteSurface for MockWriter {
    async fn submit(&self, call: ContractCall) -> Result<SubmissionReceipt, SubmissionError> {
        self.calls.lock().unwrap().push(call);
        self.response.lock().unwrap().clone()
    }
}

pub fn running_auction(id: AuctionId, end_time: i64, amount: u128) -> AuctionSnapshot {
    AuctionSnapshot {
        start_time: end_time - 100,
        end_time,
        amount,
        bidder: Some(Address::new("0xB1dDeR")),
        ..AuctionSnapshot::not_started(id, 0)
    }
}

pub fn account() -> StaticAccount {
    StaticAccount(Account {
        address: Address::new("0xA11CE"),
        chain_id: 1,
    })
}

/// Client over mocks, synchronized once, with a local clock equal to ledger time
pub async fn synced_client(
    config: ClientConfig,
    query: Arc<MockQuery>,
    writer: Arc<MockWriter>,
    now: i64,
) -> (AuctionClient, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    let client = AuctionClient::new(config, query, writer, Arc::new(account()), clock.clone());
    assert!(client.initial_sync().await);
    (client, clock)
}
