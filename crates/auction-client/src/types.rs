//! Core auction domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable auction identity assigned by the contract
pub type AuctionId = u64;

/// Ledger account address. Comparison is case-insensitive, matching how
/// hex addresses are rendered by different providers.
#[derive(Debug, Clone, Serialize, Deserialize, Eq)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single bid as recorded on the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bid {
    pub bidder: Address,
    pub amount: u128,
    /// Ledger timestamp (seconds)
    pub timestamp: i64,
}

/// Point-in-time copy of an auction as last synchronized.
///
/// Snapshots are never mutated field by field once handed to the
/// repository; changes are made on a copy and applied with a bulk replace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuctionSnapshot {
    pub id: AuctionId,
    /// Ledger seconds; zero means the auction has not started
    pub start_time: i64,
    /// Ledger seconds; only meaningful once `start_time > 0`
    pub end_time: i64,
    pub reserve_price: u128,
    /// Current high bid in minor units
    pub amount: u128,
    pub bidder: Option<Address>,
    /// Client-observed end
    pub ended: bool,
    /// Ledger-observed settlement
    pub settled: bool,
    /// Oldest first
    pub bids: Vec<Bid>,
    /// Opaque display payload
    #[serde(default)]
    pub tag: serde_json::Value,
}

impl AuctionSnapshot {
    /// Auction that exists on the ledger but has not received its first bid
    pub fn not_started(id: AuctionId, reserve_price: u128) -> Self {
        Self {
            id,
            start_time: 0,
            end_time: 0,
            reserve_price,
            amount: 0,
            bidder: None,
            ended: false,
            settled: false,
            bids: Vec::new(),
            tag: serde_json::Value::Null,
        }
    }

    pub fn has_started(&self) -> bool {
        self.start_time > 0
    }

    /// Most recent bid, if any
    pub fn highest_bid(&self) -> Option<&Bid> {
        self.bids.last()
    }

    /// Whether `address` currently holds the high bid
    pub fn is_bidder(&self, address: &Address) -> bool {
        self.bidder.as_ref() == Some(address)
    }

    /// Copy with `ended` set, keeping `settled ⇒ ended`
    pub fn with_ended(&self, ended: bool) -> Self {
        Self {
            ended: ended || self.settled,
            ..self.clone()
        }
    }
}

/// Global auction house settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuctionSettings {
    /// Integer percentage a new bid must exceed the current one by
    pub min_increment_bid_percentage: u32,
    pub reserve_price: u128,
    /// Seconds a late bid extends the auction by
    pub time_buffer: i64,
}

impl Default for AuctionSettings {
    fn default() -> Self {
        Self {
            min_increment_bid_percentage: 5,
            reserve_price: 0,
            time_buffer: 300,
        }
    }
}
