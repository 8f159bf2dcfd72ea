//! Error types for the auction client

use thiserror::Error;

use crate::types::AuctionId;

/// Main client error type
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Bid rejected: {0}")]
    Bid(#[from] BidError),

    #[error("Step error: {0}")]
    Step(#[from] StepError),

    #[error("Auction not found: {0}")]
    AuctionNotFound(AuctionId),

    #[error("Auction {0} is already settled")]
    AlreadySettled(AuctionId),

    #[error("No active account; wallet is disconnected")]
    WalletUnavailable,
}

/// Read-query service errors
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    #[error("HTTP {status}: {status_text}")]
    Status { status: u16, status_text: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Write-surface rejection. The message is kept verbatim for display.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SubmissionError {
    pub message: String,
}

impl SubmissionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Bid validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BidError {
    #[error("bid {bid} is below the minimum of {minimum}")]
    BelowMinimum { minimum: u128, bid: u128 },

    #[error("auction {0} is closed for bidding")]
    AuctionClosed(AuctionId),
}

/// Step navigation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("step index {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => QueryError::Status {
                status: status.as_u16(),
                status_text: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            },
            None => QueryError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Malformed(err.to_string())
    }
}
