//! Client for the indexed read-query service
//!
//! The service speaks GraphQL over HTTP. Big integers arrive as decimal
//! strings and are parsed into native integers here, so nothing past this
//! module sees the wire format.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::QueryError;
use crate::types::{Address, AuctionSettings, AuctionSnapshot, Bid};

/// Read port over the indexed query service
#[async_trait]
pub trait AuctionQuery: Send + Sync {
    /// Most recent auctions, newest first
    async fn fetch_auctions(&self, first: u32) -> Result<Vec<AuctionSnapshot>, QueryError>;

    /// Global auction house settings
    async fn fetch_settings(&self) -> Result<AuctionSettings, QueryError>;

    /// Timestamp of the latest indexed block
    async fn latest_ledger_timestamp(&self) -> Result<i64, QueryError>;
}

const AUCTIONS_QUERY: &str = r#"
query Auctions($first: Int!) {
  auctions(orderBy: startTime, orderDirection: desc, first: $first) {
    id
    amount
    settled
    startTime
    endTime
    bidder { id }
    tag
    bids(orderBy: blockTimestamp, orderDirection: asc) {
      amount
      blockTimestamp
      bidder { id }
    }
  }
}
"#;

const SETTINGS_QUERY: &str = r#"
query Settings {
  auctionHouse(id: "global") {
    reservePrice
    minBidIncrementPercentage
    timeBuffer
  }
}
"#;

const LEDGER_TIME_QUERY: &str = r#"
query LedgerTime {
  _meta { block { timestamp } }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AccountRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBid {
    amount: String,
    block_timestamp: String,
    bidder: AccountRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAuction {
    id: String,
    amount: String,
    settled: bool,
    start_time: String,
    end_time: String,
    bidder: Option<AccountRef>,
    #[serde(default)]
    tag: Value,
    #[serde(default)]
    bids: Vec<WireBid>,
}

#[derive(Debug, Deserialize)]
struct AuctionsData {
    auctions: Vec<WireAuction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSettings {
    reserve_price: String,
    min_bid_increment_percentage: String,
    time_buffer: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsData {
    auction_house: Option<WireSettings>,
}

#[derive(Debug, Deserialize)]
struct MetaBlock {
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct Meta {
    block: MetaBlock,
}

#[derive(Debug, Deserialize)]
struct MetaData {
    #[serde(rename = "_meta")]
    meta: Meta,
}

fn parse_int<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, QueryError> {
    value
        .parse()
        .map_err(|_| QueryError::Malformed(format!("{} is not an integer: {:?}", field, value)))
}

impl WireAuction {
    fn into_snapshot(self) -> Result<AuctionSnapshot, QueryError> {
        let bids = self
            .bids
            .into_iter()
            .map(|bid| {
                Ok(Bid {
                    bidder: Address::new(bid.bidder.id),
                    amount: parse_int("bid.amount", &bid.amount)?,
                    timestamp: parse_int("bid.blockTimestamp", &bid.block_timestamp)?,
                })
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        let settled = self.settled;
        Ok(AuctionSnapshot {
            id: parse_int("auction.id", &self.id)?,
            start_time: parse_int("auction.startTime", &self.start_time)?,
            end_time: parse_int("auction.endTime", &self.end_time)?,
            reserve_price: 0,
            amount: parse_int("auction.amount", &self.amount)?,
            bidder: self.bidder.map(|b| Address::new(b.id)),
            ended: settled,
            settled,
            bids,
            tag: self.tag,
        })
    }
}

/// GraphQL client for the read-query service
pub struct GraphQlQueryClient {
    endpoint: String,
    http: reqwest::Client,
}

impl GraphQlQueryClient {
    pub fn new(config: &QueryConfig) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, QueryError> {
        let body = json!({ "query": query, "variables": variables });
        debug!("Query request to {}", self.endpoint);

        let response = self.http.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("unknown status").to_string(),
            });
        }

        let text = response.text().await?;
        decode_response(&text)
    }
}

fn decode_response<T: DeserializeOwned>(text: &str) -> Result<T, QueryError> {
    let response: GraphQlResponse<T> = serde_json::from_str(text)?;
    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(QueryError::GraphQl(messages.join("; ")));
    }
    response
        .data
        .ok_or_else(|| QueryError::Malformed("response has no data".to_string()))
}

#[async_trait]
impl AuctionQuery for GraphQlQueryClient {
    async fn fetch_auctions(&self, first: u32) -> Result<Vec<AuctionSnapshot>, QueryError> {
        let data: AuctionsData = self.call(AUCTIONS_QUERY, json!({ "first": first })).await?;
        data.auctions.into_iter().map(WireAuction::into_snapshot).collect()
    }

    async fn fetch_settings(&self) -> Result<AuctionSettings, QueryError> {
        let data: SettingsData = self.call(SETTINGS_QUERY, json!({})).await?;
        let settings = data
            .auction_house
            .ok_or_else(|| QueryError::Malformed("auction house settings missing".to_string()))?;

        Ok(AuctionSettings {
            min_increment_bid_percentage: parse_int(
                "minBidIncrementPercentage",
                &settings.min_bid_increment_percentage,
            )?,
            reserve_price: parse_int("reservePrice", &settings.reserve_price)?,
            time_buffer: parse_int("timeBuffer", &settings.time_buffer)?,
        })
    }

    async fn latest_ledger_timestamp(&self) -> Result<i64, QueryError> {
        let data: MetaData = self.call(LEDGER_TIME_QUERY, json!({})).await?;
        Ok(data.meta.block.timestamp)
    }
}
