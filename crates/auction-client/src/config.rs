//! Configuration for the auction client

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use validator::Validate;

use crate::lifecycle::EndStrategy;

/// Client configuration loaded from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct ClientConfig {
    #[validate]
    pub query: QueryConfig,
    #[validate]
    pub polling: PollingConfig,
    #[validate]
    pub auction: AuctionConfig,
    pub monitoring: MonitoringConfig,
}

/// Indexed read-query service
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct QueryConfig {
    #[validate(url)]
    pub endpoint: String,
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,
    /// Number of auctions fetched per poll
    #[validate(range(min = 1, max = 1000))]
    pub page_size: u32,
}

/// Polling cadence, configurable per deployment
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PollingConfig {
    /// Ledger clock reconciliation interval
    #[validate(range(min = 10, max = 600_000))]
    pub clock_refresh_ms: u64,
    /// Countdown tick of a displayed auction
    #[validate(range(min = 10, max = 60_000))]
    pub lifecycle_tick_ms: u64,
    /// Auction list refresh from the read service
    #[validate(range(min = 10, max = 600_000))]
    pub auction_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AuctionConfig {
    /// Used until global settings have been fetched
    #[validate(range(max = 1000))]
    pub fallback_min_increment_bid_percentage: u32,
    /// What happens when a displayed auction runs out of time
    pub end_strategy: EndStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub structured_logging: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/subgraphs/name/auction-house".to_string(),
            request_timeout_secs: 30,
            page_size: 100,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            clock_refresh_ms: 5_000,
            lifecycle_tick_ms: 1_000,
            auction_poll_ms: 10_000,
        }
    }
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            fallback_min_increment_bid_percentage: 2,
            end_strategy: EndStrategy::MarkEnded,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            structured_logging: false,
        }
    }
}

impl PollingConfig {
    pub fn clock_refresh(&self) -> Duration {
        Duration::from_millis(self.clock_refresh_ms)
    }

    pub fn lifecycle_tick(&self) -> Duration {
        Duration::from_millis(self.lifecycle_tick_ms)
    }

    pub fn auction_poll(&self) -> Duration {
        Duration::from_millis(self.auction_poll_ms)
    }
}

impl ClientConfig {
    /// Load configuration from file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path, e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .map_err(|e| anyhow::anyhow!("Failed to write config file {}: {}", path, e))?;
        Ok(())
    }

    /// Validate field ranges and cross-field rules
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)?;

        if self.query.endpoint.is_empty() {
            return Err(anyhow::anyhow!("Query endpoint cannot be empty"));
        }
        // The countdown must tick at least as often as the clock refreshes,
        // otherwise the displayed time jumps by more than one refresh.
        if self.polling.lifecycle_tick_ms > self.polling.clock_refresh_ms {
            return Err(anyhow::anyhow!(
                "lifecycle_tick_ms ({}) must not exceed clock_refresh_ms ({})",
                self.polling.lifecycle_tick_ms,
                self.polling.clock_refresh_ms
            ));
        }
        Ok(())
    }
}

/// Create example configuration file
pub fn create_example_config(path: &str) -> Result<()> {
    let example = ClientConfig {
        query: QueryConfig {
            endpoint: "https://api.example.org/subgraphs/name/auction-house".to_string(),
            ..QueryConfig::default()
        },
        auction: AuctionConfig {
            end_strategy: EndStrategy::Settle,
            ..AuctionConfig::default()
        },
        ..ClientConfig::default()
    };

    example.save(path)
}
