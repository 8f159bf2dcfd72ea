//! Periodic synchronization of the repository with the read-query service

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::BackgroundTask;
use crate::error::QueryError;
use crate::query::AuctionQuery;
use crate::repository::{AuctionRepository, AuctionSet, ReplaceOutcome};
use crate::types::{AuctionId, AuctionSettings, AuctionSnapshot};

/// Polls the read service and applies merged batches to the repository
pub struct AuctionSynchronizer {
    query: Arc<dyn AuctionQuery>,
    repository: Arc<AuctionRepository>,
    settings: watch::Sender<Option<AuctionSettings>>,
    page_size: u32,
}

impl AuctionSynchronizer {
    pub fn new(query: Arc<dyn AuctionQuery>, repository: Arc<AuctionRepository>, page_size: u32) -> Self {
        let (settings, _) = watch::channel(None);
        Self {
            query,
            repository,
            settings,
            page_size,
        }
    }

    /// Last fetched global settings
    pub fn settings(&self) -> Option<AuctionSettings> {
        *self.settings.borrow()
    }

    pub fn subscribe_settings(&self) -> watch::Receiver<Option<AuctionSettings>> {
        self.settings.subscribe()
    }

    /// Fetch once and apply. A failed fetch leaves the repository untouched.
    pub async fn poll_once(&self) -> Result<ReplaceOutcome, QueryError> {
        let sequence = self.repository.begin_fetch();

        match self.query.fetch_settings().await {
            Ok(settings) => {
                self.settings.send_replace(Some(settings));
            }
            Err(e) => warn!("Settings fetch failed, keeping previous settings: {}", e),
        }

        let fetched = self.query.fetch_auctions(self.page_size).await?;
        debug!("Fetched {} auctions (batch #{})", fetched.len(), sequence);

        let merged = merge(&self.repository.all(), fetched, self.settings());
        Ok(self.repository.apply_fetched(sequence, merged))
    }

    /// Poll on `interval` until the returned handle is dropped
    pub fn spawn(self: &Arc<Self>, interval: Duration) -> BackgroundTask {
        let sync = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut timer = time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut consecutive_failures = 0u32;
            loop {
                timer.tick().await;
                match sync.poll_once().await {
                    Ok(_) => {
                        if consecutive_failures > 0 {
                            info!("Auction sync recovered after {} failed polls", consecutive_failures);
                        }
                        consecutive_failures = 0;
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!("Auction sync failed ({} in a row), retrying next poll: {}", consecutive_failures, e);
                    }
                }
            }
        });
        BackgroundTask::new("auction-sync", handle)
    }
}

/// Combine a fetched batch with the held set.
///
/// Held auctions missing from the batch are kept. `ended` is client-observed:
/// it survives a poll only while the end time is unchanged, so a late bid
/// that extends the auction corrects an optimistic end.
pub fn merge(
    held: &AuctionSet,
    fetched: Vec<AuctionSnapshot>,
    settings: Option<AuctionSettings>,
) -> Vec<AuctionSnapshot> {
    let mut merged: BTreeMap<AuctionId, AuctionSnapshot> = held
        .auctions()
        .iter()
        .map(|auction| (auction.id, auction.clone()))
        .collect();

    for mut auction in fetched {
        let previous = held.get(auction.id);
        auction.reserve_price = match (settings, previous) {
            (Some(settings), _) => settings.reserve_price,
            (None, Some(previous)) => previous.reserve_price,
            (None, None) => auction.reserve_price,
        };
        let kept_end = previous.map_or(false, |p| p.ended && p.end_time == auction.end_time);
        auction.ended = auction.settled || kept_end;
        merged.insert(auction.id, auction);
    }

    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticQuery;

    fn fetched(id: AuctionId, end_time: i64) -> AuctionSnapshot {
        AuctionSnapshot {
            start_time: end_time - 86_400,
            end_time,
            amount: 100,
            ..AuctionSnapshot::not_started(id, 0)
        }
    }

    fn held_with(auctions: Vec<AuctionSnapshot>) -> Arc<AuctionSet> {
        let repo = AuctionRepository::new();
        repo.replace_all(auctions);
        repo.all()
    }

    #[test]
    fn test_merge_keeps_unfetched_auctions() {
        let held = held_with(vec![fetched(1, 1000), fetched(2, 2000)]);
        let merged = merge(&held, vec![fetched(2, 2000), fetched(3, 3000)], None);

        let ids: Vec<_> = merged.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_merge_applies_reserve_price_from_settings() {
        let held = held_with(vec![]);
        let settings = AuctionSettings {
            reserve_price: 77,
            ..AuctionSettings::default()
        };
        let merged = merge(&held, vec![fetched(1, 1000)], Some(settings));
        assert_eq!(merged[0].reserve_price, 77);
    }

    #[test]
    fn test_merge_preserves_optimistic_end_for_same_end_time() {
        let held = held_with(vec![fetched(1, 1000).with_ended(true)]);
        let merged = merge(&held, vec![fetched(1, 1000)], None);
        assert!(merged[0].ended);
    }

    #[test]
    fn test_merge_clears_end_when_auction_extended() {
        let held = held_with(vec![fetched(1, 1000).with_ended(true)]);
        let merged = merge(&held, vec![fetched(1, 1300)], None);
        assert!(!merged[0].ended);
    }

    #[test]
    fn test_merge_settled_implies_ended() {
        let held = held_with(vec![]);
        let settled = AuctionSnapshot {
            settled: true,
            ..fetched(1, 1000)
        };
        let merged = merge(&held, vec![settled], None);
        assert!(merged[0].ended);
    }

    #[tokio::test]
    async fn test_poll_once_applies_batch_and_settings() {
        let query = Arc::new(StaticQuery::default());
        query.set_auctions(Ok(vec![fetched(1, 1000), fetched(2, 2000)]));
        query.set_settings(Ok(AuctionSettings {
            min_increment_bid_percentage: 10,
            reserve_price: 5,
            time_buffer: 60,
        }));
        let repo = Arc::new(AuctionRepository::new());
        let sync = AuctionSynchronizer::new(query, repo.clone(), 50);

        assert!(sync.poll_once().await.unwrap().is_applied());
        assert_eq!(repo.len(), 2);
        assert_eq!(repo.find_by_id(1).unwrap().reserve_price, 5);
        assert_eq!(sync.settings().unwrap().min_increment_bid_percentage, 10);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_previous_set() {
        let query = Arc::new(StaticQuery::default());
        query.set_auctions(Ok(vec![fetched(1, 1000)]));
        let repo = Arc::new(AuctionRepository::new());
        let sync = AuctionSynchronizer::new(query.clone(), repo.clone(), 50);
        sync.poll_once().await.unwrap();

        query.set_auctions(Err(QueryError::Transport("connection reset".to_string())));
        query.set_settings(Err(QueryError::GraphQl("indexer behind".to_string())));

        assert!(sync.poll_once().await.is_err());
        assert!(repo.find_by_id(1).is_some());
        assert!(sync.settings().is_some());
    }
}
