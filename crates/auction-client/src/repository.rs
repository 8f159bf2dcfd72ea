//! Auction repository
//!
//! Holds every known auction as the last synchronized snapshot. The whole set
//! is swapped on each write (copy-on-write), so readers never observe a
//! half-applied update. Each held set carries a sequence number; fetched
//! batches older than the held set are refused, which keeps a slow poll from
//! overwriting a newer optimistic update.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::types::{AuctionId, AuctionSnapshot};

/// Immutable view of all known auctions
#[derive(Debug, Clone, Default)]
pub struct AuctionSet {
    sequence: u64,
    auctions: Vec<AuctionSnapshot>,
    index: HashMap<AuctionId, usize>,
}

impl AuctionSet {
    /// Duplicate ids collapse into one entry at the first position, holding
    /// the last snapshot
    fn new(sequence: u64, snapshots: Vec<AuctionSnapshot>) -> Self {
        let mut index = HashMap::with_capacity(snapshots.len());
        let mut auctions: Vec<AuctionSnapshot> = Vec::with_capacity(snapshots.len());
        for auction in snapshots {
            match index.get(&auction.id) {
                Some(&position) => {
                    warn!("Duplicate auction id {} in replacement; keeping the last", auction.id);
                    auctions[position] = auction;
                }
                None => {
                    index.insert(auction.id, auctions.len());
                    auctions.push(auction);
                }
            }
        }
        Self {
            sequence,
            auctions,
            index,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn get(&self, id: AuctionId) -> Option<&AuctionSnapshot> {
        self.index.get(&id).map(|&position| &self.auctions[position])
    }

    pub fn auctions(&self) -> &[AuctionSnapshot] {
        &self.auctions
    }

    pub fn max_id(&self) -> Option<AuctionId> {
        self.index.keys().copied().max()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Result of a replacement attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Applied { sequence: u64 },
    /// Empty batch while auctions are held
    IgnoredEmpty,
    /// Batch older than the held set
    Stale { sequence: u64, held: u64 },
}

impl ReplaceOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ReplaceOutcome::Applied { .. })
    }
}

/// Sole owner of auction snapshot storage
pub struct AuctionRepository {
    state: watch::Sender<Arc<AuctionSet>>,
    next_sequence: AtomicU64,
}

impl Default for AuctionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl AuctionRepository {
    pub fn new() -> Self {
        let (state, _) = watch::channel(Arc::new(AuctionSet::default()));
        Self {
            state,
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Look up a snapshot by id
    pub fn find_by_id(&self, id: AuctionId) -> Option<AuctionSnapshot> {
        self.state.borrow().get(id).cloned()
    }

    /// Current set; cheap to clone and never mutated
    pub fn all(&self) -> Arc<AuctionSet> {
        Arc::clone(&*self.state.borrow())
    }

    pub fn max_id(&self) -> Option<AuctionId> {
        self.state.borrow().max_id()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// Receiver notified after every applied replacement
    pub fn subscribe(&self) -> watch::Receiver<Arc<AuctionSet>> {
        self.state.subscribe()
    }

    /// Reserve a sequence number before issuing a fetch. The result must be
    /// handed to [`apply_fetched`](Self::apply_fetched).
    pub fn begin_fetch(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Swap in a full, already merged set of snapshots
    pub fn replace_all(&self, snapshots: Vec<AuctionSnapshot>) -> ReplaceOutcome {
        let sequence = self.begin_fetch();
        self.apply(sequence, snapshots)
    }

    /// Swap in a fetched batch unless a newer set is already held
    pub fn apply_fetched(&self, sequence: u64, snapshots: Vec<AuctionSnapshot>) -> ReplaceOutcome {
        self.apply(sequence, snapshots)
    }

    /// Copy-on-write update of a single auction. `f` sees the latest held
    /// snapshot and returns the replacement, or `None` to leave it as is.
    /// Returns the applied snapshot.
    pub fn update_auction<F>(&self, id: AuctionId, f: F) -> Option<AuctionSnapshot>
    where
        F: FnOnce(&AuctionSnapshot) -> Option<AuctionSnapshot>,
    {
        let sequence = self.begin_fetch();
        let mut applied = None;
        self.state.send_if_modified(|current| {
            let Some(existing) = current.get(id) else {
                return false;
            };
            let Some(updated) = f(existing) else {
                return false;
            };

            let auctions = current
                .auctions()
                .iter()
                .map(|auction| if auction.id == id { updated.clone() } else { auction.clone() })
                .collect();
            *current = Arc::new(AuctionSet::new(sequence.max(current.sequence()), auctions));
            applied = Some(updated);
            true
        });
        applied
    }

    fn apply(&self, sequence: u64, snapshots: Vec<AuctionSnapshot>) -> ReplaceOutcome {
        let mut outcome = ReplaceOutcome::IgnoredEmpty;
        self.state.send_if_modified(|current| {
            if sequence < current.sequence() {
                outcome = ReplaceOutcome::Stale {
                    sequence,
                    held: current.sequence(),
                };
                return false;
            }
            if snapshots.is_empty() && !current.is_empty() {
                return false;
            }
            *current = Arc::new(AuctionSet::new(sequence, snapshots));
            outcome = ReplaceOutcome::Applied { sequence };
            true
        });

        match outcome {
            ReplaceOutcome::Applied { sequence } => {
                debug!("Applied auction set #{} ({} auctions)", sequence, self.len());
            }
            ReplaceOutcome::IgnoredEmpty => {
                warn!("Ignoring empty auction batch #{}; keeping {} held auctions", sequence, self.len());
            }
            ReplaceOutcome::Stale { sequence, held } => {
                warn!("Refusing stale auction batch #{} (holding #{})", sequence, held);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: AuctionId, amount: u128) -> AuctionSnapshot {
        AuctionSnapshot {
            start_time: 100,
            end_time: 200,
            amount,
            ..AuctionSnapshot::not_started(id, 10)
        }
    }

    #[test]
    fn test_find_by_id() {
        let repo = AuctionRepository::new();
        assert!(repo.find_by_id(1).is_none());

        repo.replace_all(vec![snapshot(1, 50), snapshot(2, 70)]);
        assert_eq!(repo.find_by_id(2).unwrap().amount, 70);
        assert_eq!(repo.max_id(), Some(2));
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn test_duplicate_ids_collapse_to_last() {
        let repo = AuctionRepository::new();
        repo.replace_all(vec![snapshot(1, 50), snapshot(2, 60), snapshot(1, 80)]);

        let set = repo.all();
        assert_eq!(set.len(), 2);
        assert_eq!(set.auctions().len(), 2);
        assert_eq!(set.auctions()[0].amount, 80);
        assert_eq!(repo.find_by_id(1).unwrap().amount, 80);

        repo.update_auction(1, |s| Some(AuctionSnapshot { amount: 90, ..s.clone() }));
        let ids: Vec<_> = repo.all().auctions().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_empty_batch_keeps_existing_set() {
        let repo = AuctionRepository::new();
        repo.replace_all(vec![snapshot(1, 50)]);

        assert_eq!(repo.replace_all(vec![]), ReplaceOutcome::IgnoredEmpty);
        assert!(repo.find_by_id(1).is_some());
    }

    #[test]
    fn test_empty_batch_on_empty_repository_applies() {
        let repo = AuctionRepository::new();
        assert!(repo.replace_all(vec![]).is_applied());
    }

    #[test]
    fn test_stale_fetch_refused_after_local_update() {
        let repo = AuctionRepository::new();
        repo.replace_all(vec![snapshot(1, 50)]);

        // Poll issued before the optimistic update lands afterwards
        let poll_sequence = repo.begin_fetch();
        repo.update_auction(1, |s| Some(s.with_ended(true)));

        let outcome = repo.apply_fetched(poll_sequence, vec![snapshot(1, 50)]);
        assert!(matches!(outcome, ReplaceOutcome::Stale { .. }));
        assert!(repo.find_by_id(1).unwrap().ended);
    }

    #[test]
    fn test_update_auction_is_copy_on_write() {
        let repo = AuctionRepository::new();
        repo.replace_all(vec![snapshot(1, 50), snapshot(2, 60)]);
        let before = repo.all();

        let updated = repo.update_auction(2, |s| Some(AuctionSnapshot { amount: 90, ..s.clone() }));

        assert_eq!(updated.unwrap().amount, 90);
        assert_eq!(before.get(2).unwrap().amount, 60);
        assert_eq!(repo.find_by_id(2).unwrap().amount, 90);
        assert_eq!(repo.find_by_id(1).unwrap().amount, 50);
    }

    #[test]
    fn test_update_auction_declined() {
        let repo = AuctionRepository::new();
        repo.replace_all(vec![snapshot(1, 50)]);
        let sequence = repo.all().sequence();

        assert!(repo.update_auction(1, |_| None).is_none());
        assert!(repo.update_auction(9, |s| Some(s.clone())).is_none());
        assert_eq!(repo.all().sequence(), sequence);
    }

    #[tokio::test]
    async fn test_subscribers_notified_on_replace() {
        let repo = AuctionRepository::new();
        let mut rx = repo.subscribe();

        repo.replace_all(vec![snapshot(5, 1)]);

        rx.changed().await.unwrap();
        assert!(rx.borrow().get(5).is_some());
    }
}
