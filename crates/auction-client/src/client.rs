//! Auction client
//!
//! Wires the repository, ledger clock, synchronizer and transaction flow
//! together behind the operations a front end needs.

use std::sync::Arc;
use tracing::{info, warn};

use crate::bid_rules;
use crate::clock::{BackgroundTask, ClockReconciler, LocalClock};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::lifecycle::{LifecycleEngine, LifecycleHandle};
use crate::navigation::{self, Navigation};
use crate::query::AuctionQuery;
use crate::repository::AuctionRepository;
use crate::sync::AuctionSynchronizer;
use crate::transaction::{TransactionFlow, TransactionId, TransactionKind, TransactionRecord};
use crate::types::{Address, AuctionId, AuctionSnapshot};
use crate::wallet::{Account, AccountProvider, ContractCall, WriteSurface};

/// Handles for the clock refresh and auction poll tasks
pub struct BackgroundTasks {
    pub clock: BackgroundTask,
    pub sync: BackgroundTask,
}

pub struct AuctionClient {
    config: ClientConfig,
    repository: Arc<AuctionRepository>,
    clock: Arc<ClockReconciler>,
    synchronizer: Arc<AuctionSynchronizer>,
    transactions: Arc<TransactionFlow>,
    writer: Arc<dyn WriteSurface>,
    accounts: Arc<dyn AccountProvider>,
}

impl AuctionClient {
    pub fn new(
        config: ClientConfig,
        query: Arc<dyn AuctionQuery>,
        writer: Arc<dyn WriteSurface>,
        accounts: Arc<dyn AccountProvider>,
        local_clock: Arc<dyn LocalClock>,
    ) -> Self {
        let repository = Arc::new(AuctionRepository::new());
        let clock = Arc::new(ClockReconciler::new(local_clock, Arc::clone(&query)));
        let synchronizer = Arc::new(AuctionSynchronizer::new(
            query,
            Arc::clone(&repository),
            config.query.page_size,
        ));

        Self {
            config,
            repository,
            clock,
            synchronizer,
            transactions: Arc::new(TransactionFlow::new()),
            writer,
            accounts,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<AuctionRepository> {
        &self.repository
    }

    pub fn clock(&self) -> &Arc<ClockReconciler> {
        &self.clock
    }

    pub fn synchronizer(&self) -> &Arc<AuctionSynchronizer> {
        &self.synchronizer
    }

    pub fn transactions(&self) -> &Arc<TransactionFlow> {
        &self.transactions
    }

    pub fn current_ledger_time(&self) -> i64 {
        self.clock.current_ledger_time()
    }

    /// Refresh the clock and poll once; used before the first render.
    /// Returns whether the poll succeeded. A failure is logged and left to
    /// the background poll to recover.
    pub async fn initial_sync(&self) -> bool {
        let (synced, outcome) = futures::join!(self.clock.refresh(), self.synchronizer.poll_once());
        if !synced {
            warn!("Initial clock refresh failed; using local time");
        }
        match outcome {
            Ok(outcome) => {
                info!("Initial sync: {:?}, {} auctions", outcome, self.repository.len());
                true
            }
            Err(e) => {
                warn!("Initial auction poll failed, waiting for background sync: {}", e);
                false
            }
        }
    }

    /// Spawn the clock refresh and auction poll loops
    pub fn start_background(&self) -> BackgroundTasks {
        let polling = &self.config.polling;
        BackgroundTasks {
            clock: self.clock.spawn_refresh(polling.clock_refresh()),
            sync: self.synchronizer.spawn(polling.auction_poll()),
        }
    }

    pub fn auction(&self, auction_id: AuctionId) -> ClientResult<AuctionSnapshot> {
        self.repository
            .find_by_id(auction_id)
            .ok_or(ClientError::AuctionNotFound(auction_id))
    }

    /// Increment percentage from fetched settings, else the configured fallback
    pub fn min_increment_bid_percentage(&self) -> u32 {
        self.synchronizer
            .settings()
            .map(|s| s.min_increment_bid_percentage)
            .unwrap_or(self.config.auction.fallback_min_increment_bid_percentage)
    }

    pub fn minimum_next_bid(&self, auction_id: AuctionId) -> ClientResult<u128> {
        let snapshot = self.auction(auction_id)?;
        Ok(bid_rules::minimum_next_bid(&snapshot, self.min_increment_bid_percentage()))
    }

    /// Neighbours of `current_id` among the held auctions
    pub fn navigation(&self, current_id: AuctionId) -> Navigation {
        let max_id = self.repository.max_id().unwrap_or(current_id);
        navigation::resolve(current_id, max_id)
    }

    pub fn active_account(&self) -> ClientResult<Account> {
        self.accounts.active_account().ok_or(ClientError::WalletUnavailable)
    }

    /// Validate and submit a bid. Validation failures return before anything
    /// is tracked; submission failures are reported on the returned record.
    pub async fn place_bid(&self, auction_id: AuctionId, amount: u128) -> ClientResult<TransactionRecord> {
        let account = self.active_account()?;
        let snapshot = self.auction(auction_id)?;
        bid_rules::validate_bid(&snapshot, self.min_increment_bid_percentage(), amount)?;

        info!("{} bidding {} on auction {}", account.address, amount, auction_id);
        let call = ContractCall::Bid { auction_id, amount };
        Ok(self
            .submit(TransactionId::for_auction(TransactionKind::Bid, auction_id), TransactionKind::Bid, call)
            .await)
    }

    pub async fn settle(&self, auction_id: AuctionId) -> ClientResult<TransactionRecord> {
        self.active_account()?;
        let snapshot = self.auction(auction_id)?;
        if snapshot.settled {
            return Err(ClientError::AlreadySettled(auction_id));
        }

        let call = ContractCall::Settle { auction_id };
        Ok(self
            .submit(
                TransactionId::for_auction(TransactionKind::Settle, auction_id),
                TransactionKind::Settle,
                call,
            )
            .await)
    }

    pub async fn add_relayer(&self, address: Address) -> ClientResult<TransactionRecord> {
        self.active_account()?;
        let id = TransactionId::new(format!("{}-{}", TransactionKind::AddRelayer.slug(), address));
        Ok(self
            .submit(id, TransactionKind::AddRelayer, ContractCall::AddRelayer { address })
            .await)
    }

    pub async fn remove_relayer(&self, address: Address) -> ClientResult<TransactionRecord> {
        self.active_account()?;
        let id = TransactionId::new(format!("{}-{}", TransactionKind::RemoveRelayer.slug(), address));
        Ok(self
            .submit(id, TransactionKind::RemoveRelayer, ContractCall::RemoveRelayer { address })
            .await)
    }

    pub async fn create_tag(&self, tag: String, target_uri: String) -> ClientResult<TransactionRecord> {
        self.active_account()?;
        let id = TransactionId::new(format!("{}-{}", TransactionKind::CreateTag.slug(), tag));
        Ok(self
            .submit(id, TransactionKind::CreateTag, ContractCall::CreateTag { tag, target_uri })
            .await)
    }

    /// Start the lifecycle of a displayed auction
    pub fn watch_auction(&self, auction_id: AuctionId) -> LifecycleHandle {
        let engine = Arc::new(LifecycleEngine::new(
            auction_id,
            Arc::clone(&self.repository),
            Arc::clone(&self.clock),
            Arc::clone(&self.transactions),
            Arc::clone(&self.writer),
            Arc::clone(&self.accounts),
            self.config.auction.end_strategy,
        ));
        engine.spawn(self.config.polling.lifecycle_tick())
    }

    async fn submit(&self, id: TransactionId, kind: TransactionKind, call: ContractCall) -> TransactionRecord {
        self.transactions
            .initiate_transaction(id, kind, self.writer.submit(call))
            .await
    }
}
