//! Auction lifecycle engine
//!
//! The phase of an auction is never stored. It is derived on every tick from
//! the latest repository snapshot and the reconciled ledger clock. The only
//! side effect a tick can have is the end transition, which runs at most
//! once per engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::{BackgroundTask, ClockReconciler};
use crate::repository::AuctionRepository;
use crate::transaction::{TransactionFlow, TransactionId, TransactionKind, TransactionRecord};
use crate::types::{AuctionId, AuctionSnapshot};
use crate::wallet::{AccountProvider, ContractCall, WriteSurface};

/// What the engine does when a displayed auction runs out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndStrategy {
    /// Only mark the auction ended locally; settlement is left to the user
    MarkEnded,
    /// Mark ended and submit a settlement
    Settle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionPhase {
    NotStarted,
    Active,
    ExpiredPendingEnd,
    EndedUnsettled,
    Settled,
}

impl AuctionPhase {
    pub fn is_ended(&self) -> bool {
        matches!(self, AuctionPhase::EndedUnsettled | AuctionPhase::Settled)
    }
}

impl fmt::Display for AuctionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuctionPhase::NotStarted => "not started",
            AuctionPhase::Active => "active",
            AuctionPhase::ExpiredPendingEnd => "expired, pending end",
            AuctionPhase::EndedUnsettled => "ended, unsettled",
            AuctionPhase::Settled => "settled",
        };
        f.write_str(name)
    }
}

/// Phase of `snapshot` at ledger time `now`
pub fn derive_phase(snapshot: &AuctionSnapshot, now: i64) -> AuctionPhase {
    if snapshot.settled {
        return AuctionPhase::Settled;
    }
    if !snapshot.has_started() {
        if snapshot.ended {
            error!("Auction {} is marked ended but never started", snapshot.id);
        }
        return AuctionPhase::NotStarted;
    }
    if snapshot.ended {
        return AuctionPhase::EndedUnsettled;
    }
    if now > snapshot.end_time {
        AuctionPhase::ExpiredPendingEnd
    } else {
        AuctionPhase::Active
    }
}

/// Seconds until the auction ends, never negative
pub fn time_left(snapshot: &AuctionSnapshot, now: i64) -> i64 {
    if !snapshot.has_started() {
        return 0;
    }
    (snapshot.end_time - now).max(0)
}

/// Countdown split for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Countdown {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    pub fn from_seconds(total: i64) -> Self {
        let total = total.max(0);
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {:02}m {:02}s", self.hours, self.minutes, self.seconds)
    }
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickOutcome {
    pub auction_id: AuctionId,
    pub now: i64,
    pub phase: AuctionPhase,
    pub time_left: i64,
    pub countdown: Countdown,
    /// This tick ran the end transition
    pub end_triggered: bool,
}

const END_IDLE: u8 = 0;
const END_IN_FLIGHT: u8 = 1;
const END_DONE: u8 = 2;
const END_FAILED: u8 = 3;

/// Controller for one displayed auction
pub struct LifecycleEngine {
    auction_id: AuctionId,
    repository: Arc<AuctionRepository>,
    clock: Arc<ClockReconciler>,
    transactions: Arc<TransactionFlow>,
    writer: Arc<dyn WriteSurface>,
    accounts: Arc<dyn AccountProvider>,
    strategy: EndStrategy,
    end_state: AtomicU8,
    /// End time last shown; UI-only, never written back
    displayed_end_time: AtomicI64,
}

impl LifecycleEngine {
    pub fn new(
        auction_id: AuctionId,
        repository: Arc<AuctionRepository>,
        clock: Arc<ClockReconciler>,
        transactions: Arc<TransactionFlow>,
        writer: Arc<dyn WriteSurface>,
        accounts: Arc<dyn AccountProvider>,
        strategy: EndStrategy,
    ) -> Self {
        Self {
            auction_id,
            repository,
            clock,
            transactions,
            writer,
            accounts,
            strategy,
            end_state: AtomicU8::new(END_IDLE),
            displayed_end_time: AtomicI64::new(0),
        }
    }

    pub fn auction_id(&self) -> AuctionId {
        self.auction_id
    }

    pub fn displayed_end_time(&self) -> i64 {
        self.displayed_end_time.load(Ordering::SeqCst)
    }

    /// Id under which the settlement is tracked
    pub fn settlement_id(&self) -> TransactionId {
        TransactionId::for_auction(TransactionKind::Settle, self.auction_id)
    }

    /// Whether the last end transition failed and awaits a user retry
    pub fn end_failed(&self) -> bool {
        self.end_state.load(Ordering::SeqCst) == END_FAILED
    }

    /// Evaluate the auction once. Returns `None` while the auction is unknown
    /// to the repository.
    pub async fn tick(&self) -> Option<TickOutcome> {
        let now = self.clock.current_ledger_time();
        let snapshot = self.repository.find_by_id(self.auction_id)?;
        self.displayed_end_time.store(snapshot.end_time, Ordering::SeqCst);

        let mut end_triggered = false;
        if snapshot.has_started() && now > snapshot.end_time && !snapshot.ended {
            if self
                .end_state
                .compare_exchange(END_IDLE, END_IN_FLIGHT, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                end_triggered = self.end_transition(now).await;
            }
        }

        let latest = self.repository.find_by_id(self.auction_id).unwrap_or(snapshot);
        let remaining = time_left(&latest, now);
        let outcome = TickOutcome {
            auction_id: self.auction_id,
            now,
            phase: derive_phase(&latest, now),
            time_left: remaining,
            countdown: Countdown::from_seconds(remaining),
            end_triggered,
        };
        debug!(
            "Auction {} tick: phase={}, time_left={}s",
            self.auction_id, outcome.phase, outcome.time_left
        );
        Some(outcome)
    }

    /// Re-run a failed end transition; user initiated
    pub async fn retry_end(&self) -> bool {
        if self
            .end_state
            .compare_exchange(END_FAILED, END_IN_FLIGHT, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        let now = self.clock.current_ledger_time();
        self.end_transition(now).await
    }

    /// Caller holds the in-flight guard
    async fn end_transition(&self, now: i64) -> bool {
        // Re-check against the repository, not the snapshot this tick started with
        let marked = self.repository.update_auction(self.auction_id, |latest| {
            if latest.ended || !latest.has_started() || now <= latest.end_time {
                None
            } else {
                Some(latest.with_ended(true))
            }
        });
        if marked.is_none() {
            debug!("Auction {} already ended; skipping end transition", self.auction_id);
            self.end_state.store(END_DONE, Ordering::SeqCst);
            return false;
        }
        info!("Auction {} ended at ledger time {}", self.auction_id, now);

        match self.strategy {
            EndStrategy::MarkEnded => {
                self.end_state.store(END_DONE, Ordering::SeqCst);
            }
            EndStrategy::Settle if self.accounts.active_account().is_none() => {
                debug!("No wallet connected; auction {} marked ended without settling", self.auction_id);
                self.end_state.store(END_DONE, Ordering::SeqCst);
            }
            EndStrategy::Settle => {
                let record = self.submit_settlement().await;
                if record.is_error {
                    self.revert_end();
                    self.end_state.store(END_FAILED, Ordering::SeqCst);
                } else {
                    self.end_state.store(END_DONE, Ordering::SeqCst);
                }
            }
        }
        true
    }

    async fn submit_settlement(&self) -> TransactionRecord {
        let call = ContractCall::Settle {
            auction_id: self.auction_id,
        };
        self.transactions
            .initiate_transaction(self.settlement_id(), TransactionKind::Settle, self.writer.submit(call))
            .await
    }

    fn revert_end(&self) {
        let reverted = self.repository.update_auction(self.auction_id, |latest| {
            (latest.ended && !latest.settled).then(|| latest.with_ended(false))
        });
        if reverted.is_some() {
            warn!("Settlement of auction {} failed; end reverted", self.auction_id);
        }
    }

    /// Tick on `interval` until dropped. Ticking pauses while the auction is
    /// ended and resumes if the read service reports it running again, e.g.
    /// after a late bid extended it.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> LifecycleHandle {
        let (outcomes_tx, outcomes) = watch::channel(None);
        let engine = Arc::clone(&self);
        let mut auctions = self.repository.subscribe();

        let handle = tokio::spawn(async move {
            let mut timer = time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                let Some(outcome) = engine.tick().await else {
                    continue;
                };
                let phase = outcome.phase;
                outcomes_tx.send_replace(Some(outcome));

                if phase == AuctionPhase::Settled {
                    info!("Auction {} settled; stopping lifecycle", engine.auction_id);
                    return;
                }
                if !phase.is_ended() {
                    continue;
                }

                debug!("Auction {} ended; countdown paused", engine.auction_id);
                loop {
                    if auctions.changed().await.is_err() {
                        return;
                    }
                    let (resumed, settled) = auctions
                        .borrow_and_update()
                        .get(engine.auction_id)
                        .map_or((false, false), |s| (!s.ended, s.settled));
                    if settled {
                        if let Some(outcome) = engine.tick().await {
                            outcomes_tx.send_replace(Some(outcome));
                        }
                        info!("Auction {} settled; stopping lifecycle", engine.auction_id);
                        return;
                    }
                    if resumed {
                        break;
                    }
                }
                info!("Auction {} running again; countdown resumed", engine.auction_id);
                engine
                    .end_state
                    .compare_exchange(END_DONE, END_IDLE, Ordering::SeqCst, Ordering::SeqCst)
                    .ok();
                timer.reset();
            }
        });

        LifecycleHandle {
            engine: self,
            outcomes,
            task: BackgroundTask::new("auction-lifecycle", handle),
        }
    }
}

/// Running lifecycle of one displayed auction; dropping it stops the timer
pub struct LifecycleHandle {
    engine: Arc<LifecycleEngine>,
    outcomes: watch::Receiver<Option<TickOutcome>>,
    task: BackgroundTask,
}

impl LifecycleHandle {
    pub fn engine(&self) -> &Arc<LifecycleEngine> {
        &self.engine
    }

    pub fn latest(&self) -> Option<TickOutcome> {
        self.outcomes.borrow().clone()
    }

    /// Receiver of every published tick outcome
    pub fn outcomes(&self) -> watch::Receiver<Option<TickOutcome>> {
        self.outcomes.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the auction settles
    pub async fn join(self) {
        self.task.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{RecordingWriter, StaticQuery};
    use crate::types::Address;
    use crate::wallet::{Account, Disconnected, StaticAccount};

    fn running(end_time: i64) -> AuctionSnapshot {
        AuctionSnapshot {
            start_time: end_time - 100,
            end_time,
            amount: 10,
            ..AuctionSnapshot::not_started(4, 1)
        }
    }

    #[test]
    fn test_phase_not_started() {
        let snapshot = AuctionSnapshot::not_started(1, 10);
        assert_eq!(derive_phase(&snapshot, 5_000), AuctionPhase::NotStarted);
        assert_eq!(time_left(&snapshot, 5_000), 0);
    }

    #[test]
    fn test_phase_transitions_with_time() {
        let snapshot = running(1000);
        assert_eq!(derive_phase(&snapshot, 999), AuctionPhase::Active);
        assert_eq!(derive_phase(&snapshot, 1000), AuctionPhase::Active);
        assert_eq!(derive_phase(&snapshot, 1001), AuctionPhase::ExpiredPendingEnd);
    }

    #[test]
    fn test_phase_ended_and_settled() {
        let ended = running(1000).with_ended(true);
        assert_eq!(derive_phase(&ended, 900), AuctionPhase::EndedUnsettled);

        let settled = AuctionSnapshot {
            settled: true,
            ..ended
        };
        assert_eq!(derive_phase(&settled, 900), AuctionPhase::Settled);
    }

    #[test]
    fn test_ended_without_start_is_clamped() {
        let snapshot = AuctionSnapshot {
            ended: true,
            ..AuctionSnapshot::not_started(1, 10)
        };
        assert_eq!(derive_phase(&snapshot, 10), AuctionPhase::NotStarted);
    }

    #[test]
    fn test_time_left_never_negative() {
        let snapshot = running(1000);
        assert_eq!(time_left(&snapshot, 940), 60);
        assert_eq!(time_left(&snapshot, 1000), 0);
        assert_eq!(time_left(&snapshot, 5000), 0);
    }

    #[test]
    fn test_countdown_split() {
        let countdown = Countdown::from_seconds(3 * 3600 + 25 * 60 + 7);
        assert_eq!(
            countdown,
            Countdown {
                hours: 3,
                minutes: 25,
                seconds: 7
            }
        );
        assert_eq!(countdown.to_string(), "3h 25m 07s");
        assert_eq!(Countdown::from_seconds(-4), Countdown::default());
    }

    fn engine_at(now: i64, strategy: EndStrategy, writer: Arc<RecordingWriter>) -> LifecycleEngine {
        let account = StaticAccount(Account {
            address: Address::new("0xA11CE"),
            chain_id: 1,
        });
        engine_with(now, strategy, writer, Arc::new(account))
    }

    fn engine_with(
        now: i64,
        strategy: EndStrategy,
        writer: Arc<RecordingWriter>,
        accounts: Arc<dyn AccountProvider>,
    ) -> LifecycleEngine {
        let repository = Arc::new(AuctionRepository::new());
        repository.replace_all(vec![running(1000)]);
        let clock = Arc::new(ClockReconciler::new(
            Arc::new(ManualClock::new(now)),
            Arc::new(StaticQuery::default()),
        ));
        LifecycleEngine::new(
            4,
            repository,
            clock,
            Arc::new(TransactionFlow::new()),
            writer,
            accounts,
            strategy,
        )
    }

    #[tokio::test]
    async fn test_mark_ended_never_submits() {
        let writer = Arc::new(RecordingWriter::accepting("0x1"));
        let engine = engine_at(1001, EndStrategy::MarkEnded, writer.clone());

        assert!(engine.tick().await.unwrap().end_triggered);
        assert!(writer.calls().is_empty());
        assert!(engine.transactions.get(&engine.settlement_id()).is_none());
    }

    #[tokio::test]
    async fn test_settle_strategy_submits_once() {
        let writer = Arc::new(RecordingWriter::accepting("0x1"));
        let engine = engine_at(1001, EndStrategy::Settle, writer.clone());

        engine.tick().await;
        engine.tick().await;

        assert_eq!(writer.calls(), vec![ContractCall::Settle { auction_id: 4 }]);
        assert_eq!(engine.settlement_id().as_str(), "settle-4");
    }

    #[tokio::test]
    async fn test_settle_without_wallet_only_marks_ended() {
        let writer = Arc::new(RecordingWriter::accepting("0x1"));
        let engine = engine_with(1001, EndStrategy::Settle, writer.clone(), Arc::new(Disconnected));

        let outcome = engine.tick().await.unwrap();

        assert!(outcome.end_triggered);
        assert_eq!(outcome.phase, AuctionPhase::EndedUnsettled);
        assert!(writer.calls().is_empty());
        assert!(engine.transactions.get(&engine.settlement_id()).is_none());
        assert!(!engine.end_failed());
    }

    #[tokio::test]
    async fn test_retry_end_requires_failure() {
        let writer = Arc::new(RecordingWriter::rejecting("execution reverted"));
        let engine = engine_at(999, EndStrategy::Settle, writer.clone());

        assert!(!engine.retry_end().await);
        engine.tick().await;
        assert!(writer.calls().is_empty());
    }
}
