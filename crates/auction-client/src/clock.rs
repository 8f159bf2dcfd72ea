//! Ledger clock reconciliation
//!
//! Keeps the signed offset between the local wall clock and the timestamp of
//! the latest observed block, so ledger time can be read on every tick
//! without I/O.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::query::AuctionQuery;

/// Source of local wall-clock time in unix seconds
pub trait LocalClock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl LocalClock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock whose time is set explicitly; used by tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl LocalClock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Holds `local - ledger` and answers "what time is it on the ledger"
pub struct ClockReconciler {
    local: Arc<dyn LocalClock>,
    query: Arc<dyn AuctionQuery>,
    time_difference: AtomicI64,
    synced: AtomicBool,
}

impl ClockReconciler {
    pub fn new(local: Arc<dyn LocalClock>, query: Arc<dyn AuctionQuery>) -> Self {
        Self {
            local,
            query,
            time_difference: AtomicI64::new(0),
            synced: AtomicBool::new(false),
        }
    }

    /// Current ledger time in seconds. Never fails; may be stale by at most
    /// one refresh interval.
    pub fn current_ledger_time(&self) -> i64 {
        self.local.now() - self.time_difference()
    }

    pub fn time_difference(&self) -> i64 {
        self.time_difference.load(Ordering::SeqCst)
    }

    /// Whether at least one refresh has succeeded
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    /// Re-read the latest ledger timestamp. On failure the previous offset is
    /// kept and `false` is returned.
    pub async fn refresh(&self) -> bool {
        match self.query.latest_ledger_timestamp().await {
            Ok(ledger_time) => {
                let difference = self.local.now() - ledger_time;
                let previous = self.time_difference.swap(difference, Ordering::SeqCst);
                self.synced.store(true, Ordering::SeqCst);
                if previous != difference {
                    debug!("Clock offset updated: {}s -> {}s", previous, difference);
                }
                true
            }
            Err(e) => {
                warn!(
                    "Ledger time refresh failed, keeping offset {}s: {}",
                    self.time_difference(),
                    e
                );
                false
            }
        }
    }

    /// Refresh on a fixed interval until the returned handle is dropped
    pub fn spawn_refresh(self: &Arc<Self>, interval: Duration) -> BackgroundTask {
        let clock = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut timer = time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                clock.refresh().await;
            }
        });
        BackgroundTask::new("clock-refresh", handle)
    }
}

/// Owned background task, aborted when dropped
pub struct BackgroundTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    pub(crate) fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self {
            name,
            handle: Some(handle),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the task to finish on its own
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Background task {} failed: {}", self.name, e);
                }
            }
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                debug!("Stopping background task {}", self.name);
                handle.abort();
            }
        }
    }
}
