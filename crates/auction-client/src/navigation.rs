//! Previous/next auction navigation

use serde::Serialize;

use crate::types::AuctionId;

/// Neighbouring ids and boundary flags. `prev_id` is -1 on the first
/// auction; callers disable navigation through `is_first`/`is_last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub prev_id: i64,
    pub next_id: i64,
    pub is_first: bool,
    pub is_last: bool,
}

impl Navigation {
    /// Previous id when navigation backwards is allowed
    pub fn prev(&self) -> Option<AuctionId> {
        (!self.is_first).then(|| self.prev_id as AuctionId)
    }

    /// Next id when navigation forwards is allowed
    pub fn next(&self) -> Option<AuctionId> {
        (!self.is_last).then(|| self.next_id as AuctionId)
    }
}

pub fn resolve(current_id: AuctionId, max_id: AuctionId) -> Navigation {
    let current = current_id as i64;
    Navigation {
        prev_id: current - 1,
        next_id: current + 1,
        is_first: current_id == 0,
        is_last: current_id == max_id,
    }
}
