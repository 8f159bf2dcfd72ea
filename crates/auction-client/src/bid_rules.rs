//! Bid increment rules

use crate::error::BidError;
use crate::types::AuctionSnapshot;

/// Smallest bid the contract will accept next.
///
/// Before the first bid the reserve price is the floor. Afterwards a bid must
/// beat the current amount by `min_increment_bid_percentage` percent, rounded
/// down in integer arithmetic.
pub fn minimum_next_bid(snapshot: &AuctionSnapshot, min_increment_bid_percentage: u32) -> u128 {
    if !snapshot.has_started() {
        return snapshot.reserve_price;
    }

    debug_assert!(
        snapshot.amount > 0,
        "auction {} started with a zero high bid",
        snapshot.id
    );
    if snapshot.amount == 0 {
        tracing::error!("Auction {} started with a zero high bid", snapshot.id);
        return snapshot.reserve_price;
    }

    let increment = snapshot
        .amount
        .saturating_mul(u128::from(min_increment_bid_percentage))
        / 100;
    snapshot.amount.saturating_add(increment)
}

/// Accept `bid` if it meets the minimum and the auction still takes bids
pub fn validate_bid(
    snapshot: &AuctionSnapshot,
    min_increment_bid_percentage: u32,
    bid: u128,
) -> Result<(), BidError> {
    if snapshot.ended || snapshot.settled {
        return Err(BidError::AuctionClosed(snapshot.id));
    }

    let minimum = minimum_next_bid(snapshot, min_increment_bid_percentage);
    if bid < minimum {
        return Err(BidError::BelowMinimum { minimum, bid });
    }
    Ok(())
}
