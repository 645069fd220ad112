//! Priority lanes.
//!
//! Every update carries exactly one lane bit; a root accumulates the union of
//! its pending lanes. Lower bits are higher priority. Only [`Lanes::SYNC`] is
//! requested today, the remaining bits exist so scheduling decisions are
//! expressed as set operations instead of special cases.

use bitflags::bitflags;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Lanes: u32 {
        const SYNC = 0b0000_0010;
        const INPUT_CONTINUOUS = 0b0000_1000;
        const DEFAULT = 0b0010_0000;
        const IDLE = 0b0100_0000_0000_0000_0000_0000_0000_0000;
    }
}

/// A single lane bit.
pub type Lane = Lanes;

pub const NO_LANES: Lanes = Lanes::empty();
pub const NO_LANE: Lane = Lanes::empty();
pub const SYNC_LANE: Lane = Lanes::SYNC;

pub fn merge_lanes(a: Lanes, b: Lanes) -> Lanes {
    a | b
}

/// Lane for an update requested right now. Every update is synchronous.
pub fn request_update_lane() -> Lane {
    SYNC_LANE
}

/// Isolates the lowest set bit, which is the highest priority lane.
pub fn get_highest_priority_lane(lanes: Lanes) -> Lane {
    let bits = lanes.bits();
    Lanes::from_bits_retain(bits & bits.wrapping_neg())
}

/// Picks the lanes the next render pass should process.
pub fn get_next_lanes(pending: Lanes) -> Lanes {
    get_highest_priority_lane(pending)
}

pub fn includes_some_lane(set: Lanes, subset: Lanes) -> bool {
    set.intersects(subset)
}

pub fn is_subset_of_lanes(set: Lanes, subset: Lanes) -> bool {
    set.contains(subset)
}

/// Lanes still pending after `finished` has been committed.
pub fn mark_root_finished(pending: Lanes, finished: Lanes) -> Lanes {
    pending.difference(finished)
}

#[cfg(test)]
#[path = "tests/lane_tests.rs"]
mod tests;
