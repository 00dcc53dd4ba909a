//! Fiber groups
//!
//! Fibers can be tagged with a bitmask of up to [`MAX_GROUPS`] groups so
//! whole categories (e.g. "gameplay", "ui") can be paused or time-scaled at
//! once. Changes are queued and only committed at phase boundaries, so a
//! change made mid-tick never affects fibers still waiting to run that tick.

use smallvec::SmallVec;
use std::ops::{BitOr, BitOrAssign};

/// Maximum number of fiber groups
pub const MAX_GROUPS: usize = 32;

/// A set of fiber groups
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupMask(u32);

impl GroupMask {
    /// The empty set
    pub const NONE: GroupMask = GroupMask(0);
    /// Every group
    pub const ALL: GroupMask = GroupMask(u32::MAX);

    /// Mask containing only the group at `index`
    ///
    /// Indices past [`MAX_GROUPS`] produce an empty mask.
    pub fn group(index: usize) -> Self {
        if index < MAX_GROUPS {
            GroupMask(1 << index)
        } else {
            GroupMask::NONE
        }
    }

    pub fn from_bits(bits: u32) -> Self {
        GroupMask(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, index: usize) -> bool {
        index < MAX_GROUPS && self.0 & (1 << index) != 0
    }

    pub fn intersects(self, other: GroupMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Iterate over the group indices in this mask
    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..MAX_GROUPS).filter(move |i| self.contains(*i))
    }
}

impl BitOr for GroupMask {
    type Output = GroupMask;

    fn bitor(self, rhs: GroupMask) -> GroupMask {
        GroupMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for GroupMask {
    fn bitor_assign(&mut self, rhs: GroupMask) {
        self.0 |= rhs.0;
    }
}

/// A queued group change
#[derive(Clone, Copy, Debug)]
enum GroupChange {
    Pause(GroupMask),
    Resume(GroupMask),
    TimeScale(usize, f32),
    ResetTimeScales,
}

/// Committed group pause/time-scale state plus the pending queue
#[derive(Debug)]
pub(crate) struct GroupState {
    paused: GroupMask,
    scales: [f32; MAX_GROUPS],
    pending: SmallVec<[GroupChange; 4]>,
}

impl GroupState {
    pub fn new() -> Self {
        Self {
            paused: GroupMask::NONE,
            scales: [1.0; MAX_GROUPS],
            pending: SmallVec::new(),
        }
    }

    pub fn queue_pause(&mut self, mask: GroupMask) {
        self.pending.push(GroupChange::Pause(mask));
    }

    pub fn queue_resume(&mut self, mask: GroupMask) {
        self.pending.push(GroupChange::Resume(mask));
    }

    pub fn queue_time_scale(&mut self, index: usize, scale: f32) {
        if index < MAX_GROUPS {
            self.pending.push(GroupChange::TimeScale(index, scale));
        }
    }

    pub fn queue_reset_time_scales(&mut self) {
        self.pending.push(GroupChange::ResetTimeScales);
    }

    /// Apply every queued change in the order it was requested
    pub fn commit(&mut self) {
        for change in self.pending.drain(..) {
            match change {
                GroupChange::Pause(mask) => self.paused |= mask,
                GroupChange::Resume(mask) => self.paused = GroupMask(self.paused.0 & !mask.0),
                GroupChange::TimeScale(index, scale) => self.scales[index] = scale,
                GroupChange::ResetTimeScales => self.scales = [1.0; MAX_GROUPS],
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn paused(&self) -> GroupMask {
        self.paused
    }

    pub fn is_paused(&self, mask: GroupMask) -> bool {
        self.paused.intersects(mask)
    }

    pub fn scale_of(&self, index: usize) -> f32 {
        self.scales.get(index).copied().unwrap_or(1.0)
    }

    /// Combined time scale of every group in `mask`
    pub fn time_scale(&self, mask: GroupMask) -> f32 {
        if mask.is_empty() {
            return 1.0;
        }
        mask.indices().map(|i| self.scales[i]).product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_mask_bits() {
        let mask = GroupMask::group(0) | GroupMask::group(5);
        assert!(mask.contains(0));
        assert!(mask.contains(5));
        assert!(!mask.contains(1));
        assert_eq!(mask.indices().collect::<Vec<_>>(), vec![0, 5]);
        assert!(GroupMask::group(MAX_GROUPS).is_empty());
    }

    #[test]
    fn test_changes_are_queued_until_commit() {
        let mut groups = GroupState::new();
        groups.queue_pause(GroupMask::group(2));
        groups.queue_time_scale(3, 0.5);
        assert!(!groups.is_paused(GroupMask::group(2)));
        assert_eq!(groups.scale_of(3), 1.0);

        groups.commit();
        assert!(groups.is_paused(GroupMask::group(2)));
        assert_eq!(groups.scale_of(3), 0.5);
        assert!(!groups.has_pending());

        groups.queue_resume(GroupMask::group(2));
        groups.commit();
        assert!(!groups.is_paused(GroupMask::group(2)));
    }

    #[test]
    fn test_time_scale_multiplies_member_groups() {
        let mut groups = GroupState::new();
        groups.queue_time_scale(0, 0.5);
        groups.queue_time_scale(1, 4.0);
        groups.commit();

        let mask = GroupMask::group(0) | GroupMask::group(1);
        assert!((groups.time_scale(mask) - 2.0).abs() < f32::EPSILON);
        assert_eq!(groups.time_scale(GroupMask::NONE), 1.0);

        groups.queue_reset_time_scales();
        groups.commit();
        assert_eq!(groups.time_scale(mask), 1.0);
    }
}
