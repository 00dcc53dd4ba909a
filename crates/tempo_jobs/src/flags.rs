//! Job flags and priority tiers

use bitflags::bitflags;

/// Number of priority tiers
pub const TIER_COUNT: usize = 3;

bitflags! {
    /// Scheduling flags of a job
    ///
    /// With neither priority flag set a job runs in the normal tier.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AsyncFlags: u8 {
        const LOW_PRIORITY = 1 << 0;
        const HIGH_PRIORITY = 1 << 1;
        /// Only ever stepped from `JobScheduler::update` on the main thread
        const MAIN_THREAD_ONLY = 1 << 2;
    }
}

impl AsyncFlags {
    /// Tier the job is queued in; high wins if both priority flags are set
    pub fn priority(self) -> AsyncPriority {
        if self.contains(AsyncFlags::HIGH_PRIORITY) {
            AsyncPriority::High
        } else if self.contains(AsyncFlags::LOW_PRIORITY) {
            AsyncPriority::Low
        } else {
            AsyncPriority::Normal
        }
    }

    pub fn is_main_thread_only(self) -> bool {
        self.contains(AsyncFlags::MAIN_THREAD_ONLY)
    }
}

/// Priority tier, served in declaration order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AsyncPriority {
    High,
    #[default]
    Normal,
    Low,
}

impl AsyncPriority {
    /// Tiers in the order `update` serves them
    pub const ALL: [AsyncPriority; TIER_COUNT] =
        [AsyncPriority::High, AsyncPriority::Normal, AsyncPriority::Low];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            AsyncPriority::High => "high",
            AsyncPriority::Normal => "normal",
            AsyncPriority::Low => "low",
        }
    }
}

impl From<AsyncPriority> for AsyncFlags {
    fn from(priority: AsyncPriority) -> Self {
        match priority {
            AsyncPriority::High => AsyncFlags::HIGH_PRIORITY,
            AsyncPriority::Normal => AsyncFlags::empty(),
            AsyncPriority::Low => AsyncFlags::LOW_PRIORITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_from_flags() {
        assert_eq!(AsyncFlags::empty().priority(), AsyncPriority::Normal);
        assert_eq!(AsyncFlags::LOW_PRIORITY.priority(), AsyncPriority::Low);
        assert_eq!(
            (AsyncFlags::HIGH_PRIORITY | AsyncFlags::MAIN_THREAD_ONLY).priority(),
            AsyncPriority::High
        );
        assert_eq!(
            (AsyncFlags::HIGH_PRIORITY | AsyncFlags::LOW_PRIORITY).priority(),
            AsyncPriority::High
        );
    }

    #[test]
    fn test_priority_round_trips_through_flags() {
        for priority in AsyncPriority::ALL {
            assert_eq!(AsyncFlags::from(priority).priority(), priority);
        }
        assert_eq!(AsyncPriority::High.index(), 0);
        assert_eq!(AsyncPriority::Low.index(), 2);
    }
}
