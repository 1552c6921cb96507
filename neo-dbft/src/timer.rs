//! Logical clock and timeout arithmetic.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ViewNumber;

/// Identifies the (height, view) a timer was armed for, so stale fires can be dropped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HView {
    pub height: u32,
    pub view_number: ViewNumber,
}

/// Wall clock plus a fast-forward offset.
///
/// Clones share the offset, so the driver and its handlers observe the same
/// time after `fast_forward_*`.
#[derive(Debug, Clone)]
pub struct TimerContext {
    unix_milli_now: fn() -> u64,
    offset_millis: Arc<AtomicU64>,
}

impl Default for TimerContext {
    fn default() -> Self {
        Self::new(unix_millis_now)
    }
}

impl TimerContext {
    pub fn new(unix_milli_now: fn() -> u64) -> Self {
        Self {
            unix_milli_now,
            offset_millis: Arc::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn now_millis(&self) -> u64 {
        (self.unix_milli_now)().saturating_add(self.offset_millis())
    }

    #[inline]
    pub fn offset_millis(&self) -> u64 {
        self.offset_millis.load(Ordering::SeqCst)
    }

    /// Moves the clock forward by `seconds`.
    pub fn fast_forward_offset(&self, seconds: u64) {
        self.offset_millis
            .fetch_add(seconds.saturating_mul(1000), Ordering::SeqCst);
    }

    /// Moves the clock forward so that `now` reads `seconds` since the epoch.
    /// Never moves it backwards.
    pub fn fast_forward_to_time(&self, seconds: u64) {
        let target = seconds.saturating_mul(1000);
        let wall = (self.unix_milli_now)();
        let offset = target.saturating_sub(wall);
        self.offset_millis.fetch_max(offset, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.offset_millis.store(0, Ordering::SeqCst);
    }
}

#[inline]
pub fn unix_millis_now() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Exponential backoff for `view`: `per_block_millis << (view + 1)`.
#[inline]
pub fn millis_on_view(view_number: ViewNumber, per_block_millis: u64) -> u64 {
    per_block_millis << core::cmp::min(32, u32::from(view_number) + 1)
}

/// How long the primary of view 0 still waits before proposing.
#[inline]
pub fn millis_until_proposal(per_block_millis: u64, now: u64, block_received: u64) -> u64 {
    per_block_millis.saturating_sub(now.saturating_sub(block_received))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> u64 {
        1_000_000
    }

    #[test]
    fn test_fast_forward() {
        let timer = TimerContext::new(fixed_now);
        assert_eq!(timer.now_millis(), 1_000_000);

        timer.fast_forward_offset(5);
        assert_eq!(timer.now_millis(), 1_005_000);

        let shared = timer.clone();
        shared.fast_forward_to_time(2_000);
        assert_eq!(timer.now_millis(), 2_000_000);

        // never backwards
        timer.fast_forward_to_time(1);
        assert_eq!(timer.now_millis(), 2_000_000);

        timer.reset();
        assert_eq!(shared.now_millis(), 1_000_000);
    }

    #[test]
    fn test_timeouts() {
        assert_eq!(millis_on_view(0, 1000), 2000);
        assert_eq!(millis_on_view(2, 1000), 8000);
        assert_eq!(millis_until_proposal(1000, 5_400, 5_000), 600);
        assert_eq!(millis_until_proposal(1000, 9_000, 5_000), 0);
    }
}
