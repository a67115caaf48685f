// src/engine/wait.rs

//! Wait strategies, chosen once per run.
//!
//! The executor always calls `wait_until`; whether that blocks is entirely
//! the strategy's business, so live and dry runs share one state machine.

use std::time::Duration;

use crate::engine::mode::TimingMode;
use crate::engine::time::{Clock, Timestamp};

/// Longest single sleep before the remaining wait is recomputed.
pub const MAX_SLEEP_SLICE: Duration = Duration::from_secs(1);

pub trait Waiter {
    fn mode(&self) -> TimingMode;

    /// Return once `target` is due. Returns at once if it already is.
    async fn wait_until(&self, target: &Timestamp);
}

/// Dry-run strategy: never waits, whatever the offset.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWaiter;

impl Waiter for NullWaiter {
    fn mode(&self) -> TimingMode {
        TimingMode::DryRun
    }

    async fn wait_until(&self, _target: &Timestamp) {}
}

/// Sleeps until the clock reaches the target.
///
/// Long waits are cut into slices and the remainder is recomputed from the
/// clock after each slice, so wall-clock adjustments are picked up instead of
/// drifting behind one long fixed sleep.
pub struct RealClockWaiter<'a> {
    clock: &'a dyn Clock,
    max_slice: Duration,
}

impl<'a> RealClockWaiter<'a> {
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self {
            clock,
            max_slice: MAX_SLEEP_SLICE,
        }
    }

    #[allow(dead_code)]
    pub fn with_max_slice(mut self, max_slice: Duration) -> Self {
        self.max_slice = max_slice;
        self
    }

    /// Time left until `target`, or `None` once it is due.
    fn remaining(&self, target: &Timestamp) -> Option<Duration> {
        let now = self.clock.now(target.basis());
        let remaining = target.since(&now)?.to_std().ok()?;
        if remaining.is_zero() {
            None
        } else {
            Some(remaining)
        }
    }
}

impl Waiter for RealClockWaiter<'_> {
    fn mode(&self) -> TimingMode {
        TimingMode::Live
    }

    async fn wait_until(&self, target: &Timestamp) {
        while let Some(remaining) = self.remaining(target) {
            tokio::time::sleep(remaining.min(self.max_slice)).await;
        }
    }
}
