//! Monotonic time source and second/nanosecond duration arithmetic.
//!
//! Timestamps come from `CLOCK_MONOTONIC_RAW`, which is not subject to NTP
//! adjustment, so elapsed-time deltas stay meaningful even when the wall
//! clock is being disciplined underneath the host process.

use nix::time::{clock_gettime, ClockId};

/// Nanoseconds in one second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point in time (or an accumulated duration) split into whole seconds
/// and a sub-second nanosecond remainder.
///
/// The `nsec` field is kept normalized in `[0, 1_000_000_000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct RawTime {
    /// Whole seconds.
    pub sec: u64,
    /// Sub-second remainder in nanoseconds.
    pub nsec: u32,
}

impl RawTime {
    /// The zero timestamp.
    pub const ZERO: RawTime = RawTime { sec: 0, nsec: 0 };

    /// Build a timestamp from seconds and nanoseconds, normalizing any
    /// nanosecond overflow into the seconds field.
    pub fn new(sec: u64, nsec: u64) -> Self {
        RawTime {
            sec: sec + nsec / NANOS_PER_SEC,
            nsec: (nsec % NANOS_PER_SEC) as u32,
        }
    }

    /// Total duration in nanoseconds.
    pub fn total_nanos(&self) -> u128 {
        u128::from(self.sec) * u128::from(NANOS_PER_SEC) + u128::from(self.nsec)
    }

    /// Elapsed time from `start` to `end`.
    ///
    /// When the sub-second part of `end` is smaller than that of `start`,
    /// one second is borrowed: the second count is decremented and the
    /// nanosecond subtraction happens after adding a full second. An `end`
    /// that precedes `start` saturates to zero; a monotonic source never
    /// produces that ordering.
    pub fn diff(start: RawTime, end: RawTime) -> RawTime {
        if end < start {
            return RawTime::ZERO;
        }
        let (sec, nsec) = if end.nsec < start.nsec {
            (
                end.sec - start.sec - 1,
                end.nsec + NANOS_PER_SEC as u32 - start.nsec,
            )
        } else {
            (end.sec - start.sec, end.nsec - start.nsec)
        };
        RawTime { sec, nsec }
    }

    /// Add `delta` into this accumulated total.
    ///
    /// The summed sub-second part carries into the seconds field as soon as
    /// it reaches one full second. The carry threshold is `>=`: a sum of
    /// exactly 1_000_000_000 ns normalizes to one extra second and 0 ns.
    pub fn accumulate(&mut self, delta: RawTime) {
        self.sec += delta.sec;
        let nsec = u64::from(self.nsec) + u64::from(delta.nsec);
        if nsec >= NANOS_PER_SEC {
            self.sec += nsec / NANOS_PER_SEC;
            self.nsec = (nsec % NANOS_PER_SEC) as u32;
        } else {
            self.nsec = nsec as u32;
        }
    }
}

/// Wrapper around the raw monotonic clock.
///
/// Reads fail soft: a `clock_gettime` error is logged and a zero timestamp
/// is returned, so instrumentation never aborts the calling thread over a
/// clock problem.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    /// Create a new clock handle.
    pub fn new() -> Self {
        MonotonicClock
    }

    /// Current monotonic time.
    pub fn now(&self) -> RawTime {
        match clock_gettime(ClockId::CLOCK_MONOTONIC_RAW) {
            Ok(ts) => RawTime {
                sec: ts.tv_sec().max(0) as u64,
                nsec: ts.tv_nsec().clamp(0, NANOS_PER_SEC as i64 - 1) as u32,
            },
            Err(errno) => {
                tracing::error!(%errno, "monotonic clock read failed");
                RawTime::ZERO
            }
        }
    }
}
