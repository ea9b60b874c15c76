// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use derive_more::{Add, AddAssign, Sub, SubAssign};

/// Absolute time in microseconds since boot.
///
/// The 64 bit counter does not wrap during the lifetime of the device.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    #[inline]
    pub const fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn from_micros(us: u64) -> Self {
        Self(us)
    }

    #[inline]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`. Zero, if `earlier` is in the future.
    #[inline]
    pub const fn since(self, earlier: Timestamp) -> RelTimestamp {
        RelTimestamp(self.0.saturating_sub(earlier.0))
    }
}

impl core::ops::Add<RelTimestamp> for Timestamp {
    type Output = Self;

    #[inline]
    fn add(self, other: RelTimestamp) -> Self::Output {
        Self(self.0.saturating_add(other.0))
    }
}

impl core::ops::Sub for Timestamp {
    type Output = RelTimestamp;

    #[inline]
    fn sub(self, other: Self) -> Self::Output {
        self.since(other)
    }
}

impl From<u64> for Timestamp {
    #[inline]
    fn from(us: u64) -> Self {
        Self(us)
    }
}

/// Relative time in microseconds.
#[derive(
    PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug, Default, Add, Sub, AddAssign, SubAssign,
)]
pub struct RelTimestamp(pub u64);

impl RelTimestamp {
    #[inline]
    pub const fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn from_micros(us: u32) -> Self {
        Self(us as u64)
    }

    #[inline]
    pub const fn from_millis(ms: u32) -> Self {
        Self(ms as u64 * 1000)
    }

    #[inline]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Microseconds, saturated to `u32`.
    #[inline]
    pub const fn as_micros_u32(self) -> u32 {
        if self.0 > u32::MAX as u64 {
            u32::MAX
        } else {
            self.0 as u32
        }
    }
}

impl From<u32> for RelTimestamp {
    #[inline]
    fn from(us: u32) -> Self {
        Self::from_micros(us)
    }
}

/// Busy-wait for `ready`, polling it at most `limit` times.
///
/// This is the only kind of waiting that is allowed in interrupt context.
/// `limit` must keep the worst case spin well below the period of the
/// interrupt that spins. Returns `false` on timeout.
#[inline]
pub fn spin_until(limit: u32, mut ready: impl FnMut() -> bool) -> bool {
    for _ in 0..limit {
        if ready() {
            return true;
        }
        core::hint::spin_loop();
    }
    false
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_timestamp_arith() {
        let a = Timestamp::from_micros(1_000);
        let b = a + RelTimestamp::from_millis(2);
        assert_eq!(b.as_micros(), 3_000);
        assert_eq!(b - a, RelTimestamp::from_micros(2_000));
        assert_eq!(a - b, RelTimestamp::new());
        assert_eq!(a.since(Timestamp::new()), RelTimestamp(1_000));

        let mut r = RelTimestamp::from_micros(300);
        r += RelTimestamp::from_micros(700);
        assert_eq!(r, RelTimestamp::from_millis(1));
        assert_eq!(r - RelTimestamp::from_micros(1), RelTimestamp(999));
        assert_eq!(RelTimestamp(u64::MAX).as_micros_u32(), u32::MAX);
    }

    #[test]
    fn test_spin_until() {
        let mut polls = 0;
        assert!(spin_until(10, || {
            polls += 1;
            polls == 3
        }));
        assert_eq!(polls, 3);

        let mut polls = 0;
        assert!(!spin_until(5, || {
            polls += 1;
            false
        }));
        assert_eq!(polls, 5);
    }
}

// vim: ts=4 sw=4 expandtab
