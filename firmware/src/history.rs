// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::timer::{RelTimestamp, Timestamp};

/// Number of intervals in the history. Must be even.
pub const HISTORY_LEN: usize = 32;

/// Rolling history of the intervals between accepted zero crossings.
///
/// Even and odd entries belong to the two halfwaves of one mains period.
/// They are tracked separately, because the zero-cross comparator does
/// not necessarily switch symmetrically.
#[derive(Copy, Clone, Debug)]
pub struct History {
    index: u8,
    last_cross: [Timestamp; 2],
    intervals: [u32; HISTORY_LEN],
}

impl History {
    pub const fn new() -> Self {
        Self {
            index: 0,
            last_cross: [Timestamp::new(); 2],
            intervals: [0; HISTORY_LEN],
        }
    }

    /// Parity of the most recently accepted crossing.
    #[inline]
    pub fn parity(&self) -> usize {
        (self.index & 1) as usize
    }

    /// Record a crossing at `now`.
    ///
    /// Crossings closer than `ignore` to the previous accepted crossing are
    /// bounces of the same physical crossing. They are dropped and `None` is returned.
    /// Otherwise the interval, clamped to `ceiling`, is recorded and the
    /// parity of the new crossing is returned.
    pub fn record(
        &mut self,
        now: Timestamp,
        ignore: RelTimestamp,
        ceiling: RelTimestamp,
    ) -> Option<usize> {
        let delta = now.since(self.last_cross[self.parity()]);
        if delta < ignore {
            return None;
        }
        let delta = delta.min(ceiling);

        self.index = (self.index + 1) % HISTORY_LEN as u8;
        let parity = self.parity();
        self.last_cross[parity] = now;
        self.intervals[self.index as usize] = delta.as_micros_u32();
        Some(parity)
    }

    fn sums(&self, now: Timestamp, ceiling: RelTimestamp) -> Option<[u64; 2]> {
        if self.last_cross.iter().any(|&lc| now.since(lc) > ceiling) {
            // Not synchronized to mains anymore.
            return None;
        }
        let ceiling = ceiling.as_micros_u32();
        let mut sums = [0_u64; 2];
        for (i, &interval) in self.intervals.iter().enumerate() {
            if interval == 0 || interval >= ceiling {
                return None;
            }
            sums[i & 1] += interval as u64;
        }
        Some(sums)
    }

    /// Average interval per parity, in microseconds.
    ///
    /// `None`, if the history is incomplete, contains clamped
    /// intervals or the last crossing is older than `ceiling`.
    pub fn averages(&self, now: Timestamp, ceiling: RelTimestamp) -> Option<[u32; 2]> {
        let sums = self.sums(now, ceiling)?;
        Some(sums.map(|sum| (sum / (HISTORY_LEN as u64 / 2)) as u32))
    }

    /// Average interval over both parities, in microseconds.
    pub fn average(&self, now: Timestamp, ceiling: RelTimestamp) -> Option<u32> {
        let [even, odd] = self.sums(now, ceiling)?;
        Some(((even + odd) / HISTORY_LEN as u64) as u32)
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}


// vim: ts=4 sw=4 expandtab
