// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Unsigned Q0.16 fraction in the range `0 <= x < 1`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Frac16(u16);

impl Frac16 {
    pub const SHIFT: u32 = 16;

    pub const fn from_q(q: u16) -> Self {
        Self(q)
    }

    pub const fn to_q(self) -> u16 {
        self.0
    }

    /// `value * self`, truncated.
    #[inline]
    pub const fn scale(self, value: u32) -> u32 {
        ((value as u64 * self.0 as u64) >> Self::SHIFT) as u32
    }
}


// vim: ts=4 sw=4 expandtab
