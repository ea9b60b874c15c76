// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::fixpt::Frac16;

/// Highest power command.
pub const PERCENT_MAX: u8 = 100;

/// Firing position within the halfwave for each power percentage.
///
/// Entry `p` is the fraction of the halfwave to wait after the zero crossing,
/// such that the remaining conduction angle of a sine wave delivers `p` percent
/// of the full RMS power. The table is obtained by integrating sin² over the
/// halfwave and inverting the integral at 1% steps.
const POWER_TABLE: [u16; PERCENT_MAX as usize + 1] = [
    65534, 57933, 55906, 54461, 53296, 52299, 51418, 50620, 49888, 49207, //
    48567, 47963, 47389, 46840, 46313, 45806, 45316, 44841, 44380, 43932, //
    43494, 43067, 42649, 42239, 41837, 41442, 41054, 40671, 40294, 39922, //
    39555, 39192, 38833, 38478, 38126, 37777, 37431, 37088, 36747, 36408, //
    36071, 35736, 35402, 35070, 34739, 34409, 34079, 33751, 33423, 33095, //
    32767, 32439, 32111, 31783, 31455, 31125, 30795, 30464, 30132, 29798, //
    29463, 29126, 28787, 28446, 28103, 27757, 27408, 27056, 26701, 26342, //
    25979, 25612, 25240, 24863, 24480, 24092, 23697, 23295, 22885, 22467, //
    22040, 21602, 21154, 20693, 20218, 19728, 19221, 18694, 18145, 17571, //
    16967, 16327, 15646, 14914, 14116, 13235, 12238, 11073, 9628, 7601, //
    0,
];

/// Firing position for `percent` as a fraction of the halfwave.
#[inline]
pub fn firing_fraction(percent: u8) -> Frac16 {
    let percent = percent.min(PERCENT_MAX);
    Frac16::from_q(POWER_TABLE[percent as usize])
}

/// Firing delay in microseconds after the zero crossing for one halfwave.
#[inline]
pub fn firing_delay(percent: u8, half_period_us: u32) -> u32 {
    1 + firing_fraction(percent).scale(half_period_us)
}

/// Firing delays for the even and odd halfwave.
///
/// A delay of zero means "never fire".
/// 0% never fires and 100% fires immediately, independent of mains timing.
/// Everything in between needs the average halfwave durations. If they are
/// unknown, the result is zero and the TRIAC stays off.
pub fn firing_delays(percent: u8, half_periods: Option<[u32; 2]>) -> [u32; 2] {
    match percent {
        0 => [0, 0],
        PERCENT_MAX.. => [1, 1],
        percent => match half_periods {
            Some(half_periods) => half_periods.map(|t| firing_delay(percent, t)),
            None => [0, 0],
        },
    }
}


// vim: ts=4 sw=4 expandtab
