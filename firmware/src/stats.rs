// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Power statistics of one captured sample buffer.

use derive_more::{Add, AddAssign};

/// Position of voltage and current within one interleaved sample pair.
///
/// The round-robin ADC converts its inputs in ascending order.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PairOrder {
    VoltageFirst,
    CurrentFirst,
}

impl PairOrder {
    pub fn new(voltage_input: u8, current_input: u8) -> Self {
        if voltage_input < current_input {
            PairOrder::VoltageFirst
        } else {
            PairOrder::CurrentFirst
        }
    }

    /// ADC inputs in conversion order.
    pub fn inputs(self, voltage_input: u8, current_input: u8) -> [u8; 2] {
        match self {
            PairOrder::VoltageFirst => [voltage_input, current_input],
            PairOrder::CurrentFirst => [current_input, voltage_input],
        }
    }

    /// Split a raw pair into `(voltage, current)`.
    #[inline]
    pub fn split(self, pair: &[u16]) -> (u16, u16) {
        match self {
            PairOrder::VoltageFirst => (pair[0], pair[1]),
            PairOrder::CurrentFirst => (pair[1], pair[0]),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Add, AddAssign)]
struct Sums {
    voltage: u64,
    current: u64,
}

/// Peak values relative to the offset, in ADC counts.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Peak {
    pub voltage: i32,
    pub current: i32,
    pub power: i64,
}

impl Peak {
    const fn zero() -> Self {
        Self {
            voltage: 0,
            current: 0,
            power: 0,
        }
    }

    fn update(&mut self, voltage: i32, current: i32, power: i64) {
        self.voltage = self.voltage.max(voltage);
        self.current = self.current.max(current);
        self.power = self.power.max(power);
    }
}

/// Raw statistics of the most recent capture.
#[derive(Copy, Clone, Debug)]
pub struct Stats<const HIST: usize> {
    /// Number of sample pairs the statistics were computed from.
    pub sample_count: u32,
    pub offset_voltage: u16,
    pub offset_current: u16,
    /// Largest positive excursion.
    pub pos_peak: Peak,
    /// Largest negative excursion, as a positive magnitude.
    pub neg_peak: Peak,
    pub square_sum_voltage: u64,
    pub square_sum_current: u64,
    pub power_sum: i64,
    /// Number of used histogram buckets.
    pub histogram_len: usize,
    /// Number of waveform cycles summed into the histogram.
    pub histogram_count: u32,
    pub histogram_voltage: [i32; HIST],
    pub histogram_current: [i32; HIST],
}

impl<const HIST: usize> Stats<HIST> {
    pub const fn new() -> Self {
        Self {
            sample_count: 0,
            offset_voltage: 0,
            offset_current: 0,
            pos_peak: Peak::zero(),
            neg_peak: Peak::zero(),
            square_sum_voltage: 0,
            square_sum_current: 0,
            power_sum: 0,
            histogram_len: 0,
            histogram_count: 0,
            histogram_voltage: [0; HIST],
            histogram_current: [0; HIST],
        }
    }

    /// Replace the statistics by the ones of the interleaved `samples`.
    ///
    /// The first pass computes the DC offsets. The second pass computes
    /// everything else on the offset free values.
    ///
    /// The histogram is synchronized to the waveform: a window starts at each
    /// negative to positive transition of the voltage. It ends after
    /// `histogram_len` pairs or at the next transition, whichever comes first.
    /// Ended windows are summed up bucket by bucket. A cycle shorter than the
    /// histogram leaves the trailing buckets untouched. The window still open
    /// at the end of the buffer is dropped.
    pub fn aggregate(&mut self, samples: &[u16], order: PairOrder, histogram_len: usize) {
        *self = Self::new();
        self.histogram_len = histogram_len.min(HIST);

        let count = samples.len() / 2;
        if count == 0 {
            return;
        }
        self.sample_count = count as u32;

        let mut sums = Sums::default();
        for pair in samples.chunks_exact(2) {
            let (voltage, current) = order.split(pair);
            sums += Sums {
                voltage: voltage as u64,
                current: current as u64,
            };
        }
        self.offset_voltage = (sums.voltage / count as u64) as u16;
        self.offset_current = (sums.current / count as u64) as u16;

        let mut last_voltage = 0;
        let mut window: Option<usize> = None;
        for (i, pair) in samples.chunks_exact(2).enumerate() {
            let (voltage, current) = self.centered(order, pair);
            let power = voltage as i64 * current as i64;

            self.pos_peak.update(voltage, current, power);
            self.neg_peak.update(-voltage, -current, -power);
            self.square_sum_voltage += (voltage.unsigned_abs() as u64).pow(2);
            self.square_sum_current += (current.unsigned_abs() as u64).pow(2);
            self.power_sum += power;

            if self.histogram_len > 0 && last_voltage < 0 && voltage >= 0 {
                if let Some(start) = window {
                    self.add_to_histogram(&samples[start * 2..i * 2], order);
                }
                window = Some(i);
            }
            last_voltage = voltage;

            if let Some(start) = window {
                if i + 1 - start == self.histogram_len {
                    self.add_to_histogram(&samples[start * 2..(i + 1) * 2], order);
                    window = None;
                }
            }
        }
    }

    #[inline]
    fn centered(&self, order: PairOrder, pair: &[u16]) -> (i32, i32) {
        let (voltage, current) = order.split(pair);
        (
            voltage as i32 - self.offset_voltage as i32,
            current as i32 - self.offset_current as i32,
        )
    }

    fn add_to_histogram(&mut self, window: &[u16], order: PairOrder) {
        for (bucket, pair) in window.chunks_exact(2).enumerate() {
            let (voltage, current) = self.centered(order, pair);
            self.histogram_voltage[bucket] += voltage;
            self.histogram_current[bucket] += current;
        }
        self.histogram_count += 1;
    }
}

impl<const HIST: usize> Default for Stats<HIST> {
    fn default() -> Self {
        Self::new()
    }
}


// vim: ts=4 sw=4 expandtab
