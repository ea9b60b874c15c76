// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Voltage and current sampling and the calibrated power readings.
//!
//! A repeating timer starts one conversion of each input per tick.
//! The round-robin ADC alternates between the two inputs and DMA streams
//! the results into the capture buffer. The DMA completion interrupt
//! computes the statistics of the full buffer and restarts the capture.
//!
//! The capture buffer is handed to the DMA engine by address, so a running
//! analyzer must never move. [PowerAnalyzer::configure] therefore takes
//! `&'static self`: place the analyzer in a `static`.

use crate::{
    error::{Error, Resource},
    hal::{AnalyzerHal, DmaChannel},
    mutex::{CriticalSection, IrqCtx, MainCtx, MutexCell},
    seqlock::SeqLock,
    stats::{PairOrder, Peak, Stats},
    timer::spin_until,
};
use core::cell::UnsafeCell;
use heapless::Vec;
use log::{debug, warn};

/// Maximum number of ADC readiness polls per conversion in the sampling tick.
///
/// The worst case spin has to stay well below the sample period.
pub const ADC_READY_SPIN_LIMIT: u32 = 1000;

/// Two conversions per tick on a 500 kS/s ADC.
pub const MAX_SAMPLE_RATE_HZ: u32 = 250_000;

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 6_000;
pub const DEFAULT_SAMPLE_COUNT: usize = 300;
pub const DEFAULT_HISTOGRAM_SIZE: usize = 100;

/// Parameters of the power analyzer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct AnalyzerConfig {
    voltage_pin: u8,
    current_pin: u8,
    sample_rate_hz: u32,
    sample_count: usize,
    histogram_size: usize,
}

impl AnalyzerConfig {
    pub fn new(voltage_pin: u8, current_pin: u8) -> Self {
        Self {
            voltage_pin,
            current_pin,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            sample_count: DEFAULT_SAMPLE_COUNT,
            histogram_size: DEFAULT_HISTOGRAM_SIZE,
        }
    }

    /// Voltage/current pairs per second.
    pub fn sample_rate_hz(mut self, hz: u32) -> Self {
        self.sample_rate_hz = hz;
        self
    }

    /// Voltage/current pairs per capture.
    pub fn sample_count(mut self, count: usize) -> Self {
        self.sample_count = count;
        self
    }

    pub fn histogram_size(mut self, size: usize) -> Self {
        self.histogram_size = size;
        self
    }
}

/// Calibrated values.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Readings {
    pub voltage: f32,
    pub current: f32,
    pub power: f32,
}

/// Positive and negative peaks. Negative peaks are magnitudes.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Peaks {
    pub positive: Readings,
    pub negative: Readings,
}

/// DC offsets in raw ADC counts.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Offsets {
    pub voltage: u16,
    pub current: u16,
}

#[derive(Copy, Clone, PartialEq, Debug)]
struct Calibration {
    voltage: f32,
    current: f32,
    power: f32,
}

impl Calibration {
    const fn new() -> Self {
        Self {
            voltage: 1.0,
            current: 1.0,
            power: 1.0,
        }
    }

    fn apply(&self, peak: &Peak) -> Readings {
        Readings {
            voltage: peak.voltage as f32 * self.voltage,
            current: peak.current as f32 * self.current,
            power: peak.power as f32 * self.power,
        }
    }
}

/// Running capture.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
struct Capture {
    dma: DmaChannel,
    inputs: [u8; 2],
    order: PairOrder,
    /// Buffer length in samples.
    len: usize,
    histogram_len: usize,
}

/// Who may access the capture buffer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Owner {
    Idle,
    Dma,
    Aggregator,
}

/// Power analyzer with a capture buffer of `BUF` samples
/// (`BUF / 2` voltage/current pairs) and up to `HIST` histogram buckets.
pub struct PowerAnalyzer<const BUF: usize = 600, const HIST: usize = 100> {
    capture: MutexCell<Option<Capture>>,
    calibration: MutexCell<Calibration>,
    owner: MutexCell<Owner>,
    overruns: MutexCell<u32>,
    /// The running capture holds swapped pairs and must not be published.
    discard: MutexCell<bool>,
    buffer: UnsafeCell<[u16; BUF]>,
    stats: SeqLock<Stats<HIST>>,
}

// SAFETY: The buffer is only accessed by its current owner.
//         The owner is tracked in `owner` and changed inside of critical sections.
unsafe impl<const BUF: usize, const HIST: usize> Sync for PowerAnalyzer<BUF, HIST> {}

impl<const BUF: usize, const HIST: usize> PowerAnalyzer<BUF, HIST> {
    pub const fn new() -> Self {
        Self {
            capture: MutexCell::new(None),
            calibration: MutexCell::new(Calibration::new()),
            owner: MutexCell::new(Owner::Idle),
            overruns: MutexCell::new(0),
            discard: MutexCell::new(false),
            buffer: UnsafeCell::new([0; BUF]),
            stats: SeqLock::new(Stats::new()),
        }
    }

    /// Hand the buffer to DMA and start the transfer.
    fn start_dma<H: AnalyzerHal>(&self, hal: &H, c: &Capture) {
        let dst = self.buffer.get() as *mut u16;
        // SAFETY: The buffer is owned by DMA from now on and `len <= BUF`.
        //         A capture only exists after `configure`, which borrows
        //         `self` for `'static`. The buffer address never changes.
        unsafe { hal.dma_start(c.dma, dst, c.len) };
    }

    fn count_overrun(&self, cs: CriticalSection<'_>) {
        self.overruns.set(cs, self.overruns.get(cs).wrapping_add(1));
    }

    /// Claim the ADC, a DMA channel and a timer and start sampling.
    ///
    /// The statistics of the previous capture stay readable
    /// until the first new capture completed.
    pub fn configure<H: AnalyzerHal>(
        &'static self,
        m: &MainCtx<'_>,
        hal: &H,
        config: &AnalyzerConfig,
    ) -> Result<(), Error> {
        if config.voltage_pin == config.current_pin {
            return Err(Error::SameAnalogPin);
        }
        let voltage_input = hal
            .adc_input(config.voltage_pin)
            .ok_or(Error::InvalidPin(config.voltage_pin))?;
        let current_input = hal
            .adc_input(config.current_pin)
            .ok_or(Error::InvalidPin(config.current_pin))?;
        if config.sample_rate_hz == 0 || config.sample_rate_hz > MAX_SAMPLE_RATE_HZ {
            return Err(Error::OutOfRange("sample rate"));
        }
        if config.sample_count == 0 || config.sample_count > BUF / 2 {
            return Err(Error::OutOfRange("sample count"));
        }
        if config.histogram_size == 0
            || config.histogram_size > HIST
            || config.histogram_size > config.sample_count
        {
            return Err(Error::OutOfRange("histogram size"));
        }

        let order = PairOrder::new(voltage_input, current_input);
        let inputs = order.inputs(voltage_input, current_input);

        m.with_cs(|cs| {
            if self.capture.get(cs).is_some() || self.owner.get(cs) != Owner::Idle {
                return Err(Error::Busy);
            }
            let dma = hal.dma_claim().ok_or(Error::Resource(Resource::Dma))?;
            if !hal.adc_configure(inputs) {
                hal.dma_unclaim(dma);
                return Err(Error::Resource(Resource::Adc));
            }
            let capture = Capture {
                dma,
                inputs,
                order,
                len: config.sample_count * 2,
                histogram_len: config.histogram_size,
            };

            self.overruns.set(cs, 0);
            self.discard.set(cs, false);
            self.owner.set(cs, Owner::Dma);
            self.start_dma(hal, &capture);

            if !hal.start_sample_timer(config.sample_rate_hz) {
                hal.dma_abort(dma);
                hal.dma_unclaim(dma);
                hal.adc_stop();
                self.owner.set(cs, Owner::Idle);
                return Err(Error::Resource(Resource::Timer));
            }
            self.capture.set(cs, Some(capture));
            Ok(())
        })?;

        debug!(
            "Power analyzer: inputs {voltage_input}/{current_input}, {} Hz, {} pairs",
            config.sample_rate_hz, config.sample_count
        );
        Ok(())
    }

    pub fn is_running(&self, m: &MainCtx<'_>) -> bool {
        m.with_cs(|cs| self.capture.get(cs).is_some())
    }

    /// Stop sampling and release all resources.
    pub fn close<H: AnalyzerHal>(&self, m: &MainCtx<'_>, hal: &H) {
        let closed = m.with_cs(|cs| {
            let Some(capture) = self.capture.replace(cs, None) else {
                return false;
            };
            hal.stop_sample_timer();
            hal.dma_abort(capture.dma);
            hal.dma_unclaim(capture.dma);
            hal.adc_stop();
            // A running aggregation releases the buffer itself.
            if self.owner.get(cs) == Owner::Dma {
                self.owner.set(cs, Owner::Idle);
            }
            self.discard.set(cs, false);
            true
        });
        if closed {
            debug!("Power analyzer: closed");
        }
    }

    pub fn set_voltage_multiplier(&self, m: &MainCtx<'_>, multiplier: f32) {
        m.with_cs(|cs| {
            let mut cal = self.calibration.get(cs);
            cal.voltage = multiplier;
            cal.power = cal.voltage * cal.current;
            self.calibration.set(cs, cal);
        });
    }

    pub fn set_current_multiplier(&self, m: &MainCtx<'_>, multiplier: f32) {
        m.with_cs(|cs| {
            let mut cal = self.calibration.get(cs);
            cal.current = multiplier;
            cal.power = cal.voltage * cal.current;
            self.calibration.set(cs, cal);
        });
    }

    /// Repeating sample timer tick.
    ///
    /// Starts one conversion of each input. Nothing is started, if the ADC
    /// does not get ready for the first one. If it does not get ready for
    /// the second one, the pairs of the running capture are misaligned and
    /// the capture is discarded at its completion.
    pub fn irq_handler_sample_tick<H: AnalyzerHal>(&self, c: &IrqCtx<'_>, hal: &H) {
        if c.with_cs(|cs| self.capture.get(cs).is_none()) {
            return;
        }

        if !spin_until(ADC_READY_SPIN_LIMIT, || hal.adc_ready()) {
            c.with_cs(|cs| self.count_overrun(cs));
            warn!("Power analyzer: ADC not ready. Sample dropped.");
            return;
        }
        hal.adc_start_once();

        if !spin_until(ADC_READY_SPIN_LIMIT, || hal.adc_ready()) {
            c.with_cs(|cs| {
                self.count_overrun(cs);
                self.discard.set(cs, true);
            });
            warn!("Power analyzer: ADC not ready. Capture discarded.");
            return;
        }
        hal.adc_start_once();
    }

    /// DMA transfer of a complete capture finished.
    ///
    /// The statistics are computed outside of the critical section.
    /// The aggregator owns the buffer meanwhile.
    pub fn irq_handler_dma_complete<H: AnalyzerHal>(&self, c: &IrqCtx<'_>, hal: &H) {
        let Some((capture, discard)) = c.with_cs(|cs| {
            let capture = self.capture.get(cs)?;
            assert!(
                !hal.dma_busy(capture.dma) && self.owner.get(cs) == Owner::Dma,
                "Power analyzer: capture buffer still owned by DMA"
            );
            self.owner.set(cs, Owner::Aggregator);
            Some((capture, self.discard.get(cs)))
        }) else {
            return;
        };

        let mut stats = Stats::<HIST>::new();
        if !discard {
            // SAFETY: The transfer is complete and the buffer is owned by the aggregator.
            //         `len <= BUF` is checked at configuration time.
            let samples =
                unsafe { core::slice::from_raw_parts(self.buffer.get() as *const u16, capture.len) };
            stats.aggregate(samples, capture.order, capture.histogram_len);
        }

        let realigned = c.with_cs(|cs| {
            if self.capture.get(cs).is_none() {
                // Closed during the aggregation.
                self.owner.set(cs, Owner::Idle);
                return true;
            }
            if !discard {
                self.stats.write(cs, |s| *s = stats);
            }

            // Realign the round robin to the start of a pair.
            let realigned = hal.adc_configure(capture.inputs);
            self.discard.set(cs, !realigned);
            if !realigned {
                self.count_overrun(cs);
            }
            self.owner.set(cs, Owner::Dma);
            self.start_dma(hal, &capture);
            realigned
        });

        if discard {
            warn!("Power analyzer: Misaligned capture discarded.");
        }
        if !realigned {
            warn!("Power analyzer: ADC realignment failed. Next capture discarded.");
        }
    }

    /// Number of published statistics snapshots.
    ///
    /// Increments by one for each completed capture.
    /// Discarded captures are not published.
    pub fn generation(&self) -> u32 {
        self.stats.generation()
    }

    /// Number of dropped sampling ticks and failed ADC realignments.
    pub fn overruns(&self, m: &MainCtx<'_>) -> u32 {
        m.with_cs(|cs| self.overruns.get(cs))
    }

    fn calibration(&self, m: &MainCtx<'_>) -> Calibration {
        m.with_cs(|cs| self.calibration.get(cs))
    }

    pub fn offsets(&self, _m: &MainCtx<'_>) -> Offsets {
        self.stats
            .read_with(|stats| Offsets {
                voltage: stats.offset_voltage,
                current: stats.offset_current,
            })
            .1
    }

    pub fn peaks(&self, m: &MainCtx<'_>) -> Peaks {
        let cal = self.calibration(m);
        let (_, (positive, negative)) = self
            .stats
            .read_with(|stats| (stats.pos_peak, stats.neg_peak));
        Peaks {
            positive: cal.apply(&positive),
            negative: cal.apply(&negative),
        }
    }

    /// Voltage and current RMS and the mean power.
    pub fn rms(&self, m: &MainCtx<'_>) -> Readings {
        let cal = self.calibration(m);
        let (_, (count, square_sum_voltage, square_sum_current, power_sum)) =
            self.stats.read_with(|stats| {
                (
                    stats.sample_count,
                    stats.square_sum_voltage,
                    stats.square_sum_current,
                    stats.power_sum,
                )
            });
        if count == 0 {
            return Readings::default();
        }
        let count = count as f32;
        Readings {
            voltage: libm::sqrtf(square_sum_voltage as f32 / count) * cal.voltage,
            current: libm::sqrtf(square_sum_current as f32 / count) * cal.current,
            power: power_sum as f32 / count * cal.power,
        }
    }

    fn histogram(
        &self,
        select: impl Fn(&Stats<HIST>) -> &[i32; HIST],
        multiplier: f32,
    ) -> Vec<f32, HIST> {
        let (_, (len, count, sums)) = self
            .stats
            .read_with(|stats| (stats.histogram_len, stats.histogram_count, *select(stats)));
        sums[..len]
            .iter()
            .map(|&sum| {
                if count == 0 {
                    0.0
                } else {
                    sum as f32 / count as f32 * multiplier
                }
            })
            .collect()
    }

    /// Voltage waveform of one mains cycle, averaged over the captured cycles.
    pub fn voltage_histogram(&self, m: &MainCtx<'_>) -> Vec<f32, HIST> {
        let multiplier = self.calibration(m).voltage;
        self.histogram(|stats| &stats.histogram_voltage, multiplier)
    }

    /// Current waveform of one mains cycle, averaged over the captured cycles.
    pub fn current_histogram(&self, m: &MainCtx<'_>) -> Vec<f32, HIST> {
        let multiplier = self.calibration(m).current;
        self.histogram(|stats| &stats.histogram_current, multiplier)
    }
}

impl<const BUF: usize, const HIST: usize> Default for PowerAnalyzer<BUF, HIST> {
    fn default() -> Self {
        Self::new()
    }
}


// vim: ts=4 sw=4 expandtab
