// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware abstraction consumed by this crate.
//!
//! A board crate implements these traits on top of its PAC/HAL and routes
//! its interrupt vectors into the `irq_handler_*` functions:
//!
//! | Vector                  | Entry point                                     |
//! |-------------------------|-------------------------------------------------|
//! | GPIO bank edge          | [crate::Controller::irq_handler_edge]           |
//! | One-shot alarm          | [crate::Controller::irq_handler_alarm]          |
//! | Repeating sample timer  | [crate::PowerAnalyzer::irq_handler_sample_tick] |
//! | DMA transfer complete   | [crate::PowerAnalyzer::irq_handler_dma_complete]|
//!
//! All methods take `&self`, because they are called from foreground code
//! and from interrupt handlers on either core.

use crate::timer::Timestamp;

/// Bit mask of GPIO pins. Bit `n` selects pin `n`.
pub type PinMask = u32;

/// Monotonic microsecond clock.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// TRIAC gate outputs.
pub trait GateOutputs {
    /// Configure all pins in `mask` as outputs driving `level`.
    fn init_outputs(&self, mask: PinMask, level: bool);
    /// Drive all pins in `mask` to `level` at once.
    fn put_masked(&self, mask: PinMask, level: bool);
}

/// Zero-cross sense inputs.
pub trait SenseInputs {
    /// Configure `pin` as input without pulls.
    fn init_sense(&self, pin: u8);
    /// Enable or disable the rising and falling edge interrupt of `pin`.
    fn set_edge_irq(&self, pin: u8, enabled: bool);
}

/// Handle of an outstanding one-shot alarm.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct AlarmId(pub i32);

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AlarmKind {
    /// Switch the gate on.
    Activate,
    /// Switch the gate off.
    Deactivate,
}

/// Payload of a one-shot alarm.
///
/// The HAL hands it back together with the [AlarmId] when the alarm fires.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct AlarmEvent {
    pub pin: u8,
    pub kind: AlarmKind,
}

/// One-shot hardware alarms.
pub trait Alarms {
    /// Schedule `event` at the absolute time `at`.
    ///
    /// Returns `None`, if no alarm slot is available.
    fn schedule_alarm(&self, at: Timestamp, event: AlarmEvent) -> Option<AlarmId>;
    /// Cancel an alarm. Cancelling a fired or cancelled alarm is a no-op.
    fn cancel_alarm(&self, id: AlarmId);
}

/// Everything the phase controller needs.
pub trait TriacHal: Clock + GateOutputs + SenseInputs + Alarms {}

impl<T: Clock + GateOutputs + SenseInputs + Alarms> TriacHal for T {}

/// Repeating timer that drives the sampling tick.
pub trait SampleTimer {
    /// Start calling the sampling tick at `hz`. Returns `false`, if no timer is available.
    fn start_sample_timer(&self, hz: u32) -> bool;
    fn stop_sample_timer(&self);
}

/// ADC in round-robin mode with its results feeding a DMA request FIFO.
pub trait RoundRobinAdc {
    /// ADC input index of a GPIO pin. `None`, if the pin has no analog function.
    fn adc_input(&self, pin: u8) -> Option<u8>;
    /// Alternate conversions between `inputs` in ascending input order
    /// and select `inputs[0]` for the next conversion.
    /// Returns `false`, if the ADC is not available.
    fn adc_configure(&self, inputs: [u8; 2]) -> bool;
    /// Start one conversion.
    fn adc_start_once(&self);
    /// The ADC is ready to start a new conversion.
    fn adc_ready(&self) -> bool;
    fn adc_stop(&self);
}

/// Handle of a claimed DMA channel.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct DmaChannel(pub u8);

/// DMA from the ADC result FIFO into memory.
pub trait CaptureDma {
    fn dma_claim(&self) -> Option<DmaChannel>;
    fn dma_unclaim(&self, ch: DmaChannel);
    /// Transfer `len` 16 bit ADC results into `dst` and raise the
    /// completion interrupt afterwards.
    ///
    /// # SAFETY
    ///
    /// `dst` must be valid for `len` writes and must not be accessed by
    /// anything else until the transfer completed or was aborted.
    unsafe fn dma_start(&self, ch: DmaChannel, dst: *mut u16, len: usize);
    fn dma_busy(&self, ch: DmaChannel) -> bool;
    fn dma_abort(&self, ch: DmaChannel);
}

/// Everything the power analyzer needs.
pub trait AnalyzerHal: Clock + SampleTimer + RoundRobinAdc + CaptureDma {}

impl<T: Clock + SampleTimer + RoundRobinAdc + CaptureDma> AnalyzerHal for T {}

// vim: ts=4 sw=4 expandtab
