// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! TRIAC phase control and power analysis.
//!
//! [Controller] tracks the mains zero crossings on its sense pins and fires
//! the TRIAC gates with a phase delay that delivers the commanded percentage
//! of the full power. [PowerAnalyzer] samples voltage and current and
//! reports offsets, peaks, RMS values and the averaged waveform.
//!
//! The board crate implements the traits in [hal] and calls the
//! `irq_handler_*` functions from its interrupt vectors.
//! Everything else is called from foreground code with a [MainCtx].

#![cfg_attr(not(test), no_std)]

mod analog;
mod channel;
mod controller;
mod error;
mod fixpt;
pub mod hal;
mod history;
mod mains;
mod mutex;
mod phase;
mod seqlock;
#[cfg(test)]
mod sim;
mod stats;
mod timer;
mod triac;

pub use crate::{
    analog::{
        ADC_READY_SPIN_LIMIT, AnalyzerConfig, DEFAULT_HISTOGRAM_SIZE, DEFAULT_SAMPLE_COUNT,
        DEFAULT_SAMPLE_RATE_HZ, MAX_SAMPLE_RATE_HZ, Offsets, Peaks, PowerAnalyzer, Readings,
    },
    channel::Polarity,
    controller::{
        ChannelConfig, ChannelHandle, Controller, DEFAULT_IGNORE_WINDOW_US, DEFAULT_ON_TIME_US,
        DEFAULT_WATCHDOG_US, MAX_HALF_PERIOD, MAX_IGNORE_WINDOW_US, MAX_ON_TIME_US, MAX_PINS,
        MAX_TRIGGER_PINS, NUM_PINS,
    },
    error::{Error, Resource},
    fixpt::Frac16,
    history::HISTORY_LEN,
    mutex::{IrqCtx, MainCtx, irq_entry},
    phase::{PERCENT_MAX, firing_delay, firing_delays, firing_fraction},
    seqlock::SeqLock,
    timer::{RelTimestamp, Timestamp, spin_until},
};

// vim: ts=4 sw=4 expandtab
