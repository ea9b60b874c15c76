// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{
    hal::{AlarmId, PinMask},
    history::History,
    mutex::MutexCell,
    seqlock::SeqLock,
    timer::{RelTimestamp, Timestamp},
};

/// Active level of the TRIAC gate outputs.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Polarity {
    ActiveLow,
    #[default]
    ActiveHigh,
}

impl Polarity {
    #[inline]
    pub const fn level(self, active: bool) -> bool {
        match self {
            Polarity::ActiveHigh => active,
            Polarity::ActiveLow => !active,
        }
    }
}

/// Gate outputs of one channel.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Gate {
    pub mask: PinMask,
    pub polarity: Polarity,
}

impl Gate {
    #[inline]
    pub const fn active_level(&self) -> bool {
        self.polarity.level(true)
    }

    #[inline]
    pub const fn inactive_level(&self) -> bool {
        self.polarity.level(false)
    }
}

/// Firing command.
///
/// The foreground writes it, the zero-cross interrupt adopts it.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Command {
    /// The command is void after this point in time.
    pub watchdog_deadline: Timestamp,
    /// Gate pulse length in microseconds.
    pub on_time: u32,
    /// Firing delay after the even/odd zero crossing in microseconds.
    pub delay: [u32; 2],
}

impl Command {
    pub const fn off() -> Self {
        Self {
            watchdog_deadline: Timestamp::new(),
            on_time: 0,
            delay: [0, 0],
        }
    }

    /// Firing delay for a crossing of `parity` at `now`.
    ///
    /// `None`, if the command expired or one of its timings is zero.
    pub fn firing_delay(&self, now: Timestamp, parity: usize) -> Option<u32> {
        if now > self.watchdog_deadline {
            return None;
        }
        if self.delay[0] == 0 || self.delay[1] == 0 || self.on_time == 0 {
            return None;
        }
        Some(self.delay[parity & 1])
    }
}

/// Static channel parameters.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Setup {
    pub gate: Gate,
    pub ignore_window: RelTimestamp,
}

/// State owned by the interrupt handlers.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct IsrState {
    /// The command copy that is currently executed.
    pub active: Command,
    pub alarm_activate: Option<AlarmId>,
    pub alarm_deactivate: Option<AlarmId>,
}

impl IsrState {
    pub const fn new() -> Self {
        Self {
            active: Command::off(),
            alarm_activate: None,
            alarm_deactivate: None,
        }
    }
}

/// Per sense pin state.
pub struct Channel {
    /// `None` while the channel is inactive.
    pub setup: MutexCell<Option<Setup>>,
    pub command: SeqLock<Command>,
    pub timing: SeqLock<History>,
    pub isr: MutexCell<IsrState>,
}

impl Channel {
    pub const fn new() -> Self {
        Self {
            setup: MutexCell::new(None),
            command: SeqLock::new(Command::off()),
            timing: SeqLock::new(History::new()),
            isr: MutexCell::new(IsrState::new()),
        }
    }
}


// vim: ts=4 sw=4 expandtab
