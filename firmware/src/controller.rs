// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Channel arena and the foreground channel operations.

use crate::{
    channel::{Channel, Command, Gate, IsrState, Polarity, Setup},
    error::Error,
    hal::{Clock, PinMask, TriacHal},
    history::History,
    mutex::{CriticalSection, MainCtx},
    phase::{PERCENT_MAX, firing_delays},
    timer::RelTimestamp,
    triac::disarm,
};
use heapless::Vec;
use log::debug;

/// Largest supported number of GPIO pins. All pins fit into a [PinMask].
pub const MAX_PINS: usize = 32;
/// GPIO pins of the default target.
pub const NUM_PINS: usize = 30;
/// Maximum number of gate outputs driven by one channel.
pub const MAX_TRIGGER_PINS: usize = 8;

/// Recorded zero-cross intervals are clamped to this.
/// A history containing clamped intervals is not synchronized to mains.
pub const MAX_HALF_PERIOD: RelTimestamp = RelTimestamp::from_millis(100);

pub const DEFAULT_WATCHDOG_US: u32 = 500_000;
pub const DEFAULT_ON_TIME_US: u32 = 300;
pub const DEFAULT_IGNORE_WINDOW_US: u32 = 4_000;
pub const MAX_ON_TIME_US: u32 = 50_000;
pub const MAX_IGNORE_WINDOW_US: u32 = 50_000;

/// Parameters of a phase control channel.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    sense_pin: u8,
    trigger_pins: Vec<u8, MAX_TRIGGER_PINS>,
    polarity: Polarity,
    watchdog_us: u32,
    on_time_us: u32,
    ignore_window_us: u32,
}

impl ChannelConfig {
    pub fn new(sense_pin: u8, trigger_pins: &[u8]) -> Result<Self, Error> {
        if trigger_pins.is_empty() {
            return Err(Error::NoTriggerPins);
        }
        let trigger_pins = Vec::from_slice(trigger_pins).map_err(|_| Error::TooManyTriggerPins)?;
        Ok(Self {
            sense_pin,
            trigger_pins,
            polarity: Polarity::default(),
            watchdog_us: DEFAULT_WATCHDOG_US,
            on_time_us: DEFAULT_ON_TIME_US,
            ignore_window_us: DEFAULT_IGNORE_WINDOW_US,
        })
    }

    pub fn polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Commands expire this long after they have been set.
    pub fn watchdog_us(mut self, us: u32) -> Self {
        self.watchdog_us = us;
        self
    }

    /// Length of the gate pulse.
    pub fn on_time_us(mut self, us: u32) -> Self {
        self.on_time_us = us;
        self
    }

    /// Edges closer than this to the previous accepted edge are bounces.
    pub fn ignore_window_us(mut self, us: u32) -> Self {
        self.ignore_window_us = us;
        self
    }
}

/// Handle of a configured channel.
///
/// It is consumed by [Controller::close_channel].
#[derive(Debug)]
pub struct ChannelHandle {
    pin: u8,
    percent: u8,
    watchdog: RelTimestamp,
    on_time: u32,
}

impl ChannelHandle {
    pub fn sense_pin(&self) -> u8 {
        self.pin
    }

    /// The most recently commanded power percentage.
    pub fn percent(&self) -> u8 {
        self.percent
    }
}

/// Phase controller for up to `PINS` channels, one per sense pin.
pub struct Controller<const PINS: usize = NUM_PINS> {
    channels: [Channel; PINS],
}

impl<const PINS: usize> Controller<PINS> {
    pub const fn new() -> Self {
        const { assert!(PINS <= MAX_PINS) };
        Self {
            channels: [const { Channel::new() }; PINS],
        }
    }

    #[inline]
    pub(crate) fn channel(&self, pin: u8) -> Option<&Channel> {
        self.channels.get(pin as usize)
    }

    fn pins_in_use(&self, cs: CriticalSection<'_>) -> PinMask {
        self.channels
            .iter()
            .enumerate()
            .filter_map(|(pin, ch)| ch.setup.get(cs).map(|s| s.gate.mask | (1 << pin)))
            .fold(0, |acc, mask| acc | mask)
    }

    /// Configure and activate a channel.
    ///
    /// The gate outputs are driven inactive before the edge interrupt of the sense pin is enabled.
    /// The channel does not fire until a power percentage has been set
    /// and the mains half-period is known.
    pub fn configure_channel<H: TriacHal>(
        &self,
        m: &MainCtx<'_>,
        hal: &H,
        config: &ChannelConfig,
    ) -> Result<ChannelHandle, Error> {
        let sense_pin = config.sense_pin;
        let ch = self.channel(sense_pin).ok_or(Error::InvalidPin(sense_pin))?;

        let mut mask: PinMask = 0;
        for &pin in &config.trigger_pins {
            if pin as usize >= PINS {
                return Err(Error::InvalidPin(pin));
            }
            if pin == sense_pin {
                return Err(Error::SensePinIsTrigger);
            }
            mask |= 1 << pin;
        }
        if config.watchdog_us == 0 {
            return Err(Error::OutOfRange("watchdog"));
        }
        if config.on_time_us == 0 || config.on_time_us > MAX_ON_TIME_US {
            return Err(Error::OutOfRange("on-time"));
        }
        if config.ignore_window_us > MAX_IGNORE_WINDOW_US {
            return Err(Error::OutOfRange("ignore window"));
        }

        let setup = Setup {
            gate: Gate {
                mask,
                polarity: config.polarity,
            },
            ignore_window: RelTimestamp::from_micros(config.ignore_window_us),
        };

        m.with_cs(|cs| {
            let in_use = self.pins_in_use(cs);
            if let Some(&pin) = core::iter::once(&sense_pin)
                .chain(config.trigger_pins.iter())
                .find(|&&pin| in_use & (1 << pin) != 0)
            {
                return Err(Error::PinInUse(pin));
            }

            ch.command.write(cs, |cmd| *cmd = Command::off());
            ch.timing.write(cs, |timing| *timing = History::new());
            ch.isr.set(cs, IsrState::new());

            hal.init_outputs(mask, setup.gate.inactive_level());
            hal.init_sense(sense_pin);
            ch.setup.set(cs, Some(setup));
            hal.set_edge_irq(sense_pin, true);
            Ok(())
        })?;

        debug!("Ch {sense_pin}: configured, gate mask {mask:#010x}");

        Ok(ChannelHandle {
            pin: sense_pin,
            percent: 0,
            watchdog: RelTimestamp::from_micros(config.watchdog_us),
            on_time: config.on_time_us,
        })
    }

    /// Command a new power percentage.
    ///
    /// The command becomes effective at the next zero crossing
    /// and expires after the watchdog time. It must be refreshed periodically.
    /// Returns the new percentage.
    pub fn set_percent<H: Clock>(
        &self,
        m: &MainCtx<'_>,
        hal: &H,
        handle: &mut ChannelHandle,
        percent: u8,
    ) -> Result<u8, Error> {
        if percent > PERCENT_MAX {
            return Err(Error::OutOfRange("percent"));
        }
        let ch = self.channel(handle.pin).ok_or(Error::InvalidPin(handle.pin))?;

        let now = hal.now();
        let (_, half_periods) = ch
            .timing
            .read_with(|timing| timing.averages(now, MAX_HALF_PERIOD));

        let command = Command {
            watchdog_deadline: now + handle.watchdog,
            on_time: if percent == 0 { 0 } else { handle.on_time },
            delay: firing_delays(percent, half_periods),
        };
        m.with_cs(|cs| ch.command.write(cs, |cmd| *cmd = command));

        handle.percent = percent;
        Ok(percent)
    }

    /// Average mains half-period in microseconds.
    ///
    /// `None`, if the channel is not synchronized to mains.
    pub fn read_half_period<H: Clock>(
        &self,
        _m: &MainCtx<'_>,
        hal: &H,
        handle: &ChannelHandle,
    ) -> Option<u32> {
        let ch = self.channel(handle.pin)?;
        let now = hal.now();
        ch.timing
            .read_with(|timing| timing.average(now, MAX_HALF_PERIOD))
            .1
    }

    /// Mains frequency. Zero, if unknown.
    pub fn read_frequency_hz<H: Clock>(
        &self,
        m: &MainCtx<'_>,
        hal: &H,
        handle: &ChannelHandle,
    ) -> f32 {
        match self.read_half_period(m, hal, handle) {
            Some(half_period) => 500_000.0 / half_period as f32,
            None => 0.0,
        }
    }

    /// Deactivate a channel and switch its gate off.
    pub fn close_channel<H: TriacHal>(&self, m: &MainCtx<'_>, hal: &H, handle: ChannelHandle) {
        let pin = handle.pin;
        let Some(ch) = self.channel(pin) else {
            return;
        };
        m.with_cs(|cs| {
            hal.set_edge_irq(pin, false);
            if let Some(setup) = ch.setup.replace(cs, None) {
                let mut isr = ch.isr.get(cs);
                disarm(hal, &setup.gate, &mut isr);
            }
            ch.isr.set(cs, IsrState::new());
            ch.command.write(cs, |cmd| *cmd = Command::off());
            ch.timing.write(cs, |timing| *timing = History::new());
        });
        debug!("Ch {pin}: closed");
    }

    /// Command of a channel as seen by the foreground.
    #[cfg(test)]
    pub(crate) fn command(&self, handle: &ChannelHandle) -> Option<Command> {
        Some(self.channel(handle.pin)?.command.read())
    }
}

impl<const PINS: usize> Default for Controller<PINS> {
    fn default() -> Self {
        Self::new()
    }
}


// vim: ts=4 sw=4 expandtab
