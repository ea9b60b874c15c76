// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Zero-cross tracking in the sense pin edge interrupt.

use crate::{
    controller::{Controller, MAX_HALF_PERIOD},
    hal::{AlarmEvent, AlarmKind, TriacHal},
    mutex::IrqCtx,
    timer::RelTimestamp,
    triac::disarm,
};
use log::warn;

impl<const PINS: usize> Controller<PINS> {
    /// Rising or falling edge on the sense pin `pin`.
    pub fn irq_handler_edge<H: TriacHal>(&self, c: &IrqCtx<'_>, hal: &H, pin: u8) {
        let Some(ch) = self.channel(pin) else {
            return;
        };

        c.with_cs(|cs| {
            let Some(setup) = ch.setup.get(cs) else {
                return;
            };

            let now = hal.now();
            let Some(parity) = ch
                .timing
                .write(cs, |timing| timing.record(now, setup.ignore_window, MAX_HALF_PERIOD))
            else {
                // Bounce of the previous crossing.
                return;
            };

            let mut isr = ch.isr.get(cs);

            // Never keep the gate on across a crossing.
            disarm(hal, &setup.gate, &mut isr);

            // Keep the previous command, if the foreground is just writing a new one.
            if let Some(command) = ch.command.try_read() {
                isr.active = command;
            }

            if let Some(delay) = isr.active.firing_delay(now, parity) {
                let event = AlarmEvent {
                    pin,
                    kind: AlarmKind::Activate,
                };
                isr.alarm_activate =
                    hal.schedule_alarm(now + RelTimestamp::from_micros(delay), event);
                if isr.alarm_activate.is_none() {
                    warn!("Ch {pin}: No alarm available for gate activation");
                }
            }

            ch.isr.set(cs, isr);
        });
    }
}


// vim: ts=4 sw=4 expandtab
